//! # calcwire-llm: text generation for the `gpt` mode
//!
//! Provides the backend generation capability behind a single trait,
//! [`Generator`], with two implementations:
//!   - [`LlmGenerator`]: calls a real model through [`LlmClient`]
//!     (**OpenAI-compatible API** or **Ollama**)
//!   - [`StubGenerator`]: deterministic placeholder, no network
//!
//! Generation never fails at this boundary:
//!   - no backend configured → `[GPT-STUB] ...` text
//!   - backend call failed   → `[GPT-ERROR] ...` text
//!
//! # Architecture
//!
//! ```text
//! dispatcher ──▶ Generator ──▶ LlmClient ──▶ /v1/chat/completions | /api/generate
//!                    │
//!                    └──▶ stub text (no provider / no API key)
//! ```

pub mod client;
pub mod error;
pub mod generator;
pub mod types;

pub use client::{LlmClient, LlmProvider};
pub use error::LlmError;
pub use generator::{Generator, LlmGenerator, StubGenerator, stub_text};
pub use types::{LlmRequest, LlmResponse};
