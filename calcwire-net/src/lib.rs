//! # calcwire-net: the networked half of calcwire
//!
//! Wires the transport-independent pieces from `calcwire-core` and the
//! generator from `calcwire-llm` into three TCP roles.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐  frame\n   ┌──────────────┐  frame\n   ┌──────────────────┐
//! │ client │ ─────────▶ │ proxy (LRU)  │ ─────────▶ │ server (LRU)     │
//! │        │ ◀───────── │ mode + data  │ ◀───────── │ whole request    │
//! └────────┘  envelope  └──────────────┘  envelope  │  ├─ calc: eval   │
//!      │                                            │  └─ gpt: generate│
//!      └───────────── or directly ────────────────▶ └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `connection`: framed read/answer/write loop, one per connection
//! - `dispatcher`: server-side cache and mode routing
//! - `server` / `proxy`: accept loops
//! - `client`: one request per connection, under a timeout
//! - `metrics`: atomic counters
//! - `logging`: tracing subscriber for the binaries

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod connection;
pub mod dispatcher;
pub mod logging;
pub mod metrics;
pub mod proxy;
pub mod server;

pub use client::{Client, ClientError};
pub use connection::{MessageHandler, serve_connection};
pub use dispatcher::Dispatcher;
pub use logging::init_tracing;
pub use metrics::{CounterSnapshot, ServiceCounters};
pub use proxy::{Proxy, ProxyHandler};
pub use server::Server;
