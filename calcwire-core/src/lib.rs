//! # calcwire core library
//!
//! The transport-independent half of the calcwire compute service:
//!
//! - **Evaluator** ([`eval`]): restricted arithmetic grammar, parsed into a
//!   closed syntax tree and evaluated without any general interpreter.
//! - **Cache engine** ([`cache`]): fixed-capacity LRU store shared between
//!   connection tasks; the server and proxy each own one.
//! - **Line framer** ([`framer`]): splits a byte stream into
//!   newline-terminated frames, tolerating partial reads and pipelining.
//! - **Protocol** ([`protocol`]): request/response envelopes and the two
//!   cache-key policies.
//! - **Configuration** ([`config`]): `calcwire.toml`.
//!
//! ## Safety Contract
//!
//! Evaluating a client-supplied expression can only ever read the two
//! constants `pi` and `e` and call the nine whitelisted math functions.
//! Unknown names are rejected by the parser; no tree node can name anything
//! else.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod config;
pub mod error;
pub mod eval;
pub mod framer;
pub mod protocol;

pub use cache::{CacheEngine, CacheStats};
pub use config::CalcwireConfig;
pub use error::{CoreError, ServiceError};
pub use eval::{EvalError, evaluate};
pub use framer::LineFramer;
pub use protocol::{Meta, Output, Request, Response, Task};
