//! Request dispatcher: cache lookup, routing by mode, envelope assembly.
//!
//! ```text
//! message ──▶ options.cache? ──yes──▶ server cache hit? ──yes──▶ {from_cache: true}
//!                 │                          │ no
//!                 └────────no────────────────┤
//!                                            ▼
//!                              validate ─▶ calc: evaluator
//!                                         gpt:  generator
//!                                            │
//!                                 ok ─▶ store (if caching) ─▶ {from_cache: false}
//!                                 err ─▶ {ok: false, error}
//! ```

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use calcwire_core::cache::{CacheEngine, CacheStats};
use calcwire_core::error::ServiceError;
use calcwire_core::eval;
use calcwire_core::protocol::{self, Output, Request, Response, Task};
use calcwire_llm::Generator;
use serde_json::Value;
use tracing::debug;

use crate::connection::MessageHandler;

/// Server-side dispatcher, shared by every connection of one server.
pub struct Dispatcher {
    cache: CacheEngine<String, Output>,
    generator: Arc<dyn Generator>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher with a result cache of `cache_size` entries.
    #[must_use]
    pub fn new(cache_size: usize, generator: Arc<dyn Generator>) -> Self {
        Self {
            cache: CacheEngine::new(cache_size),
            generator,
        }
    }

    /// Answer one decoded request. Never fails: every error becomes an
    /// `ok: false` envelope.
    pub async fn handle_request(&self, message: &Value) -> Response {
        let started = Instant::now();
        let use_cache = protocol::cache_option(message);
        let key = protocol::server_cache_key(message);

        if use_cache {
            if let Some(hit) = self.cache.get(&key) {
                debug!(key = %key, "server cache hit");
                return Response::success(hit, true, elapsed_ms(started));
            }
        }

        match self.compute(message).await {
            Ok(output) => {
                let took_ms = elapsed_ms(started);
                if use_cache {
                    self.cache.set(key, output.clone());
                }
                Response::success(output, false, took_ms)
            }
            Err(e) => {
                debug!(error = %e, "request failed");
                Response::failure(&e)
            }
        }
    }

    async fn compute(&self, message: &Value) -> Result<Output, ServiceError> {
        let request = Request::from_value(message)?;
        match request.task {
            Task::Calc { expr } => Ok(Output::Number(eval::evaluate(&expr)?)),
            Task::Gpt { prompt } => Ok(Output::Text(self.generator.generate(&prompt).await)),
        }
    }

    /// Result cache counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[async_trait]
impl MessageHandler for Dispatcher {
    async fn handle_message(&self, message: Value) -> Response {
        self.handle_request(&message).await
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
