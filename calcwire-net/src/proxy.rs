//! The caching proxy.
//!
//! Speaks the same protocol as the server. Each request is looked up in the
//! proxy's own LRU, keyed by mode and data only; on a miss it is forwarded
//! upstream over a fresh connection and the envelope is stored as received.
//! Upstream `ok: false` envelopes are cached like any other reply; failures
//! to reach the upstream are not. A message without a string `mode` and an
//! object `data` has no proxy key and is always forwarded.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use calcwire_core::cache::{CacheEngine, CacheStats};
use calcwire_core::config::ProxyConfig;
use calcwire_core::error::ServiceError;
use calcwire_core::protocol::{self, Response};
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::connection::{MessageHandler, serve_connection};
use crate::metrics::ServiceCounters;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Request handler of the proxy: cache in front of an upstream [`Client`].
#[derive(Debug)]
pub struct ProxyHandler {
    cache: CacheEngine<String, Response>,
    upstream: Client,
    counters: Arc<ServiceCounters>,
}

impl ProxyHandler {
    /// Create a handler with an envelope cache of `cache_size` entries.
    #[must_use]
    pub fn new(cache_size: usize, upstream: Client, counters: Arc<ServiceCounters>) -> Self {
        Self { cache: CacheEngine::new(cache_size), upstream, counters }
    }

    /// Proxy cache counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[async_trait]
impl MessageHandler for ProxyHandler {
    async fn handle_message(&self, message: Value) -> Response {
        let key = protocol::proxy_cache_key(&message);
        if let Some(key) = &key {
            if let Some(hit) = self.cache.get(key) {
                debug!(key = %key, "proxy cache hit");
                return hit.from_proxy_cache();
            }
        }

        self.counters.record_forward();
        match self.upstream.send_value(&message).await {
            Ok(response) => {
                if let Some(key) = key {
                    self.cache.set(key, response.clone());
                }
                response
            }
            Err(e) => {
                warn!(upstream = %self.upstream.addr(), error = %e, "upstream exchange failed");
                Response::failure(&ServiceError::Upstream(e.to_string()))
            }
        }
    }
}

/// A bound caching proxy.
#[derive(Debug)]
pub struct Proxy {
    listener: TcpListener,
    handler: Arc<ProxyHandler>,
    counters: Arc<ServiceCounters>,
    max_frame_len: usize,
}

impl Proxy {
    /// Bind the listening socket.
    ///
    /// # Errors
    /// Returns the bind error.
    pub async fn bind(config: &ProxyConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind(config.listen_addr()).await?;
        let counters = Arc::new(ServiceCounters::new());
        let upstream = Client::new(config.upstream_addr(), config.upstream_timeout());
        info!(
            addr = %listener.local_addr()?,
            upstream = %upstream.addr(),
            cache_size = config.cache_size,
            "proxy listening"
        );
        Ok(Self {
            listener,
            handler: Arc::new(ProxyHandler::new(config.cache_size, upstream, Arc::clone(&counters))),
            counters,
            max_frame_len: config.max_frame_bytes,
        })
    }

    /// Address actually bound.
    ///
    /// # Errors
    /// Returns the socket error, if any.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared handler, for inspecting cache statistics.
    #[must_use]
    pub fn handler(&self) -> Arc<ProxyHandler> {
        Arc::clone(&self.handler)
    }

    /// Shared service counters.
    #[must_use]
    pub fn counters(&self) -> Arc<ServiceCounters> {
        Arc::clone(&self.counters)
    }

    /// Accept connections forever.
    pub async fn run(self) {
        let handler: Arc<dyn MessageHandler> = self.handler;
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    self.counters.record_connection();
                    debug!(%peer, "proxy connection accepted");
                    let handler = Arc::clone(&handler);
                    let counters = Arc::clone(&self.counters);
                    let max_frame_len = self.max_frame_len;
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, peer, handler, counters, max_frame_len).await {
                            debug!(%peer, error = %e, "proxy connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}
