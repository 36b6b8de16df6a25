//! The compute server: accepts connections and runs each one on its own task
//! against a shared [`Dispatcher`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use calcwire_core::config::ServerConfig;
use calcwire_llm::Generator;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::connection::{MessageHandler, serve_connection};
use crate::dispatcher::Dispatcher;
use crate::metrics::ServiceCounters;

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// A bound compute server.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    counters: Arc<ServiceCounters>,
    max_frame_len: usize,
}

impl Server {
    /// Bind the listening socket. Port `0` picks an ephemeral port.
    ///
    /// # Errors
    /// Returns the bind error.
    pub async fn bind(config: &ServerConfig, generator: Arc<dyn Generator>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        info!(addr = %listener.local_addr()?, cache_size = config.cache_size, "server listening");
        Ok(Self {
            listener,
            dispatcher: Arc::new(Dispatcher::new(config.cache_size, generator)),
            counters: Arc::new(ServiceCounters::new()),
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

    /// Shared dispatcher, for inspecting cache statistics.
    #[must_use]
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Shared service counters.
    #[must_use]
    pub fn counters(&self) -> Arc<ServiceCounters> {
        Arc::clone(&self.counters)
    }

    /// Accept connections forever. A failing connection never stops the
    /// accept loop.
    pub async fn run(self) {
        let handler: Arc<dyn MessageHandler> = self.dispatcher;
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    self.counters.record_connection();
                    debug!(%peer, "connection accepted");
                    let handler = Arc::clone(&handler);
                    let counters = Arc::clone(&self.counters);
                    let max_frame_len = self.max_frame_len;
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, peer, handler, counters, max_frame_len).await {
                            debug!(%peer, error = %e, "connection ended with error");
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
