//! One-shot request client.
//!
//! Each exchange opens a fresh connection, writes one frame, reads one frame
//! and closes. The whole exchange (connect, send, receive) is bounded by the
//! configured timeout. The proxy uses the same client to talk upstream.

use std::time::Duration;

use calcwire_core::config::ClientConfig;
use calcwire_core::error::ServiceError;
use calcwire_core::protocol::{self, Request, Response};
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

use crate::connection::read_frame;

/// Transport-level failures. A well-formed `ok: false` envelope is not one of
/// these; it is returned as a [`Response`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Could not open the connection.
    #[error("connect to {addr} failed: {source}")]
    Connect {
        /// Target address.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Read or write failed mid-exchange.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The exchange did not complete in time.
    #[error("timed out after {0}ms")]
    Timeout(u64),

    /// The peer closed the connection without sending a response.
    #[error("connection closed before a response arrived")]
    NoResponse,

    /// The response frame was not a valid envelope.
    #[error("{0}")]
    Decode(ServiceError),
}

/// A client bound to one target address.
#[derive(Debug, Clone)]
pub struct Client {
    addr: String,
    timeout: Duration,
}

impl Client {
    /// Create a client for `addr` (`host:port`).
    #[must_use]
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self { addr: addr.into(), timeout }
    }

    /// Create a client from the `[client]` configuration section.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.target_addr(), config.timeout())
    }

    /// Target address.
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send a typed request.
    ///
    /// # Errors
    /// See [`Client::send_value`].
    pub async fn request(&self, request: &Request) -> Result<Response, ClientError> {
        self.send_value(&request.to_value()).await
    }

    /// Send an arbitrary JSON message and wait for its envelope.
    ///
    /// # Errors
    /// Returns a [`ClientError`] when the exchange fails at the transport
    /// level or the reply cannot be decoded.
    pub async fn send_value(&self, message: &Value) -> Result<Response, ClientError> {
        let budget_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        tokio::time::timeout(self.timeout, self.exchange(message))
            .await
            .map_err(|_| ClientError::Timeout(budget_ms))?
    }

    async fn exchange(&self, message: &Value) -> Result<Response, ClientError> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|source| ClientError::Connect { addr: self.addr.clone(), source })?;
        stream.write_all(&protocol::encode_value(message)).await?;
        stream.flush().await?;

        let frame = read_frame(&mut stream).await?.ok_or(ClientError::NoResponse)?;
        debug!(addr = %self.addr, bytes = frame.len(), "response received");
        Response::decode(&frame).map_err(ClientError::Decode)
    }
}
