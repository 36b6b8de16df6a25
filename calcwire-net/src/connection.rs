//! Per-connection request loop shared by the server and the proxy.
//!
//! Bytes are read in chunks and fed to a [`LineFramer`]; every complete frame
//! is answered in arrival order before the next chunk is read, so pipelined
//! requests get their responses in the order they were sent. A frame that
//! does not decode, or that outgrows the connection's frame limit, gets a
//! `Malformed` envelope and the loop carries on from the next delimiter.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use calcwire_core::framer::{DEFAULT_MAX_FRAME_LEN, LineFramer};
use calcwire_core::protocol::{self, Response};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::metrics::ServiceCounters;

/// Read buffer size for one `read` call.
pub const READ_CHUNK: usize = 4096;

/// Something that answers one decoded request with one envelope.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Produce the response to `message`. Errors are reported in the envelope.
    async fn handle_message(&self, message: Value) -> Response;
}

/// Serve one connection until the peer closes it or an I/O error occurs.
///
/// An unterminated remainder at end of stream is discarded without a reply.
/// Frames longer than `max_frame_len` bytes are answered with `Malformed`.
///
/// # Errors
/// Propagates read and write failures on the stream.
pub async fn serve_connection<S>(
    mut stream: S,
    peer: SocketAddr,
    handler: Arc<dyn MessageHandler>,
    counters: Arc<ServiceCounters>,
    max_frame_len: usize,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framer = LineFramer::with_max_frame_len(max_frame_len);
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            let dropped = framer.finish();
            if dropped > 0 {
                debug!(%peer, dropped, "peer closed with a partial frame");
            }
            return Ok(());
        }
        framer.extend(&chunk[..n]);

        while let Some(frame) = framer.next_frame() {
            let response = match frame.and_then(|frame| protocol::decode_frame(&frame)) {
                Ok(message) => handler.handle_message(message).await,
                Err(e) => {
                    warn!(%peer, error = %e, "undecodable frame");
                    Response::failure(&e)
                }
            };
            counters.record_frame(response.ok);
            stream.write_all(&response.encode()).await?;
        }
        stream.flush().await?;
    }
}

/// Read exactly one frame from `stream`.
///
/// Returns `Ok(None)` when the peer closes before completing a frame. Bytes
/// after the first delimiter are ignored.
///
/// # Errors
/// Propagates read failures on the stream. A frame longer than
/// [`DEFAULT_MAX_FRAME_LEN`] is an `InvalidData` error.
pub async fn read_frame<S>(stream: &mut S) -> std::io::Result<Option<Vec<u8>>>
where
    S: AsyncRead + Unpin,
{
    let mut framer = LineFramer::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        if let Some(frame) = framer.next_frame() {
            return frame
                .map(Some)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e));
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            framer.finish();
            return Ok(None);
        }
        framer.extend(&chunk[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calcwire_core::protocol::Output;
    use tokio::io::duplex;

    struct Echo;

    #[async_trait]
    impl MessageHandler for Echo {
        async fn handle_message(&self, message: Value) -> Response {
            let text = message["data"]["prompt"].as_str().unwrap_or_default().to_string();
            Response::success(Output::Text(text), false, 0)
        }
    }

    fn peer() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 40000))
    }

    async fn read_all_frames<S: AsyncRead + Unpin>(stream: &mut S, count: usize) -> Vec<Response> {
        let mut out = Vec::new();
        for _ in 0..count {
            let frame = read_frame(stream).await.expect("read").expect("frame");
            out.push(Response::decode(&frame).expect("decode"));
        }
        out
    }

    #[tokio::test]
    async fn pipelined_frames_answered_in_order() {
        let (mut client, server) = duplex(1024);
        let counters = Arc::new(ServiceCounters::new());
        let task = tokio::spawn(serve_connection(server, peer(), Arc::new(Echo), counters.clone(), DEFAULT_MAX_FRAME_LEN));

        client
            .write_all(b"{\"mode\":\"gpt\",\"data\":{\"prompt\":\"a\"}}\nnot json\n{\"mode\":\"gpt\",\"data\":{\"prompt\":\"b\"}}\n")
            .await
            .expect("write");

        let mut responses = Vec::new();
        let mut framer = LineFramer::new();
        let mut chunk = vec![0u8; READ_CHUNK];
        while responses.len() < 3 {
            let n = client.read(&mut chunk).await.expect("read");
            assert!(n > 0, "server closed early");
            framer.extend(&chunk[..n]);
            for frame in framer.drain_frames() {
                responses.push(Response::decode(&frame.expect("frame within limit")).expect("decode"));
            }
        }
        drop(client);
        task.await.expect("join").expect("serve");

        assert_eq!(responses[0].result.as_ref().and_then(Output::as_text), Some("a"));
        assert!(!responses[1].ok);
        assert!(responses[1].error.as_deref().is_some_and(|e| e.starts_with("Malformed")));
        assert_eq!(responses[2].result.as_ref().and_then(Output::as_text), Some("b"));

        let snap = counters.snapshot();
        assert_eq!(snap.frames_handled, 3);
        assert_eq!(snap.failures, 1);
    }

    #[tokio::test]
    async fn partial_frame_at_eof_gets_no_reply() {
        let (mut client, server) = duplex(1024);
        let counters = Arc::new(ServiceCounters::new());
        let task = tokio::spawn(serve_connection(server, peer(), Arc::new(Echo), counters.clone(), DEFAULT_MAX_FRAME_LEN));

        client
            .write_all(b"{\"mode\":\"gpt\",\"data\":{\"prompt\":\"x\"}}\n{\"mode\":")
            .await
            .expect("write");
        let responses = read_all_frames(&mut client, 1).await;
        client.shutdown().await.expect("shutdown");

        assert!(read_frame(&mut client).await.expect("read").is_none());
        task.await.expect("join").expect("serve");
        assert_eq!(responses.len(), 1);
        assert_eq!(counters.snapshot().frames_handled, 1);
    }

    #[tokio::test]
    async fn oversized_frame_is_malformed_and_connection_resyncs() {
        let (mut client, server) = duplex(1024);
        let counters = Arc::new(ServiceCounters::new());
        let task = tokio::spawn(serve_connection(server, peer(), Arc::new(Echo), counters.clone(), 64));

        let writer = tokio::spawn(async move {
            let mut long = b"{\"mode\":\"gpt\",\"data\":{\"prompt\":\"".to_vec();
            long.extend(std::iter::repeat_n(b'x', 10_000));
            long.extend_from_slice(b"\"}}\n{\"mode\":\"gpt\",\"data\":{\"prompt\":\"short\"}}\n");
            client.write_all(&long).await.expect("write");
            client
        });

        let mut client = writer.await.expect("join writer");
        let responses = read_all_frames(&mut client, 2).await;
        drop(client);
        task.await.expect("join").expect("serve");

        assert!(!responses[0].ok);
        assert_eq!(responses[0].error.as_deref(), Some("Malformed: frame exceeds 64 bytes"));
        assert_eq!(responses[1].result.as_ref().and_then(Output::as_text), Some("short"));
        assert_eq!(counters.snapshot().frames_handled, 2);
    }

    #[tokio::test]
    async fn read_frame_reassembles_split_writes() {
        let (mut a, mut b) = duplex(64);
        let writer = tokio::spawn(async move {
            a.write_all(b"{\"ok\":").await.expect("write");
            a.write_all(b"false}\n").await.expect("write");
        });
        let frame = read_frame(&mut b).await.expect("read").expect("frame");
        writer.await.expect("join");
        assert_eq!(frame, b"{\"ok\":false}");
    }
}
