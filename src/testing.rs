//! Reusable test utilities for exercising the session actor without a real
//! socket.
//!
//! [`MockTransport`] hands out in-memory reader/writer pairs. Each connection
//! attempt consumes one pre-approved [`MockSession`]; an attempt with nothing
//! queued fails, which is how tests emulate an unreachable endpoint. Queuing
//! several sessions lets a test walk the actor through full reconnect cycles.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::Sink;
use tokio::sync::{Mutex, mpsc};

use crate::core::{Frame, TelemetryError};
use crate::transport::{Transport, TransportConnectFuture};

type SessionEndpoints = (
    mpsc::UnboundedReceiver<Result<Frame, TelemetryError>>,
    mpsc::UnboundedSender<Frame>,
);

#[derive(Default)]
struct MockState {
    pending: VecDeque<SessionEndpoints>,
    connects: usize,
}

/// A transport backed by in-memory channels.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Build a transport + server control pair.
    pub fn with_server() -> (Self, MockServer) {
        let transport = Self::default();
        let server = MockServer {
            state: Arc::clone(&transport.state),
        };
        (transport, server)
    }
}

impl Transport for MockTransport {
    type Reader = MockReader;
    type Writer = MockWriter;

    fn connect(&self, _url: String) -> TransportConnectFuture<Self::Reader, Self::Writer> {
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            let mut state = state.lock().await;
            state.connects += 1;
            let (inbound_rx, outbound_tx) = state.pending.pop_front().ok_or_else(|| {
                TelemetryError::ConnectionFailed("mock endpoint unreachable".to_string())
            })?;
            Ok((
                MockReader { rx: inbound_rx },
                MockWriter { tx: outbound_tx },
            ))
        })
    }
}

/// Server-side test handle paired with [`MockTransport`].
pub struct MockServer {
    state: Arc<Mutex<MockState>>,
}

impl MockServer {
    /// Approve the next connection attempt and return its session handle.
    pub async fn allow_connection(&self) -> MockSession {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.state
            .lock()
            .await
            .pending
            .push_back((inbound_rx, outbound_tx));
        MockSession {
            inbound_tx,
            outbound_rx,
        }
    }

    /// Total connection attempts observed, successful or not.
    pub async fn connect_count(&self) -> usize {
        self.state.lock().await.connects
    }
}

/// One accepted connection as seen from the server side.
pub struct MockSession {
    inbound_tx: mpsc::UnboundedSender<Result<Frame, TelemetryError>>,
    outbound_rx: mpsc::UnboundedReceiver<Frame>,
}

impl MockSession {
    /// Push a UTF-8 payload to the actor as websocket text.
    pub fn send_text(&self, text: impl AsRef<str>) -> bool {
        self.inbound_tx
            .send(Ok(Frame::Text(Bytes::copy_from_slice(
                text.as_ref().as_bytes(),
            ))))
            .is_ok()
    }

    /// Surface a read error on the actor's reader.
    pub fn send_read_error(&self, message: impl Into<String>) -> bool {
        self.inbound_tx
            .send(Err(TelemetryError::TransportError {
                context: "read",
                error: message.into(),
            }))
            .is_ok()
    }

    /// Simulate a server-side socket drop; the actor's reader sees end of
    /// stream.
    pub fn drop_socket(self) {}

    /// Receive a frame written by the actor, with a timeout.
    pub async fn recv_outbound(&mut self, timeout: Duration) -> Option<Frame> {
        tokio::time::timeout(timeout, self.outbound_rx.recv())
            .await
            .unwrap_or_default()
    }
}

/// Reader side for [`MockTransport`].
pub struct MockReader {
    rx: mpsc::UnboundedReceiver<Result<Frame, TelemetryError>>,
}

impl futures_util::Stream for MockReader {
    type Item = Result<Frame, TelemetryError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx).poll_recv(cx)
    }
}

/// Writer side for [`MockTransport`].
pub struct MockWriter {
    tx: mpsc::UnboundedSender<Frame>,
}

impl Sink<Frame> for MockWriter {
    type Error = TelemetryError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        self.get_mut()
            .tx
            .send(item)
            .map_err(|_| TelemetryError::TransportError {
                context: "mock_transport_write",
                error: "mock outbound channel closed".to_string(),
            })
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}
