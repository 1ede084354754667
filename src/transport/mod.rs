use std::future::Future;
use std::pin::Pin;

use futures_util::{Sink, Stream};

use crate::core::{Frame, TelemetryError};

pub mod tungstenite;

pub type TransportConnectFuture<R, W> =
    Pin<Box<dyn Future<Output = Result<(R, W), TelemetryError>> + Send>>;

/// Transport boundary for the telemetry stream.
///
/// The session actor owns state and policies; the transport only turns a URL
/// into a frame reader/writer pair. Keeping the trait this small lets tests
/// substitute an in-memory transport for the real websocket implementation.
pub trait Transport: Clone + Send + Sync + 'static {
    type Reader: Stream<Item = Result<Frame, TelemetryError>> + Send + Unpin + 'static;
    type Writer: Sink<Frame, Error = TelemetryError> + Send + Sync + Unpin + 'static;

    fn connect(&self, url: String) -> TransportConnectFuture<Self::Reader, Self::Writer>;
}
