//! Resilient sensor telemetry stream core.
//!
//! One logical websocket session over an unstable link, with automatic
//! reconnection and exponential backoff; inbound messages are classified,
//! averaged into time-windowed aggregate points, and retained in a bounded
//! raw-message log. Chart rendering and page layout live downstream and
//! consume the [`CoreEvent`] broadcast stream.

pub mod aggregate;
pub mod core;
pub mod raw_log;
pub mod router;
pub mod session;
pub mod testing;
pub mod tls;
pub mod transport;

pub use aggregate::SamplingAggregator;
pub use core::{
    AggregatePoint, ConnectionState, CoreEvent, Frame, NotifyChannel, SensorReading,
    SessionConfig, Severity, StatusLevel, TelemetryError, TelemetryResult,
};
pub use router::{Classified, MessageRouter};
pub use session::{
    GetConnectionStatus, GetRawLog, GetSeriesView, GetStats, SessionActor, SessionActorArgs,
    SessionEvent, Subscribe,
};
