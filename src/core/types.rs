use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Convenience result alias for telemetry session operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Canonical error surface shared across the crate.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Transport error ({context}): {error}")]
    TransportError {
        context: &'static str,
        error: String,
    },

    #[error("Parse failed: {0}")]
    ParseFailed(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Actor error: {0}")]
    ActorError(String),

    #[error("Timeout: {context}")]
    Timeout { context: String },
}

/// High-level connection status of the telemetry session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Why the session left the Connected (or Connecting) state.
#[derive(Debug, Clone)]
pub enum DisconnectCause {
    RemoteClosed,
    ReadFailure { error: String },
    WriteFailure { error: String },
    HandshakeFailed { message: String },
}

/// Severity attached to throttled notification requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Derived device status signal carried by readings named `status`.
///
/// The wire encodes 1 = well, 2 = not well; any other value carries no
/// status meaning and the reading is aggregated like any other sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusLevel {
    Well,
    NotWell,
}

impl StatusLevel {
    pub fn from_value(value: f64) -> Option<Self> {
        if value == 1.0 {
            Some(StatusLevel::Well)
        } else if value == 2.0 {
            Some(StatusLevel::NotWell)
        } else {
            None
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            StatusLevel::Well => "device status: well",
            StatusLevel::NotWell => "device status: not well",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            StatusLevel::Well => Severity::Success,
            StatusLevel::NotWell => Severity::Error,
        }
    }
}

/// Independent notification channels rate-limited by the throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NotifyChannel {
    ConnectionStatus,
    Alert,
    System,
}

impl NotifyChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            NotifyChannel::ConnectionStatus => "connection-status",
            NotifyChannel::Alert => "alert",
            NotifyChannel::System => "system",
        }
    }
}

/// One classified sensor observation. Immutable once constructed; only the
/// message router builds these, and only for `{name, value}` shapes.
#[derive(Debug, Clone, Serialize)]
pub struct SensorReading {
    pub name: String,
    pub value: f64,
    pub raw_text: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Per-sensor means over one sampling interval, stamped with the tick time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatePoint {
    pub window_ts: DateTime<Utc>,
    pub values: HashMap<String, f64>,
}

/// Events published to the presentation layer on the session's broadcast
/// channel. Rendering is entirely the consumer's responsibility.
#[derive(Debug, Clone, Serialize)]
pub enum CoreEvent {
    StateChanged(ConnectionState),
    Aggregate(AggregatePoint),
    SeriesView(Vec<AggregatePoint>),
    RawLog(String),
    Notification {
        channel: NotifyChannel,
        message: String,
        severity: Severity,
    },
    Status(StatusLevel),
}

/// Reconnect backoff bounds.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub base: Duration,
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

/// Raw-log write-volume policy for reading-derived entries.
///
/// Alert/system entries bypass the policy and are always logged.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogSamplingConfig {
    #[default]
    All,
    Periodic {
        every: u32,
    },
    Random {
        probability: f64,
        seed: Option<u64>,
    },
}

/// Externally supplied session configuration. Nothing here is hard-coded in
/// the session logic; defaults match the reference deployment.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub url: String,
    pub sampling_interval: Duration,
    pub refresh_interval: Duration,
    pub display_window: Duration,
    pub series_capacity: usize,
    pub raw_log_capacity: usize,
    pub backoff: BackoffConfig,
    pub notify_min_interval: Duration,
    /// Emit the throttled "disconnected, retrying" notice on the first failed
    /// attempt and every Nth thereafter.
    pub disconnect_notify_every: u32,
    pub log_sampling: LogSamplingConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8765/".to_string(),
            sampling_interval: Duration::from_secs(1),
            refresh_interval: Duration::from_secs(1),
            display_window: Duration::from_secs(60),
            series_capacity: 600,
            raw_log_capacity: 200,
            backoff: BackoffConfig::default(),
            notify_min_interval: Duration::from_secs(5),
            disconnect_notify_every: 5,
            log_sampling: LogSamplingConfig::All,
        }
    }
}
