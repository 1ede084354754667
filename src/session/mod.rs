//! Telemetry session actor.
//!
//! The websocket IO loop runs outside kameo; the actor owns connection state
//! and policies and receives frames via messages. Because every handler runs
//! to completion before the next message is taken from the mailbox, inbound
//! frames, sampling ticks, and disconnect handling never interleave.

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::time::Duration;
use tokio::{sync::broadcast, sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use kameo::prelude::{Actor, ActorRef, Context, Message as KameoMessage, WeakActorRef};

use crate::aggregate::SamplingAggregator;
use crate::core::{
    ConnectionState, CoreEvent, DisconnectCause, ExponentialBackoff, Frame, NotificationThrottle,
    NotifyChannel, SessionConfig, Severity, StreamHealth, StreamStats, TelemetryResult, frame_bytes,
    into_frame,
};
use crate::raw_log::RawLog;
use crate::router::{Classified, MessageRouter};
use crate::transport::Transport;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Arguments passed when constructing a session actor instance.
pub struct SessionActorArgs<T: Transport> {
    pub config: SessionConfig,
    pub transport: T,
}

/// The one logical telemetry session. Holds at most one live transport
/// connection at a time; reconnection is driven from inside.
pub struct SessionActor<T: Transport> {
    config: SessionConfig,
    transport: T,
    state: ConnectionState,
    stopped: bool,
    backoff: ExponentialBackoff,
    router: MessageRouter,
    aggregator: SamplingAggregator,
    raw_log: RawLog,
    throttle: NotificationThrottle,
    health: StreamHealth,
    events: broadcast::Sender<CoreEvent>,
    actor_ref: ActorRef<Self>,
    writer: Option<T::Writer>,
    reader_task: Option<JoinHandle<()>>,
    sampling_task: Option<JoinHandle<()>>,
    refresh_task: Option<JoinHandle<()>>,
    retry_task: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<T: Transport> Actor for SessionActor<T> {
    type Args = SessionActorArgs<T>;
    type Error = crate::core::TelemetryError;

    fn name() -> &'static str {
        "SessionActor"
    }

    async fn on_start(args: Self::Args, ctx: ActorRef<Self>) -> TelemetryResult<Self> {
        let SessionActorArgs { config, transport } = args;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            backoff: ExponentialBackoff::from_config(&config.backoff),
            router: MessageRouter::new(),
            aggregator: SamplingAggregator::new(config.series_capacity, config.display_window),
            raw_log: RawLog::new(config.raw_log_capacity, config.log_sampling),
            throttle: NotificationThrottle::new(config.notify_min_interval),
            health: StreamHealth::new(),
            config,
            transport,
            state: ConnectionState::Disconnected,
            stopped: false,
            events,
            actor_ref: ctx,
            writer: None,
            reader_task: None,
            sampling_task: None,
            refresh_task: None,
            retry_task: None,
            shutdown_tx,
            shutdown_rx,
        })
    }

    async fn on_stop(
        &mut self,
        _ctx: WeakActorRef<Self>,
        _reason: kameo::error::ActorStopReason,
    ) -> TelemetryResult<()> {
        self.stop_all_tasks().await;
        Ok(())
    }

    fn on_panic(
        &mut self,
        _actor_ref: kameo::actor::WeakActorRef<Self>,
        err: kameo::prelude::PanicError,
    ) -> impl std::future::Future<
        Output = Result<std::ops::ControlFlow<kameo::prelude::ActorStopReason>, Self::Error>,
    > + Send {
        async move {
            tracing::error!(error = ?err, "SessionActor panicked");
            Ok(std::ops::ControlFlow::Break(
                kameo::prelude::ActorStopReason::Panicked(err),
            ))
        }
    }
}

/// Events processed by the session actor.
#[derive(Debug)]
pub enum SessionEvent {
    Connect,
    Disconnect {
        reason: String,
        cause: DisconnectCause,
    },
    Inbound(Frame),
    SampleTick,
    RefreshTick,
    SendDiagnosticPing,
    ReconnectNow,
    Stop,
}

pub(crate) struct ConnectionEstablished<T: Transport>(pub(crate) T::Reader, pub(crate) T::Writer);

pub(crate) struct ConnectionFailed {
    pub(crate) error: String,
}

pub struct GetConnectionStatus;
pub struct GetStats;
pub struct GetSeriesView;
pub struct GetRawLog;
pub struct Subscribe;

impl<T: Transport> KameoMessage<SessionEvent> for SessionActor<T> {
    type Reply = TelemetryResult<()>;

    async fn handle(
        &mut self,
        event: SessionEvent,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if self.stopped {
            return Ok(());
        }
        match event {
            SessionEvent::Connect => self.handle_connect(),
            SessionEvent::Disconnect { reason, cause } => {
                self.handle_disconnect(reason, cause).await;
            }
            SessionEvent::Inbound(frame) => self.process_inbound(frame).await,
            SessionEvent::SampleTick => self.handle_sample_tick(),
            SessionEvent::RefreshTick => self.handle_refresh_tick(),
            SessionEvent::SendDiagnosticPing => self.send_diagnostic_ping().await,
            SessionEvent::ReconnectNow => self.handle_reconnect_now().await,
            SessionEvent::Stop => self.handle_stop().await,
        }
        Ok(())
    }
}

impl<T: Transport> KameoMessage<ConnectionEstablished<T>> for SessionActor<T> {
    type Reply = TelemetryResult<()>;

    async fn handle(
        &mut self,
        msg: ConnectionEstablished<T>,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.on_connection_established(msg.0, msg.1);
        Ok(())
    }
}

impl<T: Transport> KameoMessage<ConnectionFailed> for SessionActor<T> {
    type Reply = TelemetryResult<()>;

    async fn handle(
        &mut self,
        msg: ConnectionFailed,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if self.stopped {
            return Ok(());
        }
        let reason = format!("handshake failed: {}", msg.error);
        let cause = DisconnectCause::HandshakeFailed { message: msg.error };
        self.handle_disconnect(reason, cause).await;
        Ok(())
    }
}

impl<T: Transport> KameoMessage<GetConnectionStatus> for SessionActor<T> {
    type Reply = TelemetryResult<ConnectionState>;

    async fn handle(
        &mut self,
        _message: GetConnectionStatus,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        Ok(self.state)
    }
}

impl<T: Transport> KameoMessage<GetStats> for SessionActor<T> {
    type Reply = TelemetryResult<StreamStats>;

    async fn handle(
        &mut self,
        _message: GetStats,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        Ok(self.health.get_stats())
    }
}

impl<T: Transport> KameoMessage<GetSeriesView> for SessionActor<T> {
    type Reply = TelemetryResult<Vec<crate::core::AggregatePoint>>;

    async fn handle(
        &mut self,
        _message: GetSeriesView,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        Ok(self.aggregator.window_view(Utc::now()))
    }
}

impl<T: Transport> KameoMessage<GetRawLog> for SessionActor<T> {
    type Reply = TelemetryResult<Vec<String>>;

    async fn handle(
        &mut self,
        _message: GetRawLog,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        Ok(self.raw_log.snapshot())
    }
}

impl<T: Transport> KameoMessage<Subscribe> for SessionActor<T> {
    type Reply = TelemetryResult<broadcast::Receiver<CoreEvent>>;

    async fn handle(
        &mut self,
        _message: Subscribe,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        Ok(self.events.subscribe())
    }
}

#[derive(Serialize)]
struct DiagnosticPing<'a> {
    r#type: &'a str,
    timestamp: String,
}

impl<T: Transport> SessionActor<T> {
    fn handle_connect(&mut self) {
        // A Connect while Connecting or Connected would open a second socket.
        if self.state != ConnectionState::Disconnected {
            debug!(url = %self.config.url, state = ?self.state, "connect request ignored");
            return;
        }
        self.set_state(ConnectionState::Connecting);

        let self_ref = self.actor_ref.clone();
        let url = self.config.url.clone();
        let transport = self.transport.clone();

        tokio::spawn(async move {
            match transport.connect(url).await {
                Ok((reader, writer)) => {
                    let _ = self_ref
                        .tell(ConnectionEstablished::<T>(reader, writer))
                        .send()
                        .await;
                }
                Err(err) => {
                    let _ = self_ref
                        .tell(ConnectionFailed {
                            error: err.to_string(),
                        })
                        .send()
                        .await;
                }
            };
        });
    }

    fn on_connection_established(&mut self, reader: T::Reader, writer: T::Writer) {
        if self.stopped || self.state != ConnectionState::Connecting {
            debug!(
                url = %self.config.url,
                state = ?self.state,
                "dropping connection established out of order"
            );
            return;
        }

        info!(url = %self.config.url, "telemetry connection established");
        self.backoff.reset();
        self.health.reset();
        self.writer = Some(writer);
        self.set_state(ConnectionState::Connected);
        self.notify(
            NotifyChannel::ConnectionStatus,
            "connected".to_string(),
            Severity::Success,
        );

        self.reset_shutdown_channel();
        self.spawn_reader(reader);
        self.sampling_task =
            Some(self.spawn_ticker(self.config.sampling_interval, || SessionEvent::SampleTick));
        self.refresh_task =
            Some(self.spawn_ticker(self.config.refresh_interval, || SessionEvent::RefreshTick));
    }

    fn spawn_reader(&mut self, mut reader: T::Reader) {
        if let Some(handle) = self.reader_task.take() {
            handle.abort();
        }

        let actor_ref = self.actor_ref.clone();
        let url = self.config.url.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();

        self.reader_task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    res = shutdown_rx.changed() => {
                        if res.is_err() || *shutdown_rx.borrow_and_update() { break; }
                    }
                    frame = reader.next() => {
                        match frame {
                            Some(Ok(Frame::Close(reason))) => {
                                info!(url = %url, close = ?reason, "received close frame");
                                let _ = actor_ref
                                    .tell(SessionEvent::Disconnect {
                                        reason: reason.unwrap_or_else(|| "remote closed".to_string()),
                                        cause: DisconnectCause::RemoteClosed,
                                    })
                                    .send()
                                    .await;
                                break;
                            }
                            Some(Ok(Frame::Ping(_))) | Some(Ok(Frame::Pong(_))) => {}
                            Some(Ok(frame)) => {
                                if actor_ref.tell(SessionEvent::Inbound(frame)).send().await.is_err() {
                                    break;
                                }
                            }
                            Some(Err(err)) => {
                                let _ = actor_ref
                                    .tell(SessionEvent::Disconnect {
                                        reason: format!("read error: {err}"),
                                        cause: DisconnectCause::ReadFailure { error: err.to_string() },
                                    })
                                    .send()
                                    .await;
                                break;
                            }
                            None => {
                                let _ = actor_ref
                                    .tell(SessionEvent::Disconnect {
                                        reason: "stream ended".to_string(),
                                        cause: DisconnectCause::RemoteClosed,
                                    })
                                    .send()
                                    .await;
                                break;
                            }
                        }
                    }
                }
            }
        }));
    }

    fn spawn_ticker(
        &self,
        interval: Duration,
        make_event: fn() -> SessionEvent,
    ) -> JoinHandle<()> {
        let actor_ref = self.actor_ref.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; the cadence starts one
            // interval from now.
            ticker.tick().await;
            loop {
                tokio::select! {
                    res = shutdown_rx.changed() => {
                        if res.is_err() || *shutdown_rx.borrow_and_update() { break; }
                    }
                    _ = ticker.tick() => {
                        if actor_ref.tell(make_event()).send().await.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    }

    async fn process_inbound(&mut self, frame: Frame) {
        self.health.record_message();
        let Some(bytes) = frame_bytes(&frame) else {
            return;
        };

        let classified = match self.router.route(bytes, Utc::now()) {
            Ok(classified) => classified,
            Err(err) => {
                self.health.record_parse_error();
                warn!(url = %self.config.url, error = %err, "dropping unparseable message");
                return;
            }
        };

        match classified {
            Classified::Alert { text } => {
                self.push_raw_entry(format!("ALERT: {text}"), false);
                self.notify(NotifyChannel::Alert, text, Severity::Error);
            }
            Classified::System { message } => {
                self.push_raw_entry(format!("SYSTEM: {message}"), false);
                self.notify(NotifyChannel::System, message, Severity::Info);
            }
            Classified::Reading(reading) => {
                if let Some(level) = self.router.status_signal(&reading) {
                    let _ = self.events.send(CoreEvent::Status(level));
                    self.notify(
                        NotifyChannel::Alert,
                        level.message().to_string(),
                        level.severity(),
                    );
                }
                let entry = reading
                    .raw_text
                    .clone()
                    .unwrap_or_else(|| format!("{}={}", reading.name, reading.value));
                self.aggregator.ingest(&reading);
                self.push_raw_entry(entry, true);
            }
            Classified::Unrecognized => {
                debug!(url = %self.config.url, "dropping unrecognized message shape");
            }
        }
    }

    fn handle_sample_tick(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        if let Some(point) = self.aggregator.sample(Utc::now()) {
            let _ = self.events.send(CoreEvent::Aggregate(point));
        }
    }

    fn handle_refresh_tick(&mut self) {
        let view = self.aggregator.window_view(Utc::now());
        let _ = self.events.send(CoreEvent::SeriesView(view));
    }

    async fn send_diagnostic_ping(&mut self) {
        let Some(writer) = self.writer.as_mut() else {
            debug!(url = %self.config.url, "skipping diagnostic ping (not connected)");
            return;
        };

        let ping = DiagnosticPing {
            r#type: "ping",
            timestamp: Utc::now().to_rfc3339(),
        };
        let payload = match sonic_rs::to_vec(&ping) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(url = %self.config.url, error = %err, "diagnostic ping serialization failed");
                return;
            }
        };

        if let Err(err) = writer.send(into_frame(payload)).await {
            let reason = format!("diagnostic ping send failed: {err}");
            let cause = DisconnectCause::WriteFailure {
                error: err.to_string(),
            };
            self.handle_disconnect(reason, cause).await;
        }
    }

    async fn handle_disconnect(&mut self, reason: String, cause: DisconnectCause) {
        if self.state == ConnectionState::Disconnected {
            debug!(url = %self.config.url, reason = %reason, "already disconnected");
            return;
        }

        self.stop_io_tasks().await;
        self.set_state(ConnectionState::Disconnected);
        self.schedule_retry(&reason, &cause);
    }

    fn schedule_retry(&mut self, reason: &str, cause: &DisconnectCause) {
        let delay = self.backoff.next_delay();
        let attempt = self.backoff.attempt();
        self.health.increment_reconnect();

        let stats = self.health.get_stats();
        warn!(
            url = %self.config.url,
            reason = %reason,
            cause = ?cause,
            attempt,
            delay_ms = delay.as_millis().min(u64::MAX as u128) as u64,
            uptime_ms = stats.uptime.as_millis().min(u64::MAX as u128) as u64,
            messages = stats.messages,
            "telemetry reconnect scheduled"
        );

        let every = self.config.disconnect_notify_every.max(1);
        if attempt == 1 || attempt % every == 0 {
            self.notify(
                NotifyChannel::ConnectionStatus,
                format!("disconnected, retrying in {}s", delay.as_secs()),
                Severity::Warning,
            );
        }

        if let Some(handle) = self.retry_task.take() {
            handle.abort();
        }
        let actor_ref = self.actor_ref.clone();
        self.retry_task = Some(tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let _ = actor_ref.tell(SessionEvent::Connect).send().await;
        }));
    }

    async fn handle_reconnect_now(&mut self) {
        if let Some(handle) = self.retry_task.take() {
            handle.abort();
        }
        self.backoff.reset();

        match self.state {
            ConnectionState::Connecting => {}
            ConnectionState::Disconnected => self.handle_connect(),
            ConnectionState::Connected => {
                info!(url = %self.config.url, "manual reconnect requested");
                self.stop_io_tasks().await;
                self.set_state(ConnectionState::Disconnected);
                self.handle_connect();
            }
        }
    }

    async fn handle_stop(&mut self) {
        info!(url = %self.config.url, "telemetry session stopped");
        if let Some(handle) = self.retry_task.take() {
            handle.abort();
        }
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.send(Frame::Close(None)).await;
        }
        self.stop_io_tasks().await;
        self.set_state(ConnectionState::Disconnected);
        self.stopped = true;
    }

    async fn stop_all_tasks(&mut self) {
        if let Some(handle) = self.retry_task.take() {
            handle.abort();
        }
        self.stop_io_tasks().await;
    }

    async fn stop_io_tasks(&mut self) {
        let _ = self.shutdown_tx.send(true);
        Self::await_task(&mut self.reader_task).await;
        Self::await_task(&mut self.sampling_task).await;
        Self::await_task(&mut self.refresh_task).await;
        self.writer = None;
        self.reset_shutdown_channel();
    }

    async fn await_task(handle: &mut Option<JoinHandle<()>>) {
        if let Some(handle) = handle.take() {
            if let Err(err) = handle.await {
                warn!("task terminated with error: {err}");
            }
        }
    }

    fn reset_shutdown_channel(&mut self) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown_tx = shutdown_tx;
        self.shutdown_rx = shutdown_rx;
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        info!(url = %self.config.url, from = ?self.state, to = ?state, "connection state changed");
        self.state = state;
        let _ = self.events.send(CoreEvent::StateChanged(state));
    }

    fn notify(&mut self, channel: NotifyChannel, message: String, severity: Severity) {
        if self.throttle.try_emit(channel) {
            let _ = self.events.send(CoreEvent::Notification {
                channel,
                message,
                severity,
            });
        } else {
            debug!(channel = channel.as_str(), message = %message, "notification suppressed");
        }
    }

    fn push_raw_entry(&mut self, entry: String, sampled: bool) {
        let kept = if sampled {
            self.raw_log.append_sampled(entry.clone())
        } else {
            self.raw_log.append_always(entry.clone());
            true
        };
        if kept {
            let _ = self.events.send(CoreEvent::RawLog(entry));
        }
    }
}
