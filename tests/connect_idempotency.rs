use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures_util::Sink;
use futures_util::stream;
use kameo::prelude::{Actor, ActorRef};
use telemetry_ws::core::{Frame, SessionConfig, TelemetryError};
use telemetry_ws::session::{GetConnectionStatus, SessionActor, SessionActorArgs, SessionEvent};
use telemetry_ws::transport::{Transport, TransportConnectFuture};
use telemetry_ws::ConnectionState;

#[derive(Clone)]
struct CountingTransport {
    connects: Arc<AtomicUsize>,
    delay: Duration,
}

impl Transport for CountingTransport {
    type Reader = stream::Pending<Result<Frame, TelemetryError>>;
    type Writer = StubWriter;

    fn connect(&self, _url: String) -> TransportConnectFuture<Self::Reader, Self::Writer> {
        let connects = self.connects.clone();
        let delay = self.delay;
        Box::pin(async move {
            connects.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Ok((stream::pending(), StubWriter))
        })
    }
}

#[derive(Clone, Copy)]
struct StubWriter;

impl Sink<Frame> for StubWriter {
    type Error = TelemetryError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, _item: Frame) -> Result<(), Self::Error> {
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}

async fn wait_connected<T: Transport>(actor: &ActorRef<SessionActor<T>>, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    loop {
        let status = actor.ask(GetConnectionStatus).await.unwrap();
        if status == ConnectionState::Connected {
            return;
        }
        if Instant::now() >= deadline {
            panic!("timed out waiting for Connected status (last={status:?})");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connect_is_single_flight_and_idempotent() {
    let connects = Arc::new(AtomicUsize::new(0));
    let actor = SessionActor::spawn(SessionActorArgs {
        config: SessionConfig {
            url: "ws://counting".to_string(),
            ..SessionConfig::default()
        },
        transport: CountingTransport {
            connects: connects.clone(),
            delay: Duration::from_millis(100),
        },
    });

    for _ in 0..50 {
        actor.tell(SessionEvent::Connect).send().await.unwrap();
    }

    wait_connected(&actor, Duration::from_secs(1)).await;
    assert_eq!(
        connects.load(Ordering::SeqCst),
        1,
        "connect() should only be invoked once while a handshake is in flight"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connect_while_connected_is_a_no_op() {
    let connects = Arc::new(AtomicUsize::new(0));
    let actor = SessionActor::spawn(SessionActorArgs {
        config: SessionConfig {
            url: "ws://counting".to_string(),
            ..SessionConfig::default()
        },
        transport: CountingTransport {
            connects: connects.clone(),
            delay: Duration::from_millis(1),
        },
    });

    actor.tell(SessionEvent::Connect).send().await.unwrap();
    wait_connected(&actor, Duration::from_secs(1)).await;

    for _ in 0..10 {
        actor.tell(SessionEvent::Connect).send().await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(connects.load(Ordering::SeqCst), 1);
}
