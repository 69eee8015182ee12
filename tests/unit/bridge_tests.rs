//! Unit tests for the UI bridge: event hub fan-out, handler subscriptions,
//! and request forwarding through a `RequestSink`.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use chat_bridge::bridge::{Bridge, BridgeEvent, EventHub, RequestSink};
use chat_bridge::models::message::ChatMessage;
use chat_bridge::protocol::envelope::RequestEnvelope;
use chat_bridge::{AppError, Result};

/// Records requests; fails every send once `closed` is set.
#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<RequestEnvelope>>,
    closed: bool,
}

impl RequestSink for RecordingSink {
    fn send(&self, request: RequestEnvelope) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self.closed {
                return Err(AppError::BackendUnavailable("test sink closed".into()));
            }
            self.sent.lock().unwrap().push(request);
            Ok(())
        })
    }
}

fn lost(code: i32) -> BridgeEvent {
    BridgeEvent::ConnectionLost {
        exit_code: Some(code),
        message: "Lost connection to backend; please restart the app.".into(),
    }
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("handler invoked in time")
        .expect("channel open")
}

#[tokio::test]
async fn send_to_backend_forwards_to_sink() {
    let sink = Arc::new(RecordingSink::default());
    let bridge = Bridge::new(Arc::clone(&sink) as Arc<dyn RequestSink>, EventHub::new(8));

    bridge
        .send_to_backend(RequestEnvelope::new("1", "hello"))
        .await
        .expect("send succeeds");

    let sent = sink.sent.lock().unwrap();
    assert_eq!(sent.as_slice(), [RequestEnvelope::new("1", "hello")]);
}

#[tokio::test]
async fn send_failure_is_reported_to_caller() {
    let sink = Arc::new(RecordingSink {
        closed: true,
        ..RecordingSink::default()
    });
    let bridge = Bridge::new(sink, EventHub::new(8));

    let result = bridge.send_to_backend(RequestEnvelope::new("1", "hello")).await;

    assert!(matches!(result, Err(AppError::BackendUnavailable(_))));
}

#[tokio::test]
async fn response_handler_receives_replies_only() {
    let hub = EventHub::new(8);
    let bridge = Bridge::new(Arc::new(RecordingSink::default()), hub.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let _subscription = bridge.on_backend_response(move |message| {
        let _ = tx.send(message);
    });

    hub.publish(lost(1));
    hub.publish(BridgeEvent::Reply(ChatMessage::assistant("1_reply", "hi")));

    let message = recv(&mut rx).await;
    assert_eq!(message.id, "1_reply");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn error_handler_receives_connection_lost_notice() {
    let hub = EventHub::new(8);
    let bridge = Bridge::new(Arc::new(RecordingSink::default()), hub.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let _subscription = bridge.on_backend_error(move |notice| {
        let _ = tx.send(notice);
    });

    hub.publish(BridgeEvent::Reply(ChatMessage::assistant("1_reply", "hi")));
    hub.publish(lost(1));

    assert_eq!(
        recv(&mut rx).await,
        "Lost connection to backend; please restart the app."
    );
}

#[tokio::test]
async fn every_observer_sees_each_event_once() {
    let hub = EventHub::new(8);
    let bridge = Bridge::new(Arc::new(RecordingSink::default()), hub.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let subscriptions: Vec<_> = (0..3)
        .map(|observer| {
            let tx = tx.clone();
            bridge.on_backend_error(move |_| {
                let _ = tx.send(observer);
            })
        })
        .collect();
    assert_eq!(hub.observer_count(), 3);

    assert_eq!(hub.publish(lost(1)), 3);

    let mut seen = vec![recv(&mut rx).await, recv(&mut rx).await, recv(&mut rx).await];
    seen.sort_unstable();
    assert_eq!(seen, [0, 1, 2]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err(), "no duplicate deliveries");
    drop(subscriptions);
}

#[tokio::test]
async fn unsubscribed_handler_receives_nothing() {
    let hub = EventHub::new(8);
    let bridge = Bridge::new(Arc::new(RecordingSink::default()), hub.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let subscription = bridge.on_backend_response(move |message| {
        let _ = tx.send(message);
    });
    assert!(subscription.is_active());

    subscription.unsubscribe().await;
    hub.publish(BridgeEvent::Reply(ChatMessage::assistant("1_reply", "late")));

    // The handler (and its sender) is gone, so the channel closes empty.
    let next = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("channel resolves");
    assert!(next.is_none());
}

#[tokio::test]
async fn dropping_subscription_unsubscribes() {
    let hub = EventHub::new(8);
    let bridge = Bridge::new(Arc::new(RecordingSink::default()), hub.clone());
    let (tx, mut rx) = mpsc::unbounded_channel::<ChatMessage>();

    drop(bridge.on_backend_response(move |message| {
        let _ = tx.send(message);
    }));

    let next = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("channel resolves");
    assert!(next.is_none());
}

#[test]
fn publish_without_observers_returns_zero() {
    let hub = EventHub::new(4);
    assert_eq!(hub.publish(lost(1)), 0);
}
