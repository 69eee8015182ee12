//! UI-facing bridge to the backend.
//!
//! The front end never touches the backend process. It sends requests
//! through [`Bridge::send_to_backend`] and registers handlers with
//! [`Bridge::on_backend_response`] and [`Bridge::on_backend_error`]. Each
//! registration returns a [`Subscription`] that unsubscribes when dropped.
//!
//! Fan-out runs over an [`EventHub`] (a tokio broadcast channel), so every
//! registered observer sees every event in publication order.

pub mod subscription;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::models::message::ChatMessage;
use crate::protocol::envelope::RequestEnvelope;
use crate::Result;

pub use subscription::Subscription;

/// Events published to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Assistant message synthesized from a backend reply or error record.
    Reply(ChatMessage),
    /// The backend exited abnormally; the session can no longer be served.
    ConnectionLost {
        /// Process exit code, `None` when terminated by a signal.
        exit_code: Option<i32>,
        /// Human-readable notice for the user.
        message: String,
    },
}

/// Broadcast fan-out of [`BridgeEvent`]s.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<BridgeEvent>,
}

impl EventHub {
    /// Create a hub whose observers may lag by at most `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Register a raw observer.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.tx.subscribe()
    }

    /// Publish to all current observers, returning how many received it.
    pub fn publish(&self, event: BridgeEvent) -> usize {
        match self.tx.send(event) {
            Ok(count) => count,
            Err(_) => {
                debug!("no observers registered, event dropped");
                0
            }
        }
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Destination for outbound requests.
///
/// Implemented by the backend supervisor; tests substitute an in-memory sink.
pub trait RequestSink: Send + Sync {
    /// Write `request` to the backend.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BackendUnavailable`](crate::AppError::BackendUnavailable)
    /// if no backend is running to receive it.
    fn send(&self, request: RequestEnvelope) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// The operations exposed to the rendering layer.
#[derive(Clone)]
pub struct Bridge {
    sink: Arc<dyn RequestSink>,
    hub: EventHub,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("observers", &self.hub.observer_count())
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Create a bridge over `sink`, observing `hub`.
    #[must_use]
    pub fn new(sink: Arc<dyn RequestSink>, hub: EventHub) -> Self {
        Self { sink, hub }
    }

    /// Send a request to the backend.
    ///
    /// Success means the request was handed to the backend's input stream;
    /// the backend never acknowledges it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BackendUnavailable`](crate::AppError::BackendUnavailable)
    /// when the backend is not running.
    pub async fn send_to_backend(&self, request: RequestEnvelope) -> Result<()> {
        self.sink.send(request).await
    }

    /// Invoke `handler` for every synthesized assistant message.
    ///
    /// Must be called within a tokio runtime.
    pub fn on_backend_response<F>(&self, mut handler: F) -> Subscription
    where
        F: FnMut(ChatMessage) + Send + 'static,
    {
        Subscription::spawn(self.hub.subscribe(), move |event| {
            if let BridgeEvent::Reply(message) = event {
                handler(message);
            }
        })
    }

    /// Invoke `handler` with the notice text whenever the backend connection
    /// is lost.
    ///
    /// Must be called within a tokio runtime.
    pub fn on_backend_error<F>(&self, mut handler: F) -> Subscription
    where
        F: FnMut(String) + Send + 'static,
    {
        Subscription::spawn(self.hub.subscribe(), move |event| {
            if let BridgeEvent::ConnectionLost { message, .. } = event {
                handler(message);
            }
        })
    }

    /// Register a raw observer receiving every event.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.hub.subscribe()
    }
}
