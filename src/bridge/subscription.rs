//! Handler subscriptions on the event hub.

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::BridgeEvent;

/// A registered handler. Dropping it (or calling
/// [`Subscription::unsubscribe`]) stops delivery.
#[derive(Debug)]
#[must_use = "dropping a subscription unsubscribes its handler"]
pub struct Subscription {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Drive `handler` from `rx` on a background task until cancelled or the
    /// hub is dropped.
    pub(crate) fn spawn<F>(mut rx: broadcast::Receiver<BridgeEvent>, mut handler: F) -> Self
    where
        F: FnMut(BridgeEvent) + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    () = token.cancelled() => break,

                    event = rx.recv() => match event {
                        Ok(event) => handler(event),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "subscriber lagged, events skipped");
                        }
                        Err(RecvError::Closed) => {
                            debug!("event hub closed, subscription ending");
                            break;
                        }
                    },
                }
            }
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Stop delivery and wait for any in-progress handler call to finish.
    pub async fn unsubscribe(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                warn!(%err, "subscription task ended abnormally");
            }
        }
    }

    /// Whether the subscription is still delivering events.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
