//! Append-only chat transcript.
//!
//! Insertion order is display order. Entries are never removed, edited or
//! deduplicated; two entries with the same id are both kept. Subscribers are
//! notified through a [`watch`] channel carrying the entry count, which the
//! front end uses as a re-render trigger.

use tokio::sync::watch;
use tracing::trace;

use crate::models::message::ChatMessage;

/// Ordered log of the session's chat messages.
#[derive(Debug)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    revision: watch::Sender<usize>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    /// Create an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            messages: Vec::new(),
            revision,
        }
    }

    /// Append `message` and notify subscribers.
    pub fn append(&mut self, message: ChatMessage) {
        trace!(id = %message.id, role = message.role.as_str(), "transcript append");
        self.messages.push(message);
        self.revision.send_replace(self.messages.len());
    }

    /// All entries in display order.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the transcript has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Subscribe to change notifications; the value is the entry count.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.revision.subscribe()
    }
}
