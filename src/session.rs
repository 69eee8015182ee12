//! UI-side chat session state.
//!
//! Folds user submissions and [`BridgeEvent`]s into the [`Transcript`] and
//! tracks which requests are still waiting for a reply. Pending state is kept
//! per request id, so a reply to one request never clears the loading state
//! of another.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::bridge::BridgeEvent;
use crate::models::message::ChatMessage;
use crate::protocol::envelope::{request_id_of, HistoryEntry, RequestEnvelope, UNCORRELATED_ID};
use crate::transcript::Transcript;
use crate::{AppError, Result};

/// Transcript plus in-flight request bookkeeping for one UI session.
#[derive(Debug, Default)]
pub struct ChatSession {
    transcript: Transcript,
    pending: HashSet<String>,
    connection_notice: Option<String>,
    include_history: bool,
}

impl ChatSession {
    /// Create an empty session. With `include_history`, every request carries
    /// the full transcript (including the new message) as context.
    #[must_use]
    pub fn new(include_history: bool) -> Self {
        Self {
            include_history,
            ..Self::default()
        }
    }

    /// Record a user submission and build the request to send for it.
    ///
    /// The user message is appended immediately; its id is the request's
    /// correlation id.
    ///
    /// # Errors
    ///
    /// - [`AppError::EmptyMessage`] — `text` is blank.
    /// - [`AppError::BackendUnavailable`] — the connection was lost earlier in
    ///   this session.
    pub fn submit(&mut self, text: &str) -> Result<RequestEnvelope> {
        if let Some(notice) = &self.connection_notice {
            return Err(AppError::BackendUnavailable(notice.clone()));
        }
        if text.trim().is_empty() {
            return Err(AppError::EmptyMessage);
        }

        let message = ChatMessage::user(text);
        let request_id = message.id.clone();
        self.pending.insert(request_id.clone());
        self.transcript.append(message);

        let history = if self.include_history {
            self.transcript
                .messages()
                .iter()
                .map(HistoryEntry::from)
                .collect()
        } else {
            Vec::new()
        };

        debug!(id = %request_id, pending = self.pending.len(), "user message submitted");
        Ok(RequestEnvelope::new(request_id, text).with_history(history))
    }

    /// Apply a bridge event.
    pub fn apply(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::Reply(message) => {
                match request_id_of(&message.id) {
                    Some(UNCORRELATED_ID) => {
                        // Backend-wide failure not tied to a request; nothing
                        // in flight will be answered.
                        self.pending.clear();
                    }
                    Some(request_id) => {
                        self.pending.remove(request_id);
                    }
                    None => {}
                }
                self.transcript.append(message);
            }
            BridgeEvent::ConnectionLost { exit_code, message } => {
                info!(?exit_code, abandoned = self.pending.len(), "backend connection lost");
                self.pending.clear();
                self.connection_notice = Some(message);
            }
        }
    }

    /// Account for `skipped` events the front end fell too far behind to
    /// receive.
    ///
    /// Replies among them are gone, so nothing pending can be trusted to
    /// resolve; pending state is cleared. Returns the notice to show.
    pub fn events_missed(&mut self, skipped: u64) -> String {
        warn!(skipped, abandoned = self.pending.len(), "backend events missed");
        self.pending.clear();
        format!("{skipped} backend event(s) were missed; some replies may not be shown")
    }

    /// Drop the pending entry for a request whose send failed.
    ///
    /// Returns `true` if the request was pending.
    pub fn abandon(&mut self, request_id: &str) -> bool {
        self.pending.remove(request_id)
    }

    /// Whether any request is awaiting a reply.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Whether `request_id` is awaiting a reply.
    #[must_use]
    pub fn is_pending(&self, request_id: &str) -> bool {
        self.pending.contains(request_id)
    }

    /// Number of requests awaiting a reply.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Notice recorded when the backend connection was lost.
    #[must_use]
    pub fn connection_notice(&self) -> Option<&str> {
        self.connection_notice.as_deref()
    }

    /// The session transcript.
    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }
}
