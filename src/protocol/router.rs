//! Response routing.
//!
//! Each framed line from the backend is parsed as a [`ResponseEnvelope`] and
//! turned into at most one assistant [`ChatMessage`]:
//!
//! | Record                          | Message id        | Content          |
//! |---------------------------------|-------------------|------------------|
//! | non-empty `reply`               | `<id>_reply`      | reply text       |
//! | non-empty `error` (no reply)    | `<id>_error`      | `Error: <error>` |
//! | neither                         | *(none)*          |                  |
//!
//! Malformed lines are logged and dropped; they never propagate past
//! [`ResponseRouter::route`].

use tracing::{debug, warn};

use crate::bridge::{BridgeEvent, EventHub};
use crate::models::message::ChatMessage;
use crate::protocol::envelope::{error_id, reply_id, ResponseEnvelope};
use crate::Result;

/// Prefix prepended to backend-reported errors in the transcript.
pub const ERROR_PREFIX: &str = "Error: ";

/// Parse a single framed line into an assistant message.
///
/// # Return value
///
/// - `Ok(Some(message))` — the line carries a reply or an error.
/// - `Ok(None)` — the line is blank, or a valid record with neither field.
/// - `Err(AppError::Protocol(...))` — the line is not a JSON object of the
///   expected shape.
///
/// # Errors
///
/// Returns [`AppError::Protocol`](crate::AppError::Protocol) for malformed JSON.
pub fn parse_response_line(line: &str) -> Result<Option<ChatMessage>> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    let envelope: ResponseEnvelope = serde_json::from_str(line)?;
    Ok(synthesize(&envelope))
}

/// Build the assistant message for a parsed envelope.
#[must_use]
pub fn synthesize(envelope: &ResponseEnvelope) -> Option<ChatMessage> {
    let source_id = envelope.source_id();

    if let Some(reply) = envelope.reply.as_deref().filter(|r| !r.is_empty()) {
        return Some(ChatMessage::assistant(reply_id(source_id), reply));
    }

    if let Some(error) = envelope.error.as_deref().filter(|e| !e.is_empty()) {
        return Some(ChatMessage::assistant(
            error_id(source_id),
            format!("{ERROR_PREFIX}{error}"),
        ));
    }

    debug!(id = source_id, "backend record has neither reply nor error");
    None
}

/// Dispatches synthesized messages to every observer registered on the hub.
#[derive(Debug, Clone)]
pub struct ResponseRouter {
    hub: EventHub,
}

impl ResponseRouter {
    /// Create a router publishing into `hub`.
    #[must_use]
    pub fn new(hub: EventHub) -> Self {
        Self { hub }
    }

    /// Route one framed line. Returns `true` if a message was dispatched.
    pub fn route(&self, line: &str) -> bool {
        match parse_response_line(line) {
            Ok(Some(message)) => {
                debug!(id = %message.id, "dispatching backend response");
                self.hub.publish(BridgeEvent::Reply(message));
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!(error = %err, raw_line = %line, "failed to parse backend response, dropping");
                false
            }
        }
    }
}
