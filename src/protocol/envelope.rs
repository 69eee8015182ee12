//! Request and response envelopes exchanged with the backend.

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::message::{ChatMessage, Role};

/// Suffix appended to a request id to form its reply message id.
pub const REPLY_SUFFIX: &str = "_reply";

/// Suffix appended to a request id to form its error message id.
pub const ERROR_SUFFIX: &str = "_error";

/// Correlation id used when the backend sends a record without one.
///
/// The backend does this when it cannot start serving, e.g. when its own
/// credential check fails before any request was read.
pub const UNCORRELATED_ID: &str = "backend";

/// One prior transcript entry sent for conversational context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Author of the entry.
    pub role: Role,
    /// Entry text.
    pub content: String,
}

impl From<&ChatMessage> for HistoryEntry {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Host → backend record: `{"id": …, "message": …}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestEnvelope {
    /// Correlation id, equal to the id of the user message that caused it.
    pub id: String,
    /// The user's text.
    pub message: String,
    /// Earlier transcript entries; omitted from the wire when empty.
    #[serde(rename = "messages", default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryEntry>,
}

impl RequestEnvelope {
    /// Build a request without history.
    #[must_use]
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            history: Vec::new(),
        }
    }

    /// Attach conversation history.
    #[must_use]
    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.history = history;
        self
    }

    /// Serialize to a single compact JSON line (without the newline).
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`](crate::AppError::Protocol) if
    /// serialization fails.
    pub fn to_line(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Backend → host record: `{"id": …, "reply": …}` or `{"id": …, "error": …}`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ResponseEnvelope {
    /// Correlation id; `None` when absent, null, or not a string/number.
    #[serde(default, deserialize_with = "deserialize_correlation_id")]
    pub id: Option<String>,
    /// Successful reply text.
    #[serde(default)]
    pub reply: Option<String>,
    /// Backend-reported error text.
    #[serde(default)]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// Correlation id, falling back to [`UNCORRELATED_ID`].
    #[must_use]
    pub fn source_id(&self) -> &str {
        self.id.as_deref().unwrap_or(UNCORRELATED_ID)
    }
}

/// Id of the message synthesized from a reply to `request_id`.
#[must_use]
pub fn reply_id(request_id: &str) -> String {
    format!("{request_id}{REPLY_SUFFIX}")
}

/// Id of the message synthesized from an error for `request_id`.
#[must_use]
pub fn error_id(request_id: &str) -> String {
    format!("{request_id}{ERROR_SUFFIX}")
}

/// Recover the request id from a synthesized reply or error message id.
///
/// Returns `None` for ids that carry neither suffix.
#[must_use]
pub fn request_id_of(message_id: &str) -> Option<&str> {
    message_id
        .strip_suffix(REPLY_SUFFIX)
        .or_else(|| message_id.strip_suffix(ERROR_SUFFIX))
}

/// Accept string or numeric ids; anything else is treated as missing.
fn deserialize_correlation_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
