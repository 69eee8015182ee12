//! Chat message model.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Typed by the person using the client.
    User,
    /// Produced by the backend, including backend-reported errors.
    Assistant,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single transcript entry.
///
/// Created once and never mutated; the transcript only hands out shared
/// references.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Correlation-bearing identifier (`<request id>`, `<request id>_reply`, …).
    pub id: String,
    /// Author of the message.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl ChatMessage {
    /// Construct a message stamped with the current time.
    #[must_use]
    pub fn new(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Construct a user message with a freshly generated identifier.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), Role::User, content)
    }

    /// Construct an assistant message with an explicit identifier.
    #[must_use]
    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, Role::Assistant, content)
    }
}
