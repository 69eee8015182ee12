//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Required credential is absent from the environment.
    Credential(String),
    /// No usable backend runtime was found among the probed candidates.
    RuntimeNotFound(String),
    /// The backend process could not be spawned.
    Spawn(String),
    /// Line framing failure on the backend stream (e.g. line too long).
    Framing(String),
    /// A framed record could not be parsed as a backend response.
    Protocol(String),
    /// The backend process is not running, so the request was not written.
    BackendUnavailable(String),
    /// A chat submission contained no text.
    EmptyMessage,
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Whether this error aborts application startup.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Credential(_) | Self::RuntimeNotFound(_) | Self::Spawn(_)
        )
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Credential(msg) => write!(f, "credential: {msg}"),
            Self::RuntimeNotFound(msg) => write!(f, "runtime not found: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::Framing(msg) => write!(f, "framing: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::BackendUnavailable(msg) => write!(f, "backend unavailable: {msg}"),
            Self::EmptyMessage => write!(f, "empty message"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(format!("malformed json: {err}"))
    }
}
