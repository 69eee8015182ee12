//! Render error boundary.
//!
//! Wraps render passes. The first failed pass, whether it returned an error
//! or panicked, moves the boundary to [`BoundaryState::Faulted`]; while
//! faulted, guarded passes are skipped and the front end shows
//! [`ErrorBoundary::fallback_view`] instead. [`ErrorBoundary::reset`] is the
//! "restart application" action.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::error;

/// Title line of the fallback view.
pub const FALLBACK_TITLE: &str = "Application Error";

/// What went wrong in the failed render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultDetails {
    /// Error type name, or `panic`.
    pub kind: String,
    /// Error message.
    pub message: String,
    /// Source chain, when the error has one.
    pub detail: Option<String>,
}

impl FaultDetails {
    /// Capture an error returned by a render pass.
    #[must_use]
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }

        Self {
            kind: short_type_name::<E>().to_owned(),
            message: err.to_string(),
            detail: (!chain.is_empty()).then(|| chain.join("\ncaused by: ")),
        }
    }

    /// Capture a panic payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "No message available".to_owned());

        Self {
            kind: "panic".to_owned(),
            message,
            detail: None,
        }
    }
}

/// Boundary state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BoundaryState {
    /// Render passes run normally.
    #[default]
    Healthy,
    /// A render pass failed; the fallback view is shown.
    Faulted(FaultDetails),
}

/// Stateful guard around render passes.
#[derive(Debug, Default)]
pub struct ErrorBoundary {
    state: BoundaryState,
}

impl ErrorBoundary {
    /// Create a healthy boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `render` unless already faulted.
    ///
    /// Returns the pass's value on success and `None` when the pass failed
    /// or was skipped.
    pub fn guard<T, E, F>(&mut self, render: F) -> Option<T>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: std::error::Error + 'static,
    {
        if self.is_faulted() {
            return None;
        }

        match panic::catch_unwind(AssertUnwindSafe(render)) {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                self.fault(FaultDetails::from_error(&err));
                None
            }
            Err(payload) => {
                self.fault(FaultDetails::from_panic(payload.as_ref()));
                None
            }
        }
    }

    /// Enter the faulted state. Only the first fault is kept.
    pub fn fault(&mut self, details: FaultDetails) {
        if self.is_faulted() {
            return;
        }
        error!(kind = %details.kind, message = %details.message, "render pass failed");
        self.state = BoundaryState::Faulted(details);
    }

    /// Return to the healthy state.
    pub fn reset(&mut self) {
        self.state = BoundaryState::Healthy;
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &BoundaryState {
        &self.state
    }

    /// Whether a render pass has failed since the last reset.
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        matches!(self.state, BoundaryState::Faulted(_))
    }

    /// Lines of the fallback view, or `None` while healthy.
    #[must_use]
    pub fn fallback_view(&self) -> Option<Vec<String>> {
        let BoundaryState::Faulted(details) = &self.state else {
            return None;
        };

        let mut lines = vec![
            FALLBACK_TITLE.to_owned(),
            format!("Error Type: {}", details.kind),
            format!("Error Message: {}", details.message),
        ];
        if let Some(detail) = &details.detail {
            lines.push(format!("Details: {detail}"));
        }
        lines.push("Type /restart to restart the application.".to_owned());
        Some(lines)
    }
}

/// Last path segment of a type name, without generic arguments.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
