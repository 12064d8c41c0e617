//! Error types for the message bus.
//!
//! Argument and registration errors are raised synchronously and only fail the
//! offending call. Callback failures surface through the future returned by a
//! drain, or through the failure channel when the background loop is running.

use thiserror::Error;

/// A single failed handler invocation collected during a drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchFailure {
    /// Type name of the message that was being delivered
    pub message_type: &'static str,
    /// Stable label of the underlying error
    pub label: &'static str,
    /// Human-readable failure description
    pub reason: String,
}

impl DispatchFailure {
    pub(crate) fn from_error(message_type: &'static str, error: &BusError) -> Self {
        Self {
            message_type,
            label: error.as_label(),
            reason: error.to_string(),
        }
    }
}

impl std::fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.message_type, self.label, self.reason)
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// A required argument was absent
    #[error("Invalid argument: '{name}' must be provided")]
    InvalidArgument { name: &'static str },

    /// Duplicate registration or unregistration of an unknown receiver
    #[error("Registration error: {0}")]
    Registration(String),

    /// A handler was asked to deliver a message of a different exact type
    #[error("Message type mismatch: handler expects '{expected}', got '{actual}'")]
    MessageTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Caller-supplied callback returned an error
    #[error("Handler for '{message_type}' failed: {reason}")]
    CallbackFailed {
        message_type: &'static str,
        reason: String,
    },

    /// Caller-supplied callback panicked inside its dispatch task
    #[error("Handler for '{message_type}' panicked")]
    CallbackPanicked { message_type: &'static str },

    /// One or more callbacks failed during a drain
    #[error("{} handler invocation(s) failed during dispatch", failures.len())]
    DispatchFailed { failures: Vec<DispatchFailure> },

    #[error("Operation requires a running tokio runtime")]
    NoRuntime,

    #[error("Message bus has been disposed")]
    Disposed,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::InvalidArgument { .. } => "invalid_argument",
            BusError::Registration(_) => "registration",
            BusError::MessageTypeMismatch { .. } => "message_type_mismatch",
            BusError::CallbackFailed { .. } => "callback_failed",
            BusError::CallbackPanicked { .. } => "callback_panicked",
            BusError::DispatchFailed { .. } => "dispatch_failed",
            BusError::NoRuntime => "no_runtime",
            BusError::Disposed => "disposed",
            BusError::Configuration(_) => "configuration",
        }
    }

    /// Failures carried by a `DispatchFailed` error, empty for every other kind.
    pub fn failures(&self) -> &[DispatchFailure] {
        match self {
            BusError::DispatchFailed { failures } => failures,
            _ => &[],
        }
    }

    pub(crate) fn invalid_argument(name: &'static str) -> Self {
        BusError::InvalidArgument { name }
    }
}

impl From<config::ConfigError> for BusError {
    fn from(error: config::ConfigError) -> Self {
        BusError::Configuration(error.to_string())
    }
}

pub type BusResult<T> = std::result::Result<T, BusError>;
