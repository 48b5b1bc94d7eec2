//! Error types of the command surface and the execution boundary.
//!
//! Every failure returned to the control surface is a [`DispatchError`]: a
//! stable [`ErrorCategory`] plus the underlying message. Categories group into
//! three kinds (see [`ErrorKind`]): bad caller input rejected before the driver
//! is touched, a driver call that failed to run, and anything else.

use serde::Serialize;
use std::fmt;

/// Result type alias for command dispatch.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Stable error category reported to the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCategory {
    LicenseError,
    NfcActivationError,
    NfcDeactivationError,
    ReadCardError,
    WriteCardError,
    UrlError,
    ValidationError,
    UnexpectedError,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LicenseError => "LicenseError",
            Self::NfcActivationError => "NfcActivationError",
            Self::NfcDeactivationError => "NfcDeactivationError",
            Self::ReadCardError => "ReadCardError",
            Self::WriteCardError => "WriteCardError",
            Self::UrlError => "UrlError",
            Self::ValidationError => "ValidationError",
            Self::UnexpectedError => "UnexpectedError",
        }
    }

    /// Taxonomy kind of this category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError => ErrorKind::Validation,
            Self::UnexpectedError => ErrorKind::Unexpected,
            _ => ErrorKind::DriverInvocation,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller input was rejected; the driver was not called.
    Validation,
    /// The driver call itself failed.
    DriverInvocation,
    /// Anything uncategorized.
    Unexpected,
}

/// Error returned by a command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{category}: {message}")]
pub struct DispatchError {
    pub category: ErrorCategory,
    pub message: String,
}

impl DispatchError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::ValidationError, message)
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::UnexpectedError, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.category.kind()
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

impl From<cardlink_core::Error> for DispatchError {
    fn from(error: cardlink_core::Error) -> Self {
        Self::validation(error.to_string())
    }
}

/// Errors crossing the main-context / worker boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoundaryError {
    /// The main context was dropped; nothing can be delivered anymore.
    #[error("Main context closed")]
    MainContextClosed,

    /// The blocking job panicked.
    #[error("Blocking job panicked: {0}")]
    Panicked(String),

    /// The blocking job was cancelled before it completed.
    #[error("Blocking job cancelled")]
    Cancelled,
}
