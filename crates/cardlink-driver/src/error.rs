//! Error types for driver invocations.
//!
//! A `DriverError` means the driver call itself failed to run: the reader
//! could not be reached, the license server timed out, the driver rejected the
//! request. Failures that the hardware reports later, through a callback, are
//! result codes on events and never show up here.

use crate::traits::DriverOperation;

/// Result type alias for driver calls.
pub type Result<T> = std::result::Result<T, DriverError>;

/// Errors raised by a driver entry point.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    /// Reader is not connected or has been disconnected.
    #[error("Reader disconnected: {device}")]
    Disconnected { device: String },

    /// Call timed out after the given duration.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The device does not support this operation (e.g. no NFC hardware).
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Reader communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// License server could not complete the request.
    #[error("License server error: {message}")]
    LicenseServer { message: String },

    /// Driver refused the request in its current state.
    #[error("{operation} rejected: {message}")]
    Rejected {
        operation: DriverOperation,
        message: String,
    },

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl DriverError {
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    pub fn license_server(message: impl Into<String>) -> Self {
        Self::LicenseServer {
            message: message.into(),
        }
    }

    pub fn rejected(operation: DriverOperation, message: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}
