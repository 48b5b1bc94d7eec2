use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Argument errors
    #[error("Invalid argument {field}: {message}")]
    InvalidArgument { field: String, message: String },

    // Code conversion errors
    #[error("Unknown result code: {0}")]
    UnknownResultCode(String),

    #[error("Unknown license code: {0}")]
    UnknownLicenseCode(String),
}

impl Error {
    /// Create an invalid argument error for the named field.
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
