//! Client error types.

use std::fmt;

use gsandbox_google::GoogleError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// The requested operation is not in the allow-list.
    InvalidOperation {
        /// The name that was asked for.
        name: String,
        /// Valid operations and their parameter names.
        hint: String,
    },
    /// Parameters did not fit the operation.
    InvalidParams(String),
    /// Credential or API failure.
    Google(GoogleError),
    /// IO error.
    Io(std::io::Error),
    /// The invocation exceeded `--timeout`.
    Timeout(u64),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::InvalidOperation { name, hint } => {
                write!(f, "invalid function: {}\n\n{}", name, hint)
            }
            Self::InvalidParams(msg) => write!(f, "invalid parameters: {}", msg),
            Self::Google(err) => write!(f, "{}", err),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Timeout(secs) => write!(f, "timed out after {} seconds", secs),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Google(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<GoogleError> for ClientError {
    fn from(err: GoogleError) -> Self {
        Self::Google(err)
    }
}
