//! Error types for credential and API operations.
//!
//! Every fallible operation in this crate returns a [`GoogleError`], which
//! pairs a [`GoogleErrorCode`] with a message, an optional HTTP status and an
//! optional underlying cause.

use std::fmt;
use thiserror::Error;

/// The category of a Google operation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GoogleErrorCode {
    /// No stored token exists yet; callers start a fresh grant.
    NotFound,
    /// The Gmail/Drive API or the transport beneath it failed.
    RemoteError,
    /// An interactive grant or service-account exchange was refused.
    AuthDenied,
    /// The token file could not be written or read.
    IoError,
    /// A response body or token file could not be parsed.
    InvalidResponse,
    /// Credentials or settings are missing or inconsistent.
    Configuration,
}

impl GoogleErrorCode {
    /// Returns true if the caller is expected to recover from this error.
    ///
    /// Only a missing token is recoverable: it routes into the grant flow.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Returns a stable snake_case name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::RemoteError => "remote_error",
            Self::AuthDenied => "auth_denied",
            Self::IoError => "io_error",
            Self::InvalidResponse => "invalid_response",
            Self::Configuration => "configuration_error",
        }
    }
}

impl fmt::Display for GoogleErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised while authorizing or calling Google APIs.
#[derive(Debug, Error)]
pub struct GoogleError {
    code: GoogleErrorCode,
    message: String,
    /// HTTP status, when the failure came from an HTTP response.
    status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl GoogleError {
    /// Creates a new error with the given code and message.
    pub fn new(code: GoogleErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Creates a "no stored token" error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::NotFound, message)
    }

    /// Creates a remote error, optionally carrying the HTTP status.
    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            ..Self::new(GoogleErrorCode::RemoteError, message)
        }
    }

    /// Creates an authorization-denied error.
    pub fn auth_denied(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::AuthDenied, message)
    }

    /// Creates a persistence error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::IoError, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::InvalidResponse, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::Configuration, message)
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> GoogleErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status, if the error came from a response.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns true if this error should route into the grant flow.
    pub fn is_recoverable(&self) -> bool {
        self.code.is_recoverable()
    }
}

impl fmt::Display for GoogleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({}): {}", self.code, status, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

/// A specialized Result type for Google operations.
pub type GoogleResult<T> = Result<T, GoogleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_not_found_is_recoverable() {
        assert!(GoogleErrorCode::NotFound.is_recoverable());
        assert!(!GoogleErrorCode::RemoteError.is_recoverable());
        assert!(!GoogleErrorCode::AuthDenied.is_recoverable());
        assert!(!GoogleErrorCode::IoError.is_recoverable());
    }

    #[test]
    fn error_code_names() {
        assert_eq!(GoogleErrorCode::AuthDenied.as_str(), "auth_denied");
        assert_eq!(GoogleErrorCode::RemoteError.to_string(), "remote_error");
    }

    #[test]
    fn remote_error_carries_status() {
        let err = GoogleError::remote(Some(403), "insufficient permissions");
        assert_eq!(err.code(), GoogleErrorCode::RemoteError);
        assert_eq!(err.status(), Some(403));
        assert_eq!(
            err.to_string(),
            "remote_error (403): insufficient permissions"
        );
    }

    #[test]
    fn display_without_status() {
        let err = GoogleError::not_found("no token at /tmp/token.json");
        assert_eq!(err.to_string(), "not_found: no token at /tmp/token.json");
        assert!(err.is_recoverable());
    }

    #[test]
    fn error_with_source() {
        use std::error::Error;
        let io_err = std::io::Error::other("disk full");
        let err = GoogleError::io("failed to write token file").with_source(io_err);
        assert!(err.source().is_some());
    }
}
