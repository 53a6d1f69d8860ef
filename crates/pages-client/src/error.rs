//! Client error types.

use std::fmt;

use reqwest::StatusCode;

/// Classification of a failed API interaction.
///
/// Retry policy dispatches on this, never on message content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request itself is invalid; retrying cannot help.
    Validation,
    /// Credential expired, malformed or rejected; refresh and retry.
    Auth,
    /// Network hiccup, timeout, rate limit or server-side failure.
    Transient,
    /// Anything else the server refused.
    Fatal,
}

impl ErrorKind {
    /// Maps an HTTP status to an error kind.
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            401 | 403 => Self::Auth,
            408 | 425 | 429 => Self::Transient,
            400 | 413 | 422 => Self::Validation,
            s if s >= 500 => Self::Transient,
            _ => Self::Fatal,
        }
    }

    /// Whether an operation failing with this kind may be attempted again.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Auth | Self::Transient)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Auth => "auth",
            Self::Transient => "transient",
            Self::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// Error returned by every client call.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
pub struct ClientError {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl ClientError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fatal, message)
    }

    /// Error for a non-success HTTP response.
    pub fn from_response(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::from_status(status),
            status: Some(status.as_u16()),
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Self::from_response(status, e.to_string());
        }
        let kind = if e.is_decode() || e.is_builder() {
            ErrorKind::Fatal
        } else {
            // Connect failures, timeouts and broken bodies.
            ErrorKind::Transient
        };
        Self::new(kind, e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::fatal(format!("invalid JSON: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(ErrorKind::from_status(StatusCode::UNAUTHORIZED), ErrorKind::Auth);
        assert_eq!(ErrorKind::from_status(StatusCode::FORBIDDEN), ErrorKind::Auth);
        assert_eq!(
            ErrorKind::from_status(StatusCode::TOO_MANY_REQUESTS),
            ErrorKind::Transient
        );
        assert_eq!(
            ErrorKind::from_status(StatusCode::BAD_GATEWAY),
            ErrorKind::Transient
        );
        assert_eq!(
            ErrorKind::from_status(StatusCode::BAD_REQUEST),
            ErrorKind::Validation
        );
        assert_eq!(ErrorKind::from_status(StatusCode::NOT_FOUND), ErrorKind::Fatal);
    }

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::Auth.is_retryable());
        assert!(ErrorKind::Transient.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::Fatal.is_retryable());
    }

    #[test]
    fn display_includes_status() {
        let e = ClientError::from_response(StatusCode::SERVICE_UNAVAILABLE, "try later");
        assert_eq!(e.to_string(), "transient error (HTTP 503): try later");
        let e = ClientError::auth("bad token");
        assert_eq!(e.to_string(), "auth error: bad token");
    }
}
