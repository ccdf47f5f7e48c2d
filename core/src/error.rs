//! Error types for the fetch core.
//!
//! # Design
//! `TransportError` covers everything the network can do wrong during one
//! attempt and is the only retryable class. `FetchError` adds the failures
//! that retrying cannot fix: offline device, bad configuration, malformed
//! body. The listener never sees either type; every variant collapses to
//! `on_request_failed` at the task boundary and is only logged.

use thiserror::Error;

use crate::types::ResultShape;

/// A failure while talking to the server during a single attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, reset, timed out, or the body stream broke.
    #[error("I/O error: {0}")]
    Io(String),

    /// The server answered 404. The laundry backend does this spuriously.
    #[error("not found: {url}")]
    NotFound { url: String },

    /// The server answered with another non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Why a fetch did not produce a result.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("device is offline")]
    Offline,

    #[error("fetch was cancelled")]
    Cancelled,

    #[error("request has no URL")]
    MissingUrl,

    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("result shape {0:?} is not supported")]
    UnsupportedShape(ResultShape),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server was reachable but the body is not the expected document.
    #[error("malformed response body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error("gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },
}

impl FetchError {
    /// Only transport failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_are_transient() {
        assert!(FetchError::from(TransportError::Io("reset".into())).is_transient());
        assert!(FetchError::from(TransportError::NotFound { url: "http://x".into() }).is_transient());
        assert!(!FetchError::Offline.is_transient());
        assert!(!FetchError::MissingUrl.is_transient());
        assert!(!FetchError::UnsupportedShape(ResultShape::Unknown).is_transient());

        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(!FetchError::from(parse_err).is_transient());
    }

    #[test]
    fn retries_exhausted_keeps_last_transport_error() {
        let err = FetchError::RetriesExhausted {
            attempts: 3,
            source: TransportError::Status {
                status: 503,
                body: "busy".into(),
            },
        };
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "gave up after 3 attempts: HTTP 503: busy");
    }
}
