//! Release-manager client errors.
//!
//! Only transport failures are retried. A non-200 status is taken at face value
//! and returned immediately, as is a body that doesn't decode.

use thiserror::Error;

/// An error from a release-manager API call.
#[derive(Debug, Error)]
pub enum ReleaseManagerError {
    /// The configured base URL can't be used to build endpoints.
    #[error("release-manager URL '{url}' is not a valid base URL: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The HTTP client could not be initialised.
    #[error("building release-manager HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request could not be built (e.g., a malformed base URL).
    #[error("create GET request for release-manager endpoint '{endpoint}': {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The request never produced a complete response: connection refused,
    /// timeout, reset while reading the body.
    #[error("sending HTTP request to '{endpoint}': {message}")]
    Transport {
        endpoint: String,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The release manager answered with something other than 200.
    #[error("expected status code 200 from '{endpoint}', but received {status}")]
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// A 200 response whose body isn't the expected JSON shape.
    #[error("parsing release-manager response from '{endpoint}' as JSON: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// The delivery was cancelled while the call was in flight or backing off.
    #[error("request to '{endpoint}' cancelled")]
    Cancelled { endpoint: String },
}

impl ReleaseManagerError {
    /// Wraps a reqwest error raised while sending or reading a response.
    pub fn from_reqwest(endpoint: &str, err: reqwest::Error) -> Self {
        if err.is_builder() {
            return ReleaseManagerError::Request {
                endpoint: endpoint.to_string(),
                source: err,
            };
        }
        ReleaseManagerError::Transport {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Creates a transport error without an underlying reqwest error.
    pub fn transport_without_source(endpoint: &str, message: impl Into<String>) -> Self {
        ReleaseManagerError::Transport {
            endpoint: endpoint.to_string(),
            message: message.into(),
            source: None,
        }
    }

    /// Returns true if the failure may clear up on its own and is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, ReleaseManagerError::Transport { .. })
    }

    /// Returns the HTTP status code, if the release manager responded at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ReleaseManagerError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_is_transient() {
        assert!(ReleaseManagerError::transport_without_source("http://rm", "reset").is_transient());
        assert!(
            !ReleaseManagerError::UnexpectedStatus {
                endpoint: "http://rm".into(),
                status: 503,
                body: String::new(),
            }
            .is_transient()
        );
        assert!(
            !ReleaseManagerError::Cancelled {
                endpoint: "http://rm".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn status_error_message_includes_code() {
        let err = ReleaseManagerError::UnexpectedStatus {
            endpoint: "http://rm/policies?service=foo".into(),
            status: 401,
            body: "unauthorized".into(),
        };
        assert_eq!(err.status_code(), Some(401));
        assert!(err.to_string().contains("401"));
    }
}
