//! GitHub API error type.
//!
//! Comment posting is never retried, so unlike release-manager errors these
//! carry no transient/permanent split. The status code is kept so failed
//! calls can still be counted by status.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub struct GitHubApiError {
    /// The HTTP status code, if one could be recovered.
    pub status_code: Option<u16>,

    pub message: String,

    #[source]
    pub source: Option<octocrab::Error>,
}

impl fmt::Display for GitHubApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "GitHub API error (HTTP {}): {}", code, self.message),
            None => write!(f, "GitHub API error: {}", self.message),
        }
    }
}

impl GitHubApiError {
    pub fn from_octocrab(err: octocrab::Error) -> Self {
        Self {
            status_code: Self::extract_status_code(&err),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// An error raised on our side of the call (bad key, timeout).
    pub fn without_source(message: impl Into<String>) -> Self {
        Self {
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Extracts the HTTP status code from an octocrab error.
    ///
    /// API errors carry the status directly. For other variants the rendered
    /// message is searched for a `status: NNN` fragment.
    fn extract_status_code(err: &octocrab::Error) -> Option<u16> {
        if let octocrab::Error::GitHub { source, .. } = err {
            return Some(source.status_code.as_u16());
        }
        status_from_message(&err.to_string())
    }
}

fn status_from_message(message: &str) -> Option<u16> {
    let idx = message.find("status: ")?;
    let digits: String = message[idx + 8..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok().filter(|code| (100..600).contains(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_status_when_known() {
        let mut err = GitHubApiError::without_source("Not Found");
        assert_eq!(err.to_string(), "GitHub API error: Not Found");

        err.status_code = Some(404);
        assert_eq!(err.to_string(), "GitHub API error (HTTP 404): Not Found");
    }

    #[test]
    fn status_is_parsed_from_message() {
        assert_eq!(status_from_message("request failed, status: 502 Bad Gateway"), Some(502));
        assert_eq!(status_from_message("status: 403"), Some(403));
        assert_eq!(status_from_message("status: abc"), None);
        assert_eq!(status_from_message("status: 9999"), None);
        assert_eq!(status_from_message("connection reset"), None);
    }
}
