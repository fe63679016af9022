//! Pull-request webhook payload parser.
//!
//! GitHub payloads carry far more than the pipeline needs; the raw structs
//! below pick out the relevant fields and ignore everything else. Missing
//! required fields and malformed JSON are reported as [`ParseError`].

use serde::Deserialize;
use thiserror::Error;

use crate::types::{InstallationId, PrNumber, RepoId};

use super::events::{BaseChange, PrAction, PrChanges, PullRequestEvent};

#[derive(Debug, Error)]
pub enum ParseError {
    /// Malformed JSON, or a required field is missing.
    #[error("parsing payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parsing payload: expected a pull_request event, got {0:?}")]
    UnexpectedEvent(String),
}

/// Parses a `pull_request` delivery body.
///
/// ```
/// use auto_release_bot::webhooks::{PrAction, parse_pull_request};
///
/// let payload = br#"{
///     "action": "opened",
///     "number": 7,
///     "pull_request": { "number": 7, "base": { "ref": "master" } },
///     "repository": { "name": "foo-service", "owner": { "login": "lunarway" } },
///     "installation": { "id": 99 }
/// }"#;
///
/// let event = parse_pull_request("pull_request", payload).unwrap();
/// assert_eq!(event.action, PrAction::Opened);
/// assert_eq!(event.base_branch, "master");
/// ```
pub fn parse_pull_request(event_type: &str, payload: &[u8]) -> Result<PullRequestEvent, ParseError> {
    if event_type != "pull_request" {
        return Err(ParseError::UnexpectedEvent(event_type.to_string()));
    }

    let raw: RawPullRequestPayload = serde_json::from_slice(payload)?;

    Ok(PullRequestEvent {
        repo: RepoId::new(raw.repository.owner.login, raw.repository.name),
        action: PrAction::from_webhook(&raw.action),
        pr_number: PrNumber(raw.number.unwrap_or(raw.pull_request.number)),
        base_branch: raw.pull_request.base.ref_name,
        html_url: raw.pull_request.html_url,
        changes: raw.changes.map(|changes| PrChanges {
            base: changes.base.map(|base| BaseChange {
                previous_ref: base.ref_change.from,
            }),
        }),
        installation_id: raw.installation.map(|i| InstallationId(i.id)),
    })
}

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    action: String,
    number: Option<u64>,
    pull_request: RawPullRequest,
    repository: RawRepository,
    changes: Option<RawChanges>,
    installation: Option<RawInstallation>,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    html_url: Option<String>,
    base: RawRef,
}

#[derive(Debug, Deserialize)]
struct RawRef {
    #[serde(rename = "ref")]
    ref_name: String,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    owner: RawOwner,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawChanges {
    base: Option<RawBaseChange>,
}

#[derive(Debug, Deserialize)]
struct RawBaseChange {
    #[serde(rename = "ref")]
    ref_change: RawFrom,
}

#[derive(Debug, Deserialize)]
struct RawFrom {
    from: String,
}

#[derive(Debug, Deserialize)]
struct RawInstallation {
    id: u64,
}
