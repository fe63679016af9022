//! Typed pull-request webhook event.
//!
//! Only the fields the auto-release pipeline reads are kept: who owns the
//! repository, which pull request, what happened to it, where it merges to,
//! and which app installation delivered it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{InstallationId, PrNumber, RepoId};

/// Action performed on a pull request.
///
/// The pipeline only reacts to `opened` and `edited`; everything else is kept
/// verbatim so it can be logged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrAction {
    Opened,
    Edited,
    Other(String),
}

impl PrAction {
    pub fn from_webhook(action: &str) -> Self {
        match action {
            "opened" => PrAction::Opened,
            "edited" => PrAction::Edited,
            other => PrAction::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PrAction::Opened => "opened",
            PrAction::Edited => "edited",
            PrAction::Other(action) => action,
        }
    }
}

impl fmt::Display for PrAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `changes` object of an `edited` delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrChanges {
    /// Present only when the edit retargeted the pull request.
    pub base: Option<BaseChange>,
}

/// The base branch a pull request pointed at before it was retargeted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseChange {
    pub previous_ref: String,
}

/// A `pull_request` webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestEvent {
    pub repo: RepoId,
    pub action: PrAction,
    pub pr_number: PrNumber,

    /// The branch the pull request merges into (`pull_request.base.ref`).
    pub base_branch: String,

    pub html_url: Option<String>,

    /// `None` unless the action is `edited`.
    pub changes: Option<PrChanges>,

    /// Missing for deliveries that did not come through a GitHub App.
    pub installation_id: Option<InstallationId>,
}

impl PullRequestEvent {
    /// Whether an edit moved the pull request to a different base branch.
    pub fn base_changed(&self) -> bool {
        self.changes.as_ref().is_some_and(|c| c.base.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_actions_round_trip_through_strings() {
        for action in ["opened", "edited", "closed", "synchronize"] {
            assert_eq!(PrAction::from_webhook(action).as_str(), action);
        }
        assert_eq!(PrAction::from_webhook("opened"), PrAction::Opened);
        assert_eq!(
            PrAction::from_webhook("reopened"),
            PrAction::Other("reopened".into())
        );
    }

    #[test]
    fn base_changed_requires_base_entry() {
        let mut event = PullRequestEvent {
            repo: RepoId::new("lunarway", "foo-service"),
            action: PrAction::Edited,
            pr_number: PrNumber(1),
            base_branch: "master".into(),
            html_url: None,
            changes: None,
            installation_id: None,
        };
        assert!(!event.base_changed());

        event.changes = Some(PrChanges::default());
        assert!(!event.base_changed());

        event.changes = Some(PrChanges {
            base: Some(BaseChange {
                previous_ref: "develop".into(),
            }),
        });
        assert!(event.base_changed());
    }
}
