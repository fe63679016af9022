//! Filters that decide whether a delivery should be acted on.
//!
//! Each filter returns `Some(Suppression)` when it triggers. A suppression is
//! a normal outcome, not an error: the delivery is acknowledged and nothing
//! is posted.

use std::collections::HashSet;
use std::fmt;

use crate::release_manager::DescribeArtifactResponse;
use crate::types::ServiceName;
use crate::webhooks::{PrAction, PullRequestEvent};

/// Why a delivery was not commented on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suppression {
    /// The action is neither `opened` nor `edited`.
    ActionType(String),
    /// An `edited` delivery without a `changes` object.
    NoChanges,
    /// An edit that did not touch the base branch.
    NoBaseChange,
    /// The release manager has no artifacts for the service.
    UnmanagedService(ServiceName),
    /// The repository is on the configured ignore list.
    IgnoredRepository(String),
}

impl Suppression {
    pub fn filter_name(&self) -> &'static str {
        match self {
            Suppression::ActionType(_) => "ActionType",
            Suppression::NoChanges => "NoChanges",
            Suppression::NoBaseChange => "NoBaseChange",
            Suppression::UnmanagedService(_) => "UnmanagedService",
            Suppression::IgnoredRepository(_) => "IgnoredRepository",
        }
    }
}

impl fmt::Display for Suppression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suppression::ActionType(action) => write!(f, "action '{action}' is not handled"),
            Suppression::NoChanges => write!(f, "edit carries no changes"),
            Suppression::NoBaseChange => write!(f, "edit did not change the base branch"),
            Suppression::UnmanagedService(service) => {
                write!(f, "service '{service}' is not managed by the release manager")
            }
            Suppression::IgnoredRepository(repo) => write!(f, "repository '{repo}' is ignored"),
        }
    }
}

/// Passes only `opened` and `edited`.
pub fn action_type(event: &PullRequestEvent) -> Option<Suppression> {
    match event.action {
        PrAction::Opened | PrAction::Edited => None,
        PrAction::Other(ref action) => Some(Suppression::ActionType(action.clone())),
    }
}

/// Stops edits that did not retarget the pull request. Other actions pass.
pub fn edit_without_base_change(event: &PullRequestEvent) -> Option<Suppression> {
    if event.action != PrAction::Edited {
        return None;
    }
    match &event.changes {
        None => Some(Suppression::NoChanges),
        Some(changes) if changes.base.is_none() => Some(Suppression::NoBaseChange),
        Some(_) => None,
    }
}

pub fn unmanaged_service(
    service: &ServiceName,
    description: &DescribeArtifactResponse,
) -> Option<Suppression> {
    (!description.is_managed()).then(|| Suppression::UnmanagedService(service.clone()))
}

/// Exact match on the repository name.
pub fn ignored_repository(repo_name: &str, ignored: &HashSet<String>) -> Option<Suppression> {
    ignored
        .contains(repo_name)
        .then(|| Suppression::IgnoredRepository(repo_name.to_string()))
}
