//! Auto-release policy matching.

use crate::release_manager::AutoReleasePolicy;

/// Returns the environments that auto-release from `base_branch`.
///
/// Input order is preserved and duplicates are kept: if two policies release
/// the same branch to the same environment, the environment appears twice.
pub fn auto_release_environments(policies: &[AutoReleasePolicy], base_branch: &str) -> Vec<String> {
    policies
        .iter()
        .filter(|policy| policy.branch == base_branch)
        .map(|policy| policy.environment.clone())
        .collect()
}
