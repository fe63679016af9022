//! Response bodies of the release-manager HTTP API.
//!
//! Only the fields the bot reads are required to be meaningful; everything is
//! defaulted so that partial or evolving responses still decode. An explicit
//! `null` decodes the same as a missing key.

use serde::{Deserialize, Deserializer, Serialize};

/// Response of `GET /describe/artifact/{service}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DescribeArtifactResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub service: String,
    #[serde(deserialize_with = "null_as_default")]
    pub artifacts: Vec<Artifact>,
}

impl DescribeArtifactResponse {
    /// A service is managed by the release manager once it has at least one
    /// artifact on record.
    pub fn is_managed(&self) -> bool {
        !self.artifacts.is_empty()
    }
}

/// A build artifact recorded by the release manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Artifact {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub service: String,
    #[serde(deserialize_with = "null_as_default")]
    pub namespace: String,
    #[serde(deserialize_with = "null_as_default")]
    pub squad: String,
    #[serde(deserialize_with = "null_as_default")]
    pub application: SourceRevision,
    #[serde(deserialize_with = "null_as_default")]
    pub ci: CiRun,
}

/// The commit an artifact was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SourceRevision {
    #[serde(deserialize_with = "null_as_default")]
    pub branch: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sha: String,
    #[serde(deserialize_with = "null_as_default")]
    pub author_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub author_email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub committer_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub committer_email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub provider: String,
}

/// The CI job that produced an artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CiRun {
    #[serde(deserialize_with = "null_as_default")]
    pub job_url: String,
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Response of `GET /policies?service={service}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListPoliciesResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub service: String,
    #[serde(deserialize_with = "null_as_default")]
    pub auto_releases: Vec<AutoReleasePolicy>,
    #[serde(deserialize_with = "null_as_default")]
    pub branch_restrictions: Vec<BranchRestrictionPolicy>,
}

/// Releases every new artifact built from `branch` to `environment`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoReleasePolicy {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub branch: String,
    #[serde(deserialize_with = "null_as_default")]
    pub environment: String,
}

/// Restricts which branches may be released to `environment`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BranchRestrictionPolicy {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub environment: String,
    #[serde(deserialize_with = "null_as_default")]
    pub branch_regex: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
