//! Release-manager API client.
//!
//! The release manager owns the inventory of deployable services and their
//! release policies. The bot asks it two things per pull request:
//!
//! - `GET /describe/artifact/{service}`: is the service managed at all?
//! - `GET /policies?service={service}`: which branches auto-release where?
//!
//! Both calls are bearer-authenticated, bounded by a per-attempt timeout, and
//! retried on transport failure with a fixed backoff schedule.

mod client;
mod error;
mod retry;
mod types;

pub use client::{ReleaseManagerApi, ReleaseManagerClient, ReleaseManagerConfig};
pub use error::ReleaseManagerError;
pub use retry::{RetrySchedule, retry_with_backoff};
pub use types::{
    Artifact, AutoReleasePolicy, BranchRestrictionPolicy, CiRun, DescribeArtifactResponse,
    ListPoliciesResponse, SourceRevision,
};
