//! Core domain types for the auto-release bot.
//!
//! Identifiers are newtypes so the pipeline can't confuse a PR number with an
//! installation ID, or a repository name with the service it resolves to.

pub mod ids;

pub use ids::{DeliveryId, InstallationId, PrNumber, RepoId, ServiceName};
