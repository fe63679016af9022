//! Auto-release bot - comments on pull requests with the environments that
//! will be auto-released when they merge.
//!
//! A GitHub App delivers `pull_request` webhooks; the bot asks the release
//! manager whether the repository's service is managed and which branches
//! auto-release where, then renders the configured template and posts it on
//! the pull request.

pub mod config;
pub mod github;
pub mod message;
pub mod metrics;
pub mod pipeline;
pub mod policy;
pub mod release_manager;
pub mod server;
pub mod service_name;
pub mod template;
pub mod types;
pub mod webhooks;

#[cfg(test)]
mod test_utils;
