//! GitHub API collaborator.
//!
//! Posts the bot's comment through an octocrab client authenticated as the
//! GitHub App installation that sent the webhook.

mod client;
mod error;

pub use client::{
    CommentPoster, GitHubAppClientCreator, GitHubAppConfig, InstallationClientCreator,
    OctocrabCommentPoster,
};
pub use error::GitHubApiError;
