//! Comment posting through a GitHub App installation.
//!
//! The pipeline only ever needs one thing from GitHub: post an issue comment
//! on a pull request, authenticated as the app installation that delivered
//! the webhook. That capability is split in two traits so tests can swap in
//! recording fakes:
//!
//! - [`InstallationClientCreator`] turns an installation id into a poster.
//! - [`CommentPoster`] posts the comment.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use octocrab::Octocrab;
use octocrab::models::{AppId, InstallationId as OctocrabInstallationId};
use serde_json::json;

use crate::metrics::{MetricsSink, OutboundTarget, RateLimit};
use crate::types::{InstallationId, PrNumber, RepoId};

use super::error::GitHubApiError;

/// Posts plain-text comments on pull requests.
pub trait CommentPoster: Send + Sync {
    /// Creates an issue comment (not a review comment) on `pr`.
    fn post_comment(
        &self,
        repo: &RepoId,
        pr: PrNumber,
        body: &str,
    ) -> impl Future<Output = Result<(), GitHubApiError>> + Send;
}

/// Creates comment posters scoped to one app installation.
pub trait InstallationClientCreator: Send + Sync {
    type Poster: CommentPoster;

    fn create_installation_client(
        &self,
        installation: InstallationId,
    ) -> Result<Self::Poster, GitHubApiError>;
}

#[derive(Debug, Clone)]
pub struct GitHubAppConfig {
    pub app_id: u64,
    /// PEM-encoded RSA private key of the app.
    pub private_key: String,
    /// Upper bound for one comment post.
    pub timeout: Duration,
}

/// App-authenticated octocrab client that hands out installation clients.
#[derive(Clone)]
pub struct GitHubAppClientCreator {
    app: Octocrab,
    timeout: Duration,
    metrics: Arc<dyn MetricsSink>,
}

impl GitHubAppClientCreator {
    pub fn new(config: &GitHubAppConfig, metrics: Arc<dyn MetricsSink>) -> Result<Self, GitHubApiError> {
        let key = jsonwebtoken::EncodingKey::from_rsa_pem(config.private_key.as_bytes()).map_err(
            |e| GitHubApiError::without_source(format!("parsing GitHub App private key: {e}")),
        )?;
        let app = Octocrab::builder()
            .app(AppId(config.app_id), key)
            .build()
            .map_err(GitHubApiError::from_octocrab)?;

        Ok(Self {
            app,
            timeout: config.timeout,
            metrics,
        })
    }
}

impl InstallationClientCreator for GitHubAppClientCreator {
    type Poster = OctocrabCommentPoster;

    fn create_installation_client(
        &self,
        installation: InstallationId,
    ) -> Result<Self::Poster, GitHubApiError> {
        let client = self
            .app
            .installation(OctocrabInstallationId(installation.0))
            .map_err(GitHubApiError::from_octocrab)?;

        Ok(OctocrabCommentPoster::new(
            client,
            self.timeout,
            Arc::clone(&self.metrics),
        ))
    }
}

impl std::fmt::Debug for GitHubAppClientCreator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubAppClientCreator")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Installation-authenticated octocrab client.
///
/// Every response's status and `X-RateLimit-*` headers are recorded before
/// error statuses are turned into errors.
pub struct OctocrabCommentPoster {
    client: Octocrab,
    timeout: Duration,
    metrics: Arc<dyn MetricsSink>,
}

impl OctocrabCommentPoster {
    pub fn new(client: Octocrab, timeout: Duration, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            client,
            timeout,
            metrics,
        }
    }

    async fn create_comment(
        &self,
        repo: &RepoId,
        pr: PrNumber,
        body: &str,
    ) -> Result<(), GitHubApiError> {
        let route = format!("/repos/{}/{}/issues/{}/comments", repo.owner, repo.repo, pr.0);
        let response = self
            .client
            ._post(route, Some(&json!({ "body": body })))
            .await
            .map_err(GitHubApiError::from_octocrab)?;

        self.metrics
            .outbound_status(OutboundTarget::GitHub, response.status().as_u16());
        if let Some(rate_limit) = rate_limit_from_headers(response.headers()) {
            self.metrics.github_rate_limit(rate_limit);
        }

        octocrab::map_github_error(response)
            .await
            .map_err(GitHubApiError::from_octocrab)?;
        Ok(())
    }
}

/// Reads GitHub's rate-limit headers. `None` unless all three are present and
/// numeric.
pub fn rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimit> {
    let read = |name: &str| headers.get(name)?.to_str().ok()?.trim().parse::<u64>().ok();
    Some(RateLimit {
        limit: read("x-ratelimit-limit")?,
        remaining: read("x-ratelimit-remaining")?,
        reset: read("x-ratelimit-reset")?,
    })
}

impl CommentPoster for OctocrabCommentPoster {
    async fn post_comment(
        &self,
        repo: &RepoId,
        pr: PrNumber,
        body: &str,
    ) -> Result<(), GitHubApiError> {
        match tokio::time::timeout(self.timeout, self.create_comment(repo, pr, body)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(GitHubApiError::without_source(format!(
                "posting comment on {repo}{pr} timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

impl std::fmt::Debug for OctocrabCommentPoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctocrabCommentPoster")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
