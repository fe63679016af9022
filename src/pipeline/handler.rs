//! The `pull_request` delivery handler.
//!
//! One delivery runs start to finish on the task that received it:
//!
//! ```text
//! parse -> action filter -> edit filter -> describe artifact -> unmanaged filter
//!       -> ignored-repo filter -> list policies -> match -> render -> post comment
//! ```
//!
//! Filters end the run as [`Outcome::Suppressed`]. Collaborator failures end
//! it as a [`PipelineError`] naming the step that failed. Nothing is retried
//! here; the release-manager client retries its own transport failures.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{Span, error, field, info, instrument};

use crate::github::{CommentPoster, GitHubApiError, InstallationClientCreator};
use crate::message::{self, BotMessageData};
use crate::metrics::{DeliveryOutcome, MetricsSink};
use crate::policy;
use crate::release_manager::{ReleaseManagerApi, ReleaseManagerError};
use crate::service_name;
use crate::template::TemplateError;
use crate::types::{DeliveryId, InstallationId};
use crate::webhooks::{ParseError, parse_pull_request};

use super::filters::{self, Suppression};

const PULL_REQUEST: &str = "pull_request";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Payload(#[from] ParseError),

    #[error("requesting describe-artifact from release manager: {0}")]
    DescribeArtifact(#[source] ReleaseManagerError),

    #[error("requesting policies from release manager: {0}")]
    ListPolicies(#[source] ReleaseManagerError),

    #[error("creating bot message: {0}")]
    Message(#[from] TemplateError),

    #[error("creating installation client: delivery {0} carries no installation id")]
    MissingInstallation(DeliveryId),

    #[error("creating installation client for installation {installation}: {source}")]
    InstallationClient {
        installation: InstallationId,
        #[source]
        source: GitHubApiError,
    },

    #[error("commenting on pull request with delivery ID {delivery_id}: {source}")]
    Comment {
        delivery_id: DeliveryId,
        #[source]
        source: GitHubApiError,
    },
}

impl PipelineError {
    /// Whether the delivery itself was malformed, as opposed to a failure
    /// talking to a collaborator.
    pub fn is_payload_error(&self) -> bool {
        matches!(self, PipelineError::Payload(_))
    }
}

/// How a delivery ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Suppressed(Suppression),
    Commented { body: String },
}

/// Per-installation settings from the app configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub message_template: String,
    pub ignored_repositories: HashSet<String>,
    /// Repository name to service name overrides.
    pub repository_services: HashMap<String, String>,
}

pub struct PullRequestHandler<C, R> {
    clients: C,
    release_manager: R,
    settings: PipelineSettings,
    metrics: Arc<dyn MetricsSink>,
}

impl<C, R> PullRequestHandler<C, R>
where
    C: InstallationClientCreator,
    R: ReleaseManagerApi,
{
    pub fn new(
        clients: C,
        release_manager: R,
        settings: PipelineSettings,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            clients,
            release_manager,
            settings,
            metrics,
        }
    }

    /// Event types this handler accepts.
    pub fn handles(&self) -> &'static [&'static str] {
        &[PULL_REQUEST]
    }

    /// Runs the pipeline for one delivery and records its outcome.
    pub async fn handle(
        &self,
        event_type: &str,
        delivery_id: &DeliveryId,
        payload: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Outcome, PipelineError> {
        let result = self.run(event_type, delivery_id, payload, cancel).await;

        let outcome = match &result {
            Ok(Outcome::Suppressed(_)) => DeliveryOutcome::Suppressed,
            Ok(Outcome::Commented { .. }) => DeliveryOutcome::Commented,
            Err(e) => {
                error!(delivery_id = %delivery_id, error = %e, "failed to handle delivery");
                DeliveryOutcome::Failed
            }
        };
        self.metrics.delivery_outcome(outcome);

        result
    }

    #[instrument(
        name = "delivery",
        skip_all,
        fields(
            delivery_id = %delivery_id,
            repo = field::Empty,
            pr = field::Empty,
            installation_id = field::Empty,
        )
    )]
    async fn run(
        &self,
        event_type: &str,
        delivery_id: &DeliveryId,
        payload: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Outcome, PipelineError> {
        let event = parse_pull_request(event_type, payload)?;

        let span = Span::current();
        span.record("repo", field::display(&event.repo));
        span.record("pr", event.pr_number.0);
        if let Some(installation) = event.installation_id {
            span.record("installation_id", installation.0);
        }
        info!(
            event_type,
            action = %event.action,
            base = %event.base_branch,
            link = event.html_url.as_deref().unwrap_or_default(),
            "handling delivery"
        );

        if let Some(stop) = filters::action_type(&event)
            .or_else(|| filters::edit_without_base_change(&event))
        {
            return Ok(suppressed(stop));
        }

        let service = service_name::resolve(&event.repo.repo, &self.settings.repository_services);

        let description = self
            .release_manager
            .describe_artifact(&service, cancel)
            .await
            .map_err(PipelineError::DescribeArtifact)?;

        if let Some(stop) = filters::unmanaged_service(&service, &description).or_else(|| {
            filters::ignored_repository(&event.repo.repo, &self.settings.ignored_repositories)
        }) {
            return Ok(suppressed(stop));
        }

        let policies = self
            .release_manager
            .list_policies(&service, cancel)
            .await
            .map_err(PipelineError::ListPolicies)?;

        let environments = policy::auto_release_environments(&policies.auto_releases, &event.base_branch);

        let body = message::render(&BotMessageData {
            template: self.settings.message_template.clone(),
            branch: event.base_branch.clone(),
            auto_release_environments: environments,
        })?;

        let installation = event
            .installation_id
            .ok_or_else(|| PipelineError::MissingInstallation(delivery_id.clone()))?;
        let poster = self
            .clients
            .create_installation_client(installation)
            .map_err(|source| PipelineError::InstallationClient {
                installation,
                source,
            })?;

        poster
            .post_comment(&event.repo, event.pr_number, &body)
            .await
            .map_err(|source| PipelineError::Comment {
                delivery_id: delivery_id.clone(),
                source,
            })?;

        info!(service = %service, "comment created on {}{}", event.repo, event.pr_number);
        Ok(Outcome::Commented { body })
    }
}

fn suppressed(stop: Suppression) -> Outcome {
    info!(filter = stop.filter_name(), "filter {} triggered: {stop}", stop.filter_name());
    Outcome::Suppressed(stop)
}

impl<C, R> std::fmt::Debug for PullRequestHandler<C, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullRequestHandler")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
