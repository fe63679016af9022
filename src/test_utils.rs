//! Shared test fixtures: recording fakes for the pipeline's collaborators and
//! webhook payload builders.

use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::github::{CommentPoster, GitHubApiError, InstallationClientCreator};
use crate::release_manager::{
    Artifact, AutoReleasePolicy, DescribeArtifactResponse, ListPoliciesResponse,
    ReleaseManagerApi, ReleaseManagerError,
};
use crate::types::{InstallationId, PrNumber, RepoId, ServiceName};

/// A release-manager call observed by [`FakeReleaseManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseManagerCall {
    DescribeArtifact(ServiceName),
    ListPolicies(ServiceName),
}

#[derive(Debug, Clone)]
enum Reply<T> {
    Body(T),
    Status(u16),
}

impl<T: Clone> Reply<T> {
    fn resolve(&self, endpoint: &str) -> Result<T, ReleaseManagerError> {
        match self {
            Reply::Body(body) => Ok(body.clone()),
            Reply::Status(status) => Err(ReleaseManagerError::UnexpectedStatus {
                endpoint: endpoint.to_string(),
                status: *status,
                body: String::new(),
            }),
        }
    }
}

/// In-memory release manager that records every call.
///
/// Clones share the call log, so a test can keep one handle and give the
/// other to the handler.
#[derive(Debug, Clone)]
pub struct FakeReleaseManager {
    describe: Reply<DescribeArtifactResponse>,
    policies: Reply<ListPoliciesResponse>,
    calls: Arc<Mutex<Vec<ReleaseManagerCall>>>,
}

impl FakeReleaseManager {
    /// A service with one artifact and the given `(branch, environment)` policies.
    pub fn managed(service: &str, policies: &[(&str, &str)]) -> Self {
        let auto_releases = policies
            .iter()
            .enumerate()
            .map(|(i, (branch, environment))| AutoReleasePolicy {
                id: format!("auto-release-{i}"),
                branch: branch.to_string(),
                environment: environment.to_string(),
            })
            .collect();

        Self {
            describe: Reply::Body(DescribeArtifactResponse {
                service: service.to_string(),
                artifacts: vec![Artifact {
                    id: format!("master-1234-{service}"),
                    service: service.to_string(),
                    ..Artifact::default()
                }],
            }),
            policies: Reply::Body(ListPoliciesResponse {
                service: service.to_string(),
                auto_releases,
                branch_restrictions: Vec::new(),
            }),
            calls: Arc::default(),
        }
    }

    /// A service the release manager has no artifacts for.
    pub fn unmanaged(service: &str) -> Self {
        let mut fake = Self::managed(service, &[]);
        fake.describe = Reply::Body(DescribeArtifactResponse {
            service: service.to_string(),
            artifacts: Vec::new(),
        });
        fake
    }

    pub fn with_describe_status(mut self, status: u16) -> Self {
        self.describe = Reply::Status(status);
        self
    }

    pub fn with_policies_status(mut self, status: u16) -> Self {
        self.policies = Reply::Status(status);
        self
    }

    pub fn calls(&self) -> Vec<ReleaseManagerCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ReleaseManagerCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ReleaseManagerApi for FakeReleaseManager {
    async fn describe_artifact(
        &self,
        service: &ServiceName,
        _cancel: &CancellationToken,
    ) -> Result<DescribeArtifactResponse, ReleaseManagerError> {
        self.record(ReleaseManagerCall::DescribeArtifact(service.clone()));
        self.describe
            .resolve(&format!("/describe/artifact/{service}"))
    }

    async fn list_policies(
        &self,
        service: &ServiceName,
        _cancel: &CancellationToken,
    ) -> Result<ListPoliciesResponse, ReleaseManagerError> {
        self.record(ReleaseManagerCall::ListPolicies(service.clone()));
        self.policies.resolve(&format!("/policies?service={service}"))
    }
}

/// A comment posted through [`RecordingGitHub`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedComment {
    pub installation: InstallationId,
    pub repo: RepoId,
    pub pr: PrNumber,
    pub body: String,
}

/// Installation client creator whose posters record comments instead of
/// sending them. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingGitHub {
    comments: Arc<Mutex<Vec<PostedComment>>>,
    fail_create: bool,
    fail_post_with: Option<u16>,
}

impl RecordingGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every installation client creation fails.
    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Every comment post fails with this HTTP status.
    pub fn failing_post(mut self, status: u16) -> Self {
        self.fail_post_with = Some(status);
        self
    }

    pub fn comments(&self) -> Vec<PostedComment> {
        self.comments.lock().unwrap().clone()
    }
}

impl InstallationClientCreator for RecordingGitHub {
    type Poster = RecordingPoster;

    fn create_installation_client(
        &self,
        installation: InstallationId,
    ) -> Result<Self::Poster, GitHubApiError> {
        if self.fail_create {
            return Err(GitHubApiError::without_source("could not mint installation token"));
        }
        Ok(RecordingPoster {
            installation,
            comments: Arc::clone(&self.comments),
            fail_post_with: self.fail_post_with,
        })
    }
}

#[derive(Debug)]
pub struct RecordingPoster {
    installation: InstallationId,
    comments: Arc<Mutex<Vec<PostedComment>>>,
    fail_post_with: Option<u16>,
}

impl CommentPoster for RecordingPoster {
    async fn post_comment(
        &self,
        repo: &RepoId,
        pr: PrNumber,
        body: &str,
    ) -> Result<(), GitHubApiError> {
        if let Some(status) = self.fail_post_with {
            let mut err = GitHubApiError::without_source("Resource not accessible by integration");
            err.status_code = Some(status);
            return Err(err);
        }
        self.comments.lock().unwrap().push(PostedComment {
            installation: self.installation,
            repo: repo.clone(),
            pr,
            body: body.to_string(),
        });
        Ok(())
    }
}

/// A `pull_request` delivery body for `repo` (owned by `lunarway`).
pub fn pull_request_payload(action: &str, repo: &str, base: &str) -> serde_json::Value {
    json!({
        "action": action,
        "number": 7,
        "pull_request": {
            "number": 7,
            "html_url": format!("https://github.com/lunarway/{repo}/pull/7"),
            "base": { "ref": base },
            "head": { "ref": "feature" }
        },
        "repository": {
            "name": repo,
            "owner": { "login": "lunarway" }
        },
        "installation": { "id": 4242 }
    })
}

pub fn to_bytes(payload: &serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(payload).unwrap()
}
