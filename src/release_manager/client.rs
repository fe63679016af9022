//! Authenticated JSON client for the release-manager API.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::error::ReleaseManagerError;
use super::retry::{RetrySchedule, retry_with_backoff};
use super::types::{DescribeArtifactResponse, ListPoliciesResponse};
use crate::metrics::{MetricsSink, OutboundTarget};
use crate::types::ServiceName;

/// The release-manager queries the pipeline needs.
///
/// [`ReleaseManagerClient`] is the real implementation; tests substitute a
/// recording fake to assert which calls a delivery makes.
pub trait ReleaseManagerApi: Send + Sync {
    /// Fetches the artifacts recorded for `service`.
    fn describe_artifact(
        &self,
        service: &ServiceName,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<DescribeArtifactResponse, ReleaseManagerError>> + Send;

    /// Fetches the policies configured for `service`.
    fn list_policies(
        &self,
        service: &ServiceName,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ListPoliciesResponse, ReleaseManagerError>> + Send;
}

/// Connection settings for [`ReleaseManagerClient`].
#[derive(Debug, Clone)]
pub struct ReleaseManagerConfig {
    /// Base URL without a trailing slash, e.g. `https://release-manager.example.com`.
    pub base_url: String,

    /// Bearer token sent on every request.
    pub auth_token: String,

    /// Upper bound on a single attempt, including reading the body.
    pub timeout: Duration,

    /// Waits between attempts after a transport failure.
    pub retry: RetrySchedule,
}

/// Status and body of a response that arrived in full.
struct RawResponse {
    status: u16,
    body: Vec<u8>,
}

/// Bearer-authenticated GET client with retry.
#[derive(Clone)]
pub struct ReleaseManagerClient {
    http: reqwest::Client,
    base_url: Url,
    auth_token: String,
    retry: RetrySchedule,
    metrics: Arc<dyn MetricsSink>,
}

impl ReleaseManagerClient {
    /// Creates a client. Fails if the base URL can't carry a path or the TLS
    /// backend can't be initialised.
    pub fn new(
        config: ReleaseManagerConfig,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, ReleaseManagerError> {
        let base_url = parse_base_url(&config.base_url)?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ReleaseManagerError::Client)?;
        Ok(Self {
            http,
            base_url,
            auth_token: config.auth_token,
            retry: config.retry,
            metrics,
        })
    }

    /// `GET {base}/describe/artifact/{service}`, with the service name as a
    /// single percent-encoded path segment.
    pub fn describe_artifact_endpoint(&self, service: &ServiceName) -> Url {
        self.endpoint(&["describe", "artifact", service.as_str()])
    }

    /// `GET {base}/policies?service={service}`
    pub fn policies_endpoint(&self, service: &ServiceName) -> Url {
        let mut url = self.endpoint(&["policies"]);
        url.query_pairs_mut().append_pair("service", service.as_str());
        url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `parse_base_url` rejects URLs that cannot be a base.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Issues a GET against `endpoint` and decodes a 200 response as `T`.
    ///
    /// Transport failures are retried per the configured schedule. Any other
    /// status is an error carrying the code; its body is logged first.
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &Url,
        cancel: &CancellationToken,
    ) -> Result<T, ReleaseManagerError> {
        let endpoint = endpoint.as_str();
        let response =
            retry_with_backoff(&self.retry, cancel, endpoint, || self.send(endpoint, cancel))
                .await?;

        if response.status != 200 {
            let body = String::from_utf8_lossy(&response.body).into_owned();
            info!(
                endpoint,
                status = response.status,
                body = %body,
                "Unexpected release manager response"
            );
            return Err(ReleaseManagerError::UnexpectedStatus {
                endpoint: endpoint.to_string(),
                status: response.status,
                body,
            });
        }

        serde_json::from_slice(&response.body).map_err(|source| ReleaseManagerError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    /// One attempt: send the request and read the whole body.
    async fn send(
        &self,
        endpoint: &str,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, ReleaseManagerError> {
        let exchange = async {
            let response = self
                .http
                .get(endpoint)
                .bearer_auth(&self.auth_token)
                .send()
                .await
                .map_err(|e| ReleaseManagerError::from_reqwest(endpoint, e))?;

            let status = response.status().as_u16();
            self.metrics
                .outbound_status(OutboundTarget::ReleaseManager, status);

            let body = response
                .bytes()
                .await
                .map_err(|e| ReleaseManagerError::from_reqwest(endpoint, e))?;

            debug!(endpoint, status, bytes = body.len(), "Release manager responded");
            Ok(RawResponse {
                status,
                body: body.to_vec(),
            })
        };

        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(ReleaseManagerError::Cancelled {
                endpoint: endpoint.to_string(),
            }),
            result = exchange => result,
        }
    }
}

impl ReleaseManagerApi for ReleaseManagerClient {
    async fn describe_artifact(
        &self,
        service: &ServiceName,
        cancel: &CancellationToken,
    ) -> Result<DescribeArtifactResponse, ReleaseManagerError> {
        let endpoint = self.describe_artifact_endpoint(service);
        self.get(&endpoint, cancel).await
    }

    async fn list_policies(
        &self,
        service: &ServiceName,
        cancel: &CancellationToken,
    ) -> Result<ListPoliciesResponse, ReleaseManagerError> {
        let endpoint = self.policies_endpoint(service);
        self.get(&endpoint, cancel).await
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ReleaseManagerError> {
    let invalid = |reason: String| ReleaseManagerError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot carry a path".to_string()));
    }
    Ok(url)
}

impl std::fmt::Debug for ReleaseManagerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseManagerClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::InMemoryMetrics;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(base_url: &str, retry: RetrySchedule) -> (ReleaseManagerClient, Arc<InMemoryMetrics>) {
        let metrics = Arc::new(InMemoryMetrics::new());
        let client = ReleaseManagerClient::new(
            ReleaseManagerConfig {
                base_url: base_url.to_string(),
                auth_token: "secret-token".to_string(),
                timeout: Duration::from_secs(5),
                retry,
            },
            metrics.clone(),
        )
        .unwrap();
        (client, metrics)
    }

    #[test]
    fn endpoints_follow_api_layout() {
        let (client, _) = client_for("https://rm.example.com/", RetrySchedule::none());
        let service = ServiceName::from("billing");
        assert_eq!(
            client.describe_artifact_endpoint(&service).as_str(),
            "https://rm.example.com/describe/artifact/billing"
        );
        assert_eq!(
            client.policies_endpoint(&service).as_str(),
            "https://rm.example.com/policies?service=billing"
        );
    }

    #[test]
    fn endpoints_keep_base_path() {
        let (client, _) = client_for("https://example.com/release-manager", RetrySchedule::none());
        assert_eq!(
            client.policies_endpoint(&ServiceName::from("billing")).as_str(),
            "https://example.com/release-manager/policies?service=billing"
        );
    }

    #[test]
    fn service_names_are_percent_encoded() {
        let (client, _) = client_for("https://rm.example.com", RetrySchedule::none());
        let service = ServiceName::from("a/b c#d&e");
        assert_eq!(
            client.describe_artifact_endpoint(&service).as_str(),
            "https://rm.example.com/describe/artifact/a%2Fb%20c%23d&e"
        );

        let policies = client.policies_endpoint(&service);
        assert_eq!(policies.path(), "/policies");
        let pairs: Vec<_> = policies.query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("service".to_string(), "a/b c#d&e".to_string())]);
    }

    #[test]
    fn rejects_unusable_base_url() {
        for raw in ["not a url", "mailto:ops@example.com"] {
            let err = ReleaseManagerClient::new(
                ReleaseManagerConfig {
                    base_url: raw.to_string(),
                    auth_token: String::new(),
                    timeout: Duration::from_secs(1),
                    retry: RetrySchedule::none(),
                },
                Arc::new(InMemoryMetrics::new()),
            )
            .unwrap_err();
            assert!(matches!(err, ReleaseManagerError::InvalidBaseUrl { .. }), "{raw}: {err}");
        }
    }

    #[tokio::test]
    async fn encoded_service_reaches_the_server_intact() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/policies"))
            .and(query_param("service", "pay & go"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "service": "pay & go",
                "autoReleases": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server.uri(), RetrySchedule::none());
        let response = client
            .list_policies(&ServiceName::from("pay & go"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.service, "pay & go");
    }

    #[tokio::test]
    async fn null_artifacts_decode_as_unmanaged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/describe/artifact/foo"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"service":"foo","artifacts":null}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server.uri(), RetrySchedule::none());
        let response = client
            .describe_artifact(&ServiceName::from("foo"), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!response.is_managed());
    }

    #[tokio::test]
    async fn describe_artifact_sends_bearer_token_and_decodes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/describe/artifact/billing"))
            .and(header("Authorization", "Bearer secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "service": "billing",
                "artifacts": [{ "id": "master-1", "service": "billing" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (client, metrics) = client_for(&server.uri(), RetrySchedule::none());
        let response = client
            .describe_artifact(&ServiceName::from("billing"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.service, "billing");
        assert!(response.is_managed());
        assert_eq!(metrics.outbound_count(OutboundTarget::ReleaseManager, 200), 1);
    }

    #[tokio::test]
    async fn list_policies_passes_service_as_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/policies"))
            .and(query_param("service", "billing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "service": "billing",
                "autoReleases": [{ "branch": "master", "environment": "dev" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server.uri(), RetrySchedule::none());
        let response = client
            .list_policies(&ServiceName::from("billing"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.auto_releases.len(), 1);
        assert_eq!(response.auto_releases[0].branch, "master");
    }

    #[tokio::test]
    async fn non_200_is_terminal_and_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("service not found"))
            .expect(1)
            .mount(&server)
            .await;

        // A zero-delay schedule would retry instantly if the status were retried.
        let (client, metrics) = client_for(
            &server.uri(),
            RetrySchedule::new(vec![Duration::ZERO; 4]),
        );
        let err = client
            .describe_artifact(&ServiceName::from("ghost"), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            ReleaseManagerError::UnexpectedStatus { status, body, .. } => {
                assert_eq!(status, 404);
                assert_eq!(body, "service not found");
            }
            other => panic!("expected UnexpectedStatus, got {other:?}"),
        }
        assert_eq!(metrics.outbound_count(OutboundTarget::ReleaseManager, 404), 1);
    }

    #[tokio::test]
    async fn malformed_json_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server.uri(), RetrySchedule::none());
        let err = client
            .list_policies(&ServiceName::from("billing"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ReleaseManagerError::Decode { .. }));
    }

    #[tokio::test]
    async fn wrong_shape_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "artifacts": "not-a-list" })),
            )
            .mount(&server)
            .await;

        let (client, _) = client_for(&server.uri(), RetrySchedule::none());
        let err = client
            .describe_artifact(&ServiceName::from("billing"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ReleaseManagerError::Decode { .. }));
    }

    #[tokio::test]
    async fn connection_refused_is_retried_then_terminal() {
        // Bind and drop a listener to get a port nothing is listening on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let (client, _) = client_for(
            &format!("http://127.0.0.1:{port}"),
            RetrySchedule::new(vec![Duration::from_millis(1); 4]),
        );

        let err = client
            .describe_artifact(&ServiceName::from("billing"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert!(err.to_string().contains("sending HTTP request"));
    }

    #[tokio::test]
    async fn cancelled_token_aborts_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "artifacts": [] }))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let (client, _) = client_for(&server.uri(), RetrySchedule::none());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = client
            .describe_artifact(&ServiceName::from("billing"), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, ReleaseManagerError::Cancelled { .. }));
    }
}
