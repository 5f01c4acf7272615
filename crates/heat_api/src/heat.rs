//! Heat v1 HTTP implementation of [`OrchestrationClient`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use tracing::{debug, info};

use crate::client::OrchestrationClient;
use crate::error::{ApiError, ApiResult};
use crate::models::{DeploymentDiagnostic, ResourceRecord, StackCreate, StackRecord};
use crate::wire::{
    fault_message, CreatedEnvelope, DeploymentEnvelope, DeploymentListEnvelope,
    ResourceListEnvelope, StackEnvelope, StackListEnvelope,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Heat client bound to one orchestration endpoint and token.
#[derive(Clone)]
pub struct HeatClient {
    http: reqwest::Client,
    endpoint: Url,
    token: String,
}

impl std::fmt::Debug for HeatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeatClient")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl HeatClient {
    /// Create a client for `endpoint` (e.g. `http://heat:8004/v1/<tenant>`).
    pub fn new(endpoint: &str, token: impl Into<String>) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Self::with_http_client(http, endpoint, token)
    }

    /// Create with a preconfigured reqwest client.
    pub fn with_http_client(
        http: reqwest::Client,
        endpoint: &str,
        token: impl Into<String>,
    ) -> ApiResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ApiError::EndpointNotFound(format!("{}: {}", endpoint, e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(ApiError::EndpointNotFound(format!(
                "{} cannot be used as a base URL",
                endpoint
            )));
        }
        Ok(Self {
            http,
            endpoint,
            token: token.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("X-Auth-Token", &self.token)
            .header("Accept", "application/json")
    }

    /// Turn a non-success response into a typed error.
    async fn check(response: Response) -> ApiResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status.as_u16(), fault_message(&body)))
    }
}

#[async_trait]
impl OrchestrationClient for HeatClient {
    async fn create_stack(&self, request: &StackCreate) -> ApiResult<String> {
        info!("Submitting stack create for {}", request.name);

        let response = self
            .request(Method::POST, self.url(&["stacks"]))
            .json(request)
            .send()
            .await?;
        let created: CreatedEnvelope = Self::check(response).await?.json().await?;

        debug!("Stack {} created with id {}", request.name, created.stack.id);
        Ok(created.stack.id)
    }

    async fn get_stack(&self, name_or_id: &str) -> ApiResult<Option<StackRecord>> {
        let response = self
            .request(Method::GET, self.url(&["stacks", name_or_id]))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let envelope: StackEnvelope = Self::check(response).await?.json().await?;
        Ok(Some(envelope.stack.into()))
    }

    async fn list_stacks(&self) -> ApiResult<Vec<StackRecord>> {
        let response = self
            .request(Method::GET, self.url(&["stacks"]))
            .send()
            .await?;
        let envelope: StackListEnvelope = Self::check(response).await?.json().await?;
        Ok(envelope.stacks.into_iter().map(Into::into).collect())
    }

    async fn delete_stack(&self, name_or_id: &str) -> ApiResult<bool> {
        // DELETE needs the canonical stacks/{name}/{id} path; the name-only
        // form answers with a redirect that clients replay as GET.
        let Some(stack) = self.get_stack(name_or_id).await? else {
            return Ok(false);
        };

        info!("Submitting stack delete for {} ({})", stack.name, stack.id);

        let response = self
            .request(Method::DELETE, self.url(&["stacks", &stack.name, &stack.id]))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::check(response).await?;
        Ok(true)
    }

    async fn list_resources(
        &self,
        name_or_id: &str,
        nested_depth: u32,
    ) -> ApiResult<Vec<ResourceRecord>> {
        debug!("Listing resources of {} (nested_depth={})", name_or_id, nested_depth);

        let response = self
            .request(Method::GET, self.url(&["stacks", name_or_id, "resources"]))
            .query(&[("nested_depth", nested_depth)])
            .send()
            .await?;
        let envelope: ResourceListEnvelope = Self::check(response).await?.json().await?;
        Ok(envelope.resources.into_iter().map(Into::into).collect())
    }

    async fn get_deployment(&self, id: &str) -> ApiResult<Option<DeploymentDiagnostic>> {
        let response = self
            .request(Method::GET, self.url(&["software_deployments", id]))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("No software deployment with id {}", id);
            return Ok(None);
        }

        let envelope: DeploymentEnvelope = Self::check(response).await?.json().await?;
        Ok(Some(envelope.software_deployment.into()))
    }

    async fn list_deployments(&self, status: Option<&str>) -> ApiResult<Vec<DeploymentDiagnostic>> {
        let response = self
            .request(Method::GET, self.url(&["software_deployments"]))
            .send()
            .await?;
        let envelope: DeploymentListEnvelope = Self::check(response).await?.json().await?;

        Ok(envelope
            .software_deployments
            .into_iter()
            .map(DeploymentDiagnostic::from)
            .filter(|d| status.map_or(true, |s| d.status.contains(s)))
            .collect())
    }
}
