//! Orchestration client trait.

use async_trait::async_trait;

use crate::error::ApiResult;
use crate::models::{DeploymentDiagnostic, ResourceRecord, StackCreate, StackRecord};

/// Handle on the orchestration service granted by a session.
///
/// Absence is reported as `Ok(None)` / `Ok(false)` on the lookup and delete
/// calls so callers can treat "not there" as a normal outcome.
#[async_trait]
pub trait OrchestrationClient: Send + Sync {
    /// Submit a stack for creation. Returns the new stack id.
    async fn create_stack(&self, request: &StackCreate) -> ApiResult<String>;

    /// Fetch a stack by name or id.
    async fn get_stack(&self, name_or_id: &str) -> ApiResult<Option<StackRecord>>;

    /// List stacks visible to the project.
    async fn list_stacks(&self) -> ApiResult<Vec<StackRecord>>;

    /// Submit deletion. Returns `false` when there was nothing to delete.
    async fn delete_stack(&self, name_or_id: &str) -> ApiResult<bool>;

    /// List resources, descending into nested stacks up to `nested_depth`.
    async fn list_resources(
        &self,
        name_or_id: &str,
        nested_depth: u32,
    ) -> ApiResult<Vec<ResourceRecord>>;

    /// Look up a software deployment by id.
    async fn get_deployment(&self, id: &str) -> ApiResult<Option<DeploymentDiagnostic>>;

    /// List software deployments whose status contains `status` (all when `None`).
    async fn list_deployments(&self, status: Option<&str>) -> ApiResult<Vec<DeploymentDiagnostic>>;
}
