//! Failure inspection across a stack's resource tree.

use std::sync::Arc;

use heat_api::{DeploymentDiagnostic, OrchestrationClient, ResourceRecord, RetryingClient};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ReconcilerConfig;
use crate::error::{StackError, StackResult};

/// Projection of a failed resource for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedResource {
    pub resource_name: String,
    pub status_reason: String,
    pub resource_type: String,
}

impl From<&ResourceRecord> for FailedResource {
    fn from(record: &ResourceRecord) -> Self {
        Self {
            resource_name: record.name.clone(),
            status_reason: record.status_reason.clone(),
            resource_type: record.resource_type.clone(),
        }
    }
}

/// Failed resources of a stack and the deployment output behind them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugReport {
    pub failed_resources: Vec<FailedResource>,
    pub failed_deployments: Vec<DeploymentDiagnostic>,
}

impl DebugReport {
    pub fn is_empty(&self) -> bool {
        self.failed_resources.is_empty() && self.failed_deployments.is_empty()
    }
}

/// Walks resource trees looking for failures.
pub struct FailureInspector {
    client: Arc<dyn OrchestrationClient>,
    config: ReconcilerConfig,
}

impl FailureInspector {
    /// Wrap `client` so reads follow `config.read_retry`.
    pub fn new(client: Arc<dyn OrchestrationClient>, config: ReconcilerConfig) -> Self {
        let client: Arc<dyn OrchestrationClient> =
            Arc::new(RetryingClient::new(client, config.read_retry.clone()));
        Self { client, config }
    }

    /// Resources of `name`, down to `max_nested_depth` levels of nested
    /// stacks, whose status the failure policy flags. API order is kept.
    pub async fn find_failed_resources(
        &self,
        name: &str,
        max_nested_depth: u32,
    ) -> StackResult<Vec<ResourceRecord>> {
        let resources = self.client.list_resources(name, max_nested_depth).await?;
        let total = resources.len();

        let failed: Vec<ResourceRecord> = resources
            .into_iter()
            .filter(|r| self.config.failure_match.matches(&r.status))
            .collect();

        debug!(
            "Stack {}: {} of {} resources failed (depth {})",
            name,
            failed.len(),
            total,
            max_nested_depth
        );
        Ok(failed)
    }

    /// Failed resources of `name` plus the deployment diagnostics found for
    /// them. Resources without a deployment contribute no diagnostic.
    pub async fn debug(&self, name: &str) -> StackResult<DebugReport> {
        let failed = self
            .find_failed_resources(name, self.config.max_nested_depth)
            .await?;

        let mut report = DebugReport {
            failed_resources: failed.iter().map(FailedResource::from).collect(),
            failed_deployments: Vec::new(),
        };

        for resource in &failed {
            if resource.physical_resource_id.is_empty() {
                continue;
            }
            let lookup = self
                .client
                .get_deployment(&resource.physical_resource_id)
                .await
                .map_err(StackError::from);
            match lookup {
                Ok(Some(diagnostic)) => report.failed_deployments.push(diagnostic),
                Ok(None) | Err(StackError::LookupNotFound(_)) => debug!(
                    "Resource {} ({}) has no software deployment",
                    resource.name, resource.physical_resource_id
                ),
                Err(e) => return Err(e),
            }
        }

        info!(
            "Stack {}: {} failed resources, {} deployment diagnostics",
            name,
            report.failed_resources.len(),
            report.failed_deployments.len()
        );
        Ok(report)
    }

    /// Software deployments whose status contains `status_token`.
    pub async fn failed_deployments(&self, status_token: &str) -> StackResult<Vec<DeploymentDiagnostic>> {
        Ok(self.client.list_deployments(Some(status_token)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FailureMatch;
    use heat_api::{MockOrchestration, RetryPolicy, StackRecord, StackStatus};

    fn inspector(mock: &MockOrchestration, config: ReconcilerConfig) -> FailureInspector {
        FailureInspector::new(Arc::new(mock.clone()), config.read_retry(RetryPolicy::none()))
    }

    fn stack() -> StackRecord {
        StackRecord::new("id-1", "demo", StackStatus::create_failed())
    }

    #[tokio::test]
    async fn test_filter_keeps_api_order() {
        let mock = MockOrchestration::new()
            .with_stack(stack())
            .add_resource("demo", 0, ResourceRecord::new("b", "OS::Nova::Server", "CREATE_FAILED"))
            .add_resource("demo", 0, ResourceRecord::new("ok", "OS::Nova::Port", "CREATE_COMPLETE"))
            .add_resource("demo", 0, ResourceRecord::new("a", "OS::Heat::Stack", "UPDATE_FAILED"));

        let failed = inspector(&mock, ReconcilerConfig::default())
            .find_failed_resources("demo", 0)
            .await
            .unwrap();

        let names: Vec<&str> = failed.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_depth_bound_is_forwarded() {
        let mock = MockOrchestration::new()
            .with_stack(stack())
            .add_resource("demo", 0, ResourceRecord::new("top", "OS::Heat::Stack", "CREATE_FAILED"))
            .add_resource("demo", 2, ResourceRecord::new("deep", "OS::Nova::Server", "CREATE_FAILED"));

        let inspector = inspector(&mock, ReconcilerConfig::default());
        assert_eq!(inspector.find_failed_resources("demo", 1).await.unwrap().len(), 1);
        assert_eq!(inspector.find_failed_resources("demo", 2).await.unwrap().len(), 2);

        let depths: Vec<Option<u32>> = mock
            .get_method_calls("list_resources")
            .iter()
            .map(|c| c.nested_depth)
            .collect();
        assert_eq!(depths, vec![Some(1), Some(2)]);
    }

    #[tokio::test]
    async fn test_policy_controls_matching() {
        let mock = MockOrchestration::new()
            .with_stack(stack())
            .add_resource("demo", 0, ResourceRecord::new("a", "T", "CREATE_FAILED"))
            .add_resource("demo", 0, ResourceRecord::new("b", "T", "FAILED: step 3 of deploy"));

        let suffix = ReconcilerConfig::default().failure_match("suffix:_FAILED".parse::<FailureMatch>().unwrap());
        let failed = inspector(&mock, suffix)
            .find_failed_resources("demo", 0)
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name, "a");

        let failed = inspector(&mock, ReconcilerConfig::default())
            .find_failed_resources("demo", 0)
            .await
            .unwrap();
        assert_eq!(failed.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_stack_is_lookup_not_found() {
        let mock = MockOrchestration::new();
        let result = inspector(&mock, ReconcilerConfig::default())
            .find_failed_resources("ghost", 5)
            .await;
        assert!(matches!(result, Err(StackError::LookupNotFound(_))));
    }

    #[tokio::test]
    async fn test_debug_skips_resources_without_physical_id() {
        let mock = MockOrchestration::new()
            .with_stack(stack())
            .add_resource("demo", 0, ResourceRecord::new("pending", "OS::Heat::SoftwareDeployment", "CREATE_FAILED"));

        let report = inspector(&mock, ReconcilerConfig::default())
            .debug("demo")
            .await
            .unwrap();

        assert_eq!(report.failed_resources.len(), 1);
        assert!(report.failed_deployments.is_empty());
        assert!(!mock.was_called("get_deployment"));
    }

    #[tokio::test]
    async fn test_failed_deployments_filters_by_status() {
        let mock = MockOrchestration::new()
            .add_deployment(DeploymentDiagnostic::new("d-1", "srv-1").with_status("FAILED", "exit 1"))
            .add_deployment(DeploymentDiagnostic::new("d-2", "srv-2").with_status("COMPLETE", ""));

        let found = inspector(&mock, ReconcilerConfig::default())
            .failed_deployments("FAILED")
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].deployment_id, "d-1");
    }
}
