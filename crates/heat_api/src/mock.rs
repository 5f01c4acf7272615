//! Mock orchestration client for testing.
//!
//! Provides a scripted implementation of the OrchestrationClient trait so
//! reconciliation and inspection logic can be exercised without a cloud.
//! Each `get_stack` call advances the stack one step through its scripted
//! status sequence, which is how a real stack is observed between polls.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::client::OrchestrationClient;
use crate::error::{ApiError, ApiResult};
use crate::models::{DeploymentDiagnostic, ResourceRecord, StackCreate, StackRecord, StackStatus};

/// Failure to inject into a mocked call.
#[derive(Debug, Clone)]
pub enum MockFailure {
    Transient(String),
    Conflict(String),
    NotFound(String),
    Authentication(String),
}

impl MockFailure {
    fn into_error(self) -> ApiError {
        match self {
            MockFailure::Transient(msg) => ApiError::Transient(msg),
            MockFailure::Conflict(msg) => ApiError::Conflict(msg),
            MockFailure::NotFound(msg) => ApiError::NotFound(msg),
            MockFailure::Authentication(msg) => ApiError::Authentication(msg),
        }
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub method: String,
    /// Stack name/id or deployment id the call addressed
    pub target: Option<String>,
    pub nested_depth: Option<u32>,
}

#[derive(Debug, Clone)]
struct MockStack {
    record: StackRecord,
    /// Statuses applied one per `get_stack` call
    script: VecDeque<StackStatus>,
    /// Deleted: vanishes once the script is exhausted
    pending_removal: bool,
}

#[derive(Debug, Clone)]
struct MockResource {
    stack: String,
    depth: u32,
    record: ResourceRecord,
}

/// Mock orchestration client for testing.
#[derive(Clone)]
pub struct MockOrchestration {
    stacks: Arc<RwLock<Vec<MockStack>>>,
    /// Script installed on stacks created through `create_stack`.
    create_script: Arc<RwLock<Vec<StackStatus>>>,
    /// Script installed on stacks deleted through `delete_stack`.
    delete_script: Arc<RwLock<Vec<StackStatus>>>,
    /// `get_stack` calls that miss right after a create.
    hidden_after_create: Arc<RwLock<usize>>,
    resources: Arc<RwLock<Vec<MockResource>>>,
    deployments: Arc<RwLock<HashMap<String, DeploymentDiagnostic>>>,
    failures: Arc<RwLock<HashMap<String, VecDeque<MockFailure>>>>,
    delete_refused: Arc<RwLock<bool>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
}

impl Default for MockOrchestration {
    fn default() -> Self {
        Self::new()
    }
}

impl MockOrchestration {
    /// Create a new mock with no stacks. Created stacks complete on the
    /// first poll and deleted stacks vanish on the first poll.
    pub fn new() -> Self {
        Self {
            stacks: Arc::new(RwLock::new(Vec::new())),
            create_script: Arc::new(RwLock::new(vec![StackStatus::create_complete()])),
            delete_script: Arc::new(RwLock::new(Vec::new())),
            hidden_after_create: Arc::new(RwLock::new(0)),
            resources: Arc::new(RwLock::new(Vec::new())),
            deployments: Arc::new(RwLock::new(HashMap::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            delete_refused: Arc::new(RwLock::new(false)),
            captured_calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Add an existing stack.
    pub fn with_stack(self, record: StackRecord) -> Self {
        self.stacks.write().push(MockStack {
            record,
            script: VecDeque::new(),
            pending_removal: false,
        });
        self
    }

    /// Statuses observed by successive polls after a create. The last one sticks.
    pub fn create_transitions(self, statuses: Vec<StackStatus>) -> Self {
        *self.create_script.write() = statuses;
        self
    }

    /// Statuses observed by successive polls after a delete. Once exhausted
    /// the stack disappears, unless the last status was `DELETE_FAILED`.
    pub fn delete_transitions(self, statuses: Vec<StackStatus>) -> Self {
        *self.delete_script.write() = statuses;
        self
    }

    /// Make the first `count` lookups after a create miss.
    pub fn hide_after_create(self, count: usize) -> Self {
        *self.hidden_after_create.write() = count;
        self
    }

    /// Add a resource reported for `stack` at nested `depth` (0 = top level).
    pub fn add_resource(self, stack: impl Into<String>, depth: u32, record: ResourceRecord) -> Self {
        self.resources.write().push(MockResource {
            stack: stack.into(),
            depth,
            record,
        });
        self
    }

    /// Add a software deployment.
    pub fn add_deployment(self, diagnostic: DeploymentDiagnostic) -> Self {
        self.deployments
            .write()
            .insert(diagnostic.deployment_id.clone(), diagnostic);
        self
    }

    /// Fail the next `times` calls of `method`.
    pub fn fail_times(self, method: &str, times: usize, failure: MockFailure) -> Self {
        let mut failures = self.failures.write();
        let queue = failures.entry(method.to_string()).or_default();
        queue.extend(std::iter::repeat(failure).take(times));
        drop(failures);
        self
    }

    /// Make `delete_stack` report that nothing was deleted.
    pub fn refuse_delete(self) -> Self {
        *self.delete_refused.write() = true;
        self
    }

    /// Clear all captured calls.
    pub fn clear_calls(&self) {
        self.captured_calls.write().clear();
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Check if a specific method was called.
    pub fn was_called(&self, method: &str) -> bool {
        self.captured_calls
            .read()
            .iter()
            .any(|c| c.method == method)
    }

    /// Get calls to a specific method.
    pub fn get_method_calls(&self, method: &str) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// Current record of a stack without advancing its script.
    pub fn peek_stack(&self, name_or_id: &str) -> Option<StackRecord> {
        self.stacks
            .read()
            .iter()
            .find(|s| s.record.name == name_or_id || s.record.id == name_or_id)
            .map(|s| s.record.clone())
    }

    fn record_call(&self, method: &str, target: Option<&str>, nested_depth: Option<u32>) {
        self.captured_calls.write().push(CapturedCall {
            method: method.to_string(),
            target: target.map(str::to_string),
            nested_depth,
        });
    }

    fn check_failure(&self, method: &str) -> ApiResult<()> {
        let next = self
            .failures
            .write()
            .get_mut(method)
            .and_then(|queue| queue.pop_front());
        match next {
            Some(failure) => Err(failure.into_error()),
            None => Ok(()),
        }
    }

    fn position(stacks: &[MockStack], name_or_id: &str) -> Option<usize> {
        stacks
            .iter()
            .position(|s| s.record.name == name_or_id || s.record.id == name_or_id)
    }
}

#[async_trait]
impl OrchestrationClient for MockOrchestration {
    async fn create_stack(&self, request: &StackCreate) -> ApiResult<String> {
        self.record_call("create_stack", Some(&request.name), None);
        self.check_failure("create_stack")?;

        let mut stacks = self.stacks.write();
        if let Some(existing) = stacks
            .iter()
            .find(|s| s.record.name == request.name && !s.record.status.is_deleted())
        {
            return Err(ApiError::Conflict(format!(
                "The Stack ({}) already exists.",
                existing.record.name
            )));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let mut record = StackRecord::new(&id, &request.name, StackStatus::create_in_progress())
            .with_reason("Stack CREATE started");
        record.creation_time = Some(Utc::now());

        stacks.retain(|s| s.record.name != request.name);
        stacks.push(MockStack {
            record,
            script: self.create_script.read().iter().cloned().collect(),
            pending_removal: false,
        });
        Ok(id)
    }

    async fn get_stack(&self, name_or_id: &str) -> ApiResult<Option<StackRecord>> {
        self.record_call("get_stack", Some(name_or_id), None);
        self.check_failure("get_stack")?;

        let mut stacks = self.stacks.write();
        let Some(index) = Self::position(&stacks, name_or_id) else {
            return Ok(None);
        };

        {
            let mut hidden = self.hidden_after_create.write();
            let fresh = stacks[index].record.status == StackStatus::create_in_progress();
            if *hidden > 0 && fresh {
                *hidden -= 1;
                return Ok(None);
            }
        }

        let stack = &mut stacks[index];
        if let Some(next) = stack.script.pop_front() {
            stack.record.status = next;
            stack.record.updated_time = Some(Utc::now());
        } else if stack.pending_removal && !stack.record.status.is_failed() {
            stacks.remove(index);
            return Ok(None);
        }

        Ok(Some(stacks[index].record.clone()))
    }

    async fn list_stacks(&self) -> ApiResult<Vec<StackRecord>> {
        self.record_call("list_stacks", None, None);
        self.check_failure("list_stacks")?;
        Ok(self.stacks.read().iter().map(|s| s.record.clone()).collect())
    }

    async fn delete_stack(&self, name_or_id: &str) -> ApiResult<bool> {
        self.record_call("delete_stack", Some(name_or_id), None);
        self.check_failure("delete_stack")?;

        if *self.delete_refused.read() {
            return Ok(false);
        }

        let mut stacks = self.stacks.write();
        let Some(index) = Self::position(&stacks, name_or_id) else {
            return Ok(false);
        };

        let stack = &mut stacks[index];
        stack.record.status = StackStatus::delete_in_progress();
        stack.record.status_reason = "Stack DELETE started".to_string();
        stack.script = self.delete_script.read().iter().cloned().collect();
        stack.pending_removal = true;
        Ok(true)
    }

    async fn list_resources(
        &self,
        name_or_id: &str,
        nested_depth: u32,
    ) -> ApiResult<Vec<ResourceRecord>> {
        self.record_call("list_resources", Some(name_or_id), Some(nested_depth));
        self.check_failure("list_resources")?;

        let known = Self::position(&self.stacks.read(), name_or_id).is_some()
            || self.resources.read().iter().any(|r| r.stack == name_or_id);
        if !known {
            return Err(ApiError::NotFound(format!(
                "The Stack ({}) could not be found.",
                name_or_id
            )));
        }

        Ok(self
            .resources
            .read()
            .iter()
            .filter(|r| r.stack == name_or_id && r.depth <= nested_depth)
            .map(|r| r.record.clone())
            .collect())
    }

    async fn get_deployment(&self, id: &str) -> ApiResult<Option<DeploymentDiagnostic>> {
        self.record_call("get_deployment", Some(id), None);
        self.check_failure("get_deployment")?;
        Ok(self.deployments.read().get(id).cloned())
    }

    async fn list_deployments(&self, status: Option<&str>) -> ApiResult<Vec<DeploymentDiagnostic>> {
        self.record_call("list_deployments", status, None);
        self.check_failure("list_deployments")?;

        let mut deployments: Vec<DeploymentDiagnostic> = self
            .deployments
            .read()
            .values()
            .filter(|d| status.map_or(true, |s| d.status.contains(s)))
            .cloned()
            .collect();
        deployments.sort_by(|a, b| a.deployment_id.cmp(&b.deployment_id));
        Ok(deployments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_create_follows_script() {
        let mock = MockOrchestration::new().create_transitions(vec![
            StackStatus::create_in_progress(),
            StackStatus::create_complete(),
        ]);

        let id = mock
            .create_stack(&StackCreate::new("demo", serde_json::json!({})))
            .await
            .unwrap();

        let first = mock.get_stack(&id).await.unwrap().unwrap();
        assert_eq!(first.status, StackStatus::create_in_progress());

        let second = mock.get_stack("demo").await.unwrap().unwrap();
        assert_eq!(second.status, StackStatus::create_complete());

        let third = mock.get_stack("demo").await.unwrap().unwrap();
        assert_eq!(third.status, StackStatus::create_complete());
    }

    #[tokio::test]
    async fn test_mock_duplicate_create_conflicts() {
        let mock = MockOrchestration::new()
            .with_stack(StackRecord::new("id-1", "demo", StackStatus::create_complete()));

        let result = mock
            .create_stack(&StackCreate::new("demo", serde_json::json!({})))
            .await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_mock_delete_then_vanish() {
        let mock = MockOrchestration::new()
            .with_stack(StackRecord::new("id-1", "demo", StackStatus::create_complete()))
            .delete_transitions(vec![StackStatus::delete_in_progress()]);

        assert!(mock.delete_stack("demo").await.unwrap());
        assert!(mock.get_stack("demo").await.unwrap().is_some());
        assert!(mock.get_stack("demo").await.unwrap().is_none());
        assert!(!mock.delete_stack("demo").await.unwrap());
    }

    #[tokio::test]
    async fn test_mock_delete_failure_sticks() {
        let mock = MockOrchestration::new()
            .with_stack(StackRecord::new("id-1", "demo", StackStatus::create_complete()))
            .delete_transitions(vec![StackStatus::delete_failed()]);

        mock.delete_stack("demo").await.unwrap();
        for _ in 0..3 {
            let record = mock.get_stack("demo").await.unwrap().unwrap();
            assert_eq!(record.status, StackStatus::delete_failed());
        }
    }

    #[tokio::test]
    async fn test_mock_resources_respect_depth() {
        let mock = MockOrchestration::new()
            .with_stack(StackRecord::new("id-1", "demo", StackStatus::create_failed()))
            .add_resource("demo", 0, ResourceRecord::new("top", "OS::Nova::Server", "CREATE_COMPLETE"))
            .add_resource("demo", 2, ResourceRecord::new("deep", "OS::Heat::SoftwareDeployment", "CREATE_FAILED"));

        assert_eq!(mock.list_resources("demo", 0).await.unwrap().len(), 1);
        assert_eq!(mock.list_resources("demo", 5).await.unwrap().len(), 2);
        assert!(matches!(
            mock.list_resources("missing", 5).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_failure_injection_is_consumed() {
        let mock = MockOrchestration::new()
            .fail_times("list_stacks", 1, MockFailure::Transient("reset".into()));

        assert!(mock.list_stacks().await.is_err());
        assert!(mock.list_stacks().await.is_ok());
        assert_eq!(mock.get_method_calls("list_stacks").len(), 2);
    }
}
