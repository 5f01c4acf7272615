//! Bounded exponential backoff for idempotent reads.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::client::OrchestrationClient;
use crate::error::ApiResult;
use crate::models::{DeploymentDiagnostic, ResourceRecord, StackCreate, StackRecord};

/// Retry budget for read calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (1 = no retry)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on a single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before retry number `retry` (1-based): base * 2^(retry-1), capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op`, retrying transient failures until the attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what, attempt, self.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

/// Decorator adding [`RetryPolicy`] to the read calls of another client.
///
/// Create and delete submissions are forwarded once; retrying them could
/// duplicate side effects.
#[derive(Clone)]
pub struct RetryingClient {
    inner: Arc<dyn OrchestrationClient>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn OrchestrationClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl OrchestrationClient for RetryingClient {
    async fn create_stack(&self, request: &StackCreate) -> ApiResult<String> {
        self.inner.create_stack(request).await
    }

    async fn get_stack(&self, name_or_id: &str) -> ApiResult<Option<StackRecord>> {
        let inner = &self.inner;
        self.policy
            .run("get_stack", move || inner.get_stack(name_or_id))
            .await
    }

    async fn list_stacks(&self) -> ApiResult<Vec<StackRecord>> {
        let inner = &self.inner;
        self.policy.run("list_stacks", move || inner.list_stacks()).await
    }

    async fn delete_stack(&self, name_or_id: &str) -> ApiResult<bool> {
        self.inner.delete_stack(name_or_id).await
    }

    async fn list_resources(
        &self,
        name_or_id: &str,
        nested_depth: u32,
    ) -> ApiResult<Vec<ResourceRecord>> {
        let inner = &self.inner;
        self.policy
            .run("list_resources", move || inner.list_resources(name_or_id, nested_depth))
            .await
    }

    async fn get_deployment(&self, id: &str) -> ApiResult<Option<DeploymentDiagnostic>> {
        let inner = &self.inner;
        self.policy
            .run("get_deployment", move || inner.get_deployment(id))
            .await
    }

    async fn list_deployments(&self, status: Option<&str>) -> ApiResult<Vec<DeploymentDiagnostic>> {
        let inner = &self.inner;
        self.policy
            .run("list_deployments", move || inner.list_deployments(status))
            .await
    }
}
