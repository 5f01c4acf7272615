//! Converges a named stack to its desired lifecycle state.

use std::sync::Arc;
use std::time::Duration;

use heat_api::{OrchestrationClient, RetryingClient, StackAction, StackCreate, StackRecord};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ReconcilerConfig;
use crate::error::{StackError, StackResult};
use crate::poll::Poller;
use crate::request::{DesiredState, StackRequest};
use crate::template::TemplateLoader;

/// Result of an ensure call.
#[derive(Debug, Clone, Serialize)]
pub struct EnsureOutcome {
    /// Stack as last observed, `None` when it does not exist
    pub stack: Option<StackRecord>,
    /// Whether a create or delete was submitted
    pub changed: bool,
}

impl EnsureOutcome {
    fn unchanged(stack: Option<StackRecord>) -> Self {
        Self {
            stack,
            changed: false,
        }
    }

    fn changed(stack: Option<StackRecord>) -> Self {
        Self {
            stack,
            changed: true,
        }
    }
}

/// Step `ensure` settles on after the lookup.
#[derive(Debug)]
enum Plan {
    Keep(Option<StackRecord>),
    /// Carries the `DELETE_COMPLETE` record being replaced, if any
    Create(Option<StackRecord>),
    Delete(StackRecord),
}

/// What a poll should make of the stack disappearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Vanished {
    /// Not visible yet; keep polling
    Retry,
    /// Gone for good; the transition is over
    Done,
}

/// Reconciles stacks against the orchestration service.
pub struct StackReconciler {
    client: Arc<dyn OrchestrationClient>,
    config: ReconcilerConfig,
    loader: TemplateLoader,
}

impl StackReconciler {
    /// Wrap `client` so idempotent reads follow `config.read_retry`.
    pub fn new(client: Arc<dyn OrchestrationClient>, config: ReconcilerConfig) -> Self {
        let client: Arc<dyn OrchestrationClient> =
            Arc::new(RetryingClient::new(client, config.read_retry.clone()));
        Self {
            client,
            config,
            loader: TemplateLoader::new(),
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Drive the stack named in `request` to its desired state.
    ///
    /// Blocks until the transition reaches a terminal status, the request
    /// timeout elapses, or `cancel` fires. Cancelling abandons the wait
    /// only; a transition already submitted keeps running server side.
    pub async fn ensure(
        &self,
        request: &StackRequest,
        cancel: &CancellationToken,
    ) -> StackResult<EnsureOutcome> {
        request.validate()?;
        info!(
            "Ensuring stack {} is {}",
            request.name,
            request.desired_state.as_str()
        );

        let existing = self.lookup(&request.name).await?;
        let plan = Self::plan(request, existing)?;

        if request.check {
            let outcome = match plan {
                Plan::Keep(stack) => EnsureOutcome::unchanged(stack),
                Plan::Create(stack) => EnsureOutcome::changed(stack),
                Plan::Delete(stack) => EnsureOutcome::changed(Some(stack)),
            };
            info!(
                "Check mode: stack {} would {}",
                request.name,
                if outcome.changed { "change" } else { "stay as is" }
            );
            return Ok(outcome);
        }

        match plan {
            Plan::Keep(stack) => Ok(EnsureOutcome::unchanged(stack)),
            Plan::Create(_) => self.create(request, cancel).await,
            Plan::Delete(stack) => self.delete(request, stack, cancel).await,
        }
    }

    /// All stacks visible to the project.
    pub async fn list(&self) -> StackResult<Vec<StackRecord>> {
        Ok(self.client.list_stacks().await?)
    }

    /// One stack by exact name.
    pub async fn show(&self, name: &str) -> StackResult<StackRecord> {
        self.lookup(name)
            .await?
            .ok_or_else(|| StackError::LookupNotFound(format!("stack {} does not exist", name)))
    }

    /// Look a stack up by exact name. Heat may match names loosely, so a
    /// record with a different name counts as absent.
    async fn lookup(&self, name: &str) -> StackResult<Option<StackRecord>> {
        let found = self.client.get_stack(name).await?;
        Ok(found.filter(|stack| stack.name == name))
    }

    /// Decide what reaching the desired state takes, without side effects.
    fn plan(request: &StackRequest, existing: Option<StackRecord>) -> StackResult<Plan> {
        match request.desired_state {
            DesiredState::Present => {
                let Some(stack) = existing else {
                    return Ok(Plan::Create(None));
                };

                if stack.status.is_deleted() {
                    debug!("Stack {} only exists as {}, recreating", stack.name, stack.status);
                    return Ok(Plan::Create(Some(stack)));
                }
                if stack.status.action == StackAction::Delete && !stack.status.is_terminal() {
                    return Err(StackError::Conflict(format!(
                        "stack {} is {}",
                        stack.name, stack.status
                    )));
                }
                if stack.status.is_failed() {
                    return Err(StackError::failed(&stack.status, stack.status_reason));
                }

                info!("Stack {} already present ({})", stack.name, stack.status);
                Ok(Plan::Keep(Some(stack)))
            }
            DesiredState::Absent => match existing {
                Some(stack) if !stack.status.is_deleted() => Ok(Plan::Delete(stack)),
                _ => {
                    info!("Stack {} already absent", request.name);
                    Ok(Plan::Keep(None))
                }
            },
        }
    }

    async fn delete(
        &self,
        request: &StackRequest,
        stack: StackRecord,
        cancel: &CancellationToken,
    ) -> StackResult<EnsureOutcome> {
        if !self.client.delete_stack(&stack.name).await? {
            return Err(StackError::failed(
                "DELETE_FAILED",
                format!("delete stack failed for stack: {}", stack.name),
            ));
        }
        info!("Submitted delete for stack {} ({})", stack.name, stack.id);

        let observed = self
            .poll(&stack.id, &stack.name, StackAction::Delete, Vanished::Done, request.timeout, cancel)
            .await?;

        match observed {
            None => Ok(EnsureOutcome::changed(None)),
            Some(record) if record.status.is_deleted() => Ok(EnsureOutcome::changed(Some(record))),
            Some(record) => Err(StackError::failed(&record.status, record.status_reason)),
        }
    }

    async fn create(
        &self,
        request: &StackRequest,
        cancel: &CancellationToken,
    ) -> StackResult<EnsureOutcome> {
        let template = request.template_source.as_deref().ok_or_else(|| {
            StackError::Validation("template required with present state".to_string())
        })?;
        let payload = self.loader.load(template, &request.environment_files)?;

        let submission = StackCreate::new(&request.name, payload.template)
            .environment(payload.environment)
            .files(payload.files)
            .parameters(request.parameters.clone())
            .timeout_secs(request.timeout.as_secs());

        let id = self.client.create_stack(&submission).await?;
        info!("Submitted create for stack {} ({})", request.name, id);

        let record = self
            .poll(&id, &request.name, StackAction::Create, Vanished::Retry, request.timeout, cancel)
            .await?
            .ok_or_else(|| StackError::LookupNotFound(format!("stack {} vanished", request.name)))?;

        if record.status.action == StackAction::Create && record.status.is_complete() {
            info!("Stack {} created", record.name);
            Ok(EnsureOutcome::changed(Some(record)))
        } else {
            Err(StackError::failed(&record.status, record.status_reason))
        }
    }

    /// Poll `target` until the `expected` transition settles.
    ///
    /// Terminal statuses of another action are left over from before the
    /// submission and are skipped, except a rollback that ends a create.
    /// Lookup misses and transient errors are retried until the deadline.
    /// Each fetch, read retries included, is held to the same deadline and
    /// token as the waits between them.
    async fn poll(
        &self,
        target: &str,
        name: &str,
        expected: StackAction,
        vanished: Vanished,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> StackResult<Option<StackRecord>> {
        let mut poller = Poller::start(name, self.config.poll_interval, timeout);

        loop {
            poller.wait(cancel).await?;

            let fetched = poller.bounded(self.client.get_stack(target), cancel).await?;
            match fetched.map_err(StackError::from) {
                Ok(Some(record)) => {
                    let status = &record.status;
                    let settles = status.action == expected
                        || (expected == StackAction::Create && status.action == StackAction::Rollback);

                    if status.is_terminal() && settles {
                        debug!("Stack {} settled at {} after {} polls", name, status, poller.polls());
                        return Ok(Some(record));
                    }
                    if status.is_terminal() {
                        debug!("Ignoring stale status {} for stack {}", status, name);
                    } else {
                        info!("Stack {} is {}", name, status);
                    }
                }
                Ok(None) if vanished == Vanished::Done => {
                    debug!("Stack {} is gone", name);
                    return Ok(None);
                }
                Ok(None) => debug!("Stack {} not visible yet", name),
                Err(e) if e.is_retryable_during_poll() => {
                    warn!("Polling stack {} failed, will retry: {}", name, e);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
