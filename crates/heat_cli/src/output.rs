//! JSON result records written to stdout.

use serde::Serialize;

use heat_api::{DeploymentDiagnostic, StackRecord};
use heat_stack::{DebugReport, EnsureOutcome, FailedResource};

/// Successful outcome of one invocation.
#[derive(Debug, Default, Serialize)]
pub struct ResultRecord {
    pub changed: bool,
    /// State that was handled
    pub result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<StackRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_list: Option<Vec<StackRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_resources: Option<Vec<FailedResource>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_deployments: Option<Vec<DeploymentDiagnostic>>,
}

impl ResultRecord {
    pub fn new(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            ..Self::default()
        }
    }

    pub fn from_outcome(result: impl Into<String>, outcome: EnsureOutcome) -> Self {
        let mut record = Self::new(result);
        record.changed = outcome.changed;
        record.id = outcome.stack.as_ref().map(|s| s.id.clone());
        record.stack = outcome.stack;
        record
    }

    pub fn with_stack(mut self, stack: StackRecord) -> Self {
        self.id = Some(stack.id.clone());
        self.stack = Some(stack);
        self
    }

    pub fn with_stack_list(mut self, stacks: Vec<StackRecord>) -> Self {
        self.stack_list = Some(stacks);
        self
    }

    pub fn with_report(mut self, report: DebugReport) -> Self {
        self.failed_resources = Some(report.failed_resources);
        self.failed_deployments = Some(report.failed_deployments);
        self
    }
}

/// Emitted instead of a [`ResultRecord`] when the invocation fails.
#[derive(Debug, Serialize)]
pub struct FailureRecord {
    pub failed: bool,
    pub msg: String,
}

impl FailureRecord {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            failed: true,
            msg: msg.into(),
        }
    }
}

/// Print `value` as one line of JSON on stdout.
pub fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
