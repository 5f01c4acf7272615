//! Typed records for stacks, resources and software deployments.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle action half of a Heat status string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StackAction {
    Init,
    Create,
    Update,
    Delete,
    Rollback,
    Suspend,
    Resume,
    Adopt,
    Snapshot,
    Check,
    Restore,
    Other(String),
}

impl StackAction {
    pub fn as_str(&self) -> &str {
        match self {
            StackAction::Init => "INIT",
            StackAction::Create => "CREATE",
            StackAction::Update => "UPDATE",
            StackAction::Delete => "DELETE",
            StackAction::Rollback => "ROLLBACK",
            StackAction::Suspend => "SUSPEND",
            StackAction::Resume => "RESUME",
            StackAction::Adopt => "ADOPT",
            StackAction::Snapshot => "SNAPSHOT",
            StackAction::Check => "CHECK",
            StackAction::Restore => "RESTORE",
            StackAction::Other(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "INIT" => StackAction::Init,
            "CREATE" => StackAction::Create,
            "UPDATE" => StackAction::Update,
            "DELETE" => StackAction::Delete,
            "ROLLBACK" => StackAction::Rollback,
            "SUSPEND" => StackAction::Suspend,
            "RESUME" => StackAction::Resume,
            "ADOPT" => StackAction::Adopt,
            "SNAPSHOT" => StackAction::Snapshot,
            "CHECK" => StackAction::Check,
            "RESTORE" => StackAction::Restore,
            other => StackAction::Other(other.to_string()),
        }
    }
}

/// Progress half of a Heat status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackState {
    InProgress,
    Complete,
    Failed,
    /// The status string carried no recognised state suffix.
    Unknown,
}

impl StackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StackState::InProgress => "IN_PROGRESS",
            StackState::Complete => "COMPLETE",
            StackState::Failed => "FAILED",
            StackState::Unknown => "",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StackState::Complete | StackState::Failed)
    }
}

/// A parsed `ACTION_STATE` stack status such as `CREATE_IN_PROGRESS`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct StackStatus {
    pub action: StackAction,
    pub state: StackState,
}

impl StackStatus {
    pub fn new(action: StackAction, state: StackState) -> Self {
        Self { action, state }
    }

    /// Parse a wire status string. Unrecognised text is kept verbatim.
    pub fn parse(raw: &str) -> Self {
        const SUFFIXES: [(&str, StackState); 3] = [
            ("_IN_PROGRESS", StackState::InProgress),
            ("_COMPLETE", StackState::Complete),
            ("_FAILED", StackState::Failed),
        ];

        for (suffix, state) in SUFFIXES {
            if let Some(action) = raw.strip_suffix(suffix) {
                return Self::new(StackAction::parse(action), state);
            }
        }

        Self::new(StackAction::Other(raw.to_string()), StackState::Unknown)
    }

    pub fn create_in_progress() -> Self {
        Self::new(StackAction::Create, StackState::InProgress)
    }

    pub fn create_complete() -> Self {
        Self::new(StackAction::Create, StackState::Complete)
    }

    pub fn create_failed() -> Self {
        Self::new(StackAction::Create, StackState::Failed)
    }

    pub fn delete_in_progress() -> Self {
        Self::new(StackAction::Delete, StackState::InProgress)
    }

    pub fn delete_complete() -> Self {
        Self::new(StackAction::Delete, StackState::Complete)
    }

    pub fn delete_failed() -> Self {
        Self::new(StackAction::Delete, StackState::Failed)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_failed(&self) -> bool {
        self.state == StackState::Failed
    }

    pub fn is_complete(&self) -> bool {
        self.state == StackState::Complete
    }

    pub fn is_deleted(&self) -> bool {
        self.action == StackAction::Delete && self.state == StackState::Complete
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            StackState::Unknown => write!(f, "{}", self.action.as_str()),
            state => write!(f, "{}_{}", self.action.as_str(), state.as_str()),
        }
    }
}

impl From<String> for StackStatus {
    fn from(raw: String) -> Self {
        StackStatus::parse(&raw)
    }
}

impl From<StackStatus> for String {
    fn from(status: StackStatus) -> Self {
        status.to_string()
    }
}

/// Read-only view of a stack as reported by the orchestration service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackRecord {
    /// Identifier assigned by Heat
    pub id: String,
    /// Stack name, unique per project
    pub name: String,
    /// Current lifecycle status
    pub status: StackStatus,
    /// Free-form reason text reported with the status
    pub status_reason: String,
    pub creation_time: Option<DateTime<Utc>>,
    pub updated_time: Option<DateTime<Utc>>,
}

impl StackRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: StackStatus) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status,
            status_reason: String::new(),
            creation_time: None,
            updated_time: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.status_reason = reason.into();
        self
    }
}

/// A resource belonging to a stack, possibly inside a nested stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub name: String,
    pub resource_type: String,
    /// Raw status text; may carry free-form phase information
    pub status: String,
    pub status_reason: String,
    pub physical_resource_id: String,
    /// Identifier of the stack that owns this resource
    pub parent_stack_id: Option<String>,
}

impl ResourceRecord {
    pub fn new(
        name: impl Into<String>,
        resource_type: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            status: status.into(),
            status_reason: String::new(),
            physical_resource_id: String::new(),
            parent_stack_id: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.status_reason = reason.into();
        self
    }

    pub fn with_physical_id(mut self, id: impl Into<String>) -> Self {
        self.physical_resource_id = id.into();
        self
    }

    pub fn with_parent(mut self, stack_id: impl Into<String>) -> Self {
        self.parent_stack_id = Some(stack_id.into());
        self
    }
}

/// Diagnostic output of a software deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentDiagnostic {
    pub deployment_id: String,
    pub server_id: String,
    /// `deploy_stderr` output value, empty when the deployment reported none
    pub stderr_output: String,
    pub status: String,
    pub status_reason: String,
}

impl DeploymentDiagnostic {
    pub fn new(deployment_id: impl Into<String>, server_id: impl Into<String>) -> Self {
        Self {
            deployment_id: deployment_id.into(),
            server_id: server_id.into(),
            stderr_output: String::new(),
            status: String::new(),
            status_reason: String::new(),
        }
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr_output = stderr.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>, reason: impl Into<String>) -> Self {
        self.status = status.into();
        self.status_reason = reason.into();
        self
    }
}

/// Body of a stack-create submission.
#[derive(Debug, Clone, Serialize)]
pub struct StackCreate {
    #[serde(rename = "stack_name")]
    pub name: String,
    pub template: serde_json::Value,
    pub environment: serde_json::Value,
    /// Files referenced by the template or environment, keyed by URL
    pub files: BTreeMap<String, String>,
    pub parameters: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_mins: Option<u64>,
    pub disable_rollback: bool,
}

impl StackCreate {
    pub fn new(name: impl Into<String>, template: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            template,
            environment: serde_json::Value::Object(Default::default()),
            files: BTreeMap::new(),
            parameters: BTreeMap::new(),
            timeout_mins: None,
            disable_rollback: true,
        }
    }

    pub fn environment(mut self, environment: serde_json::Value) -> Self {
        self.environment = environment;
        self
    }

    pub fn files(mut self, files: BTreeMap<String, String>) -> Self {
        self.files = files;
        self
    }

    pub fn parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Heat takes whole minutes; round the seconds up.
    pub fn timeout_secs(mut self, seconds: u64) -> Self {
        self.timeout_mins = Some(seconds.div_ceil(60).max(1));
        self
    }
}
