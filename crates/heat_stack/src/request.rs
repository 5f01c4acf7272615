//! Stack requests.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StackError, StackResult};

/// Default time allowed for a lifecycle transition.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// Lifecycle state a stack should converge to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    #[default]
    Present,
    Absent,
}

impl DesiredState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DesiredState::Present => "present",
            DesiredState::Absent => "absent",
        }
    }
}

/// What a caller wants done to one named stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackRequest {
    pub name: String,
    /// Template path or `file://` URI; required for `Present`
    pub template_source: Option<PathBuf>,
    /// Environment files merged in order, later files winning
    pub environment_files: Vec<PathBuf>,
    pub parameters: BTreeMap<String, String>,
    pub timeout: Duration,
    pub desired_state: DesiredState,
    /// Report whether anything would change, without creating or deleting
    #[serde(default)]
    pub check: bool,
}

impl StackRequest {
    pub fn present(name: impl Into<String>, template: impl Into<PathBuf>) -> Self {
        Self::new(name, DesiredState::Present).template(template)
    }

    pub fn absent(name: impl Into<String>) -> Self {
        Self::new(name, DesiredState::Absent)
    }

    pub fn new(name: impl Into<String>, desired_state: DesiredState) -> Self {
        Self {
            name: name.into(),
            template_source: None,
            environment_files: Vec::new(),
            parameters: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
            desired_state,
            check: false,
        }
    }

    pub fn template(mut self, template: impl Into<PathBuf>) -> Self {
        self.template_source = Some(template.into());
        self
    }

    pub fn environment(mut self, file: impl Into<PathBuf>) -> Self {
        self.environment_files.push(file.into());
        self
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn timeout_secs(mut self, seconds: u64) -> Self {
        self.timeout = Duration::from_secs(seconds);
        self
    }

    pub fn check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    pub fn validate(&self) -> StackResult<()> {
        if self.name.trim().is_empty() {
            return Err(StackError::Validation("stack name is required".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(StackError::Validation(
                "timeout must be a positive number of seconds".to_string(),
            ));
        }
        if self.desired_state == DesiredState::Present && self.template_source.is_none() {
            return Err(StackError::Validation(
                "template required with present state".to_string(),
            ));
        }
        Ok(())
    }
}
