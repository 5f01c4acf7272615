//! CLI argument definitions.
//!
//! heatctl takes one flat set of flags; `--state` picks what to do with the
//! named stack. Each state maps to a module exposing `execute`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, ValueEnum};
use tracing::debug;

use heat_api::config::DEFAULT_AUTH_URL;
use heat_api::{
    load_cloud, Credentials, EndpointInterface, KeystoneSession, OrchestrationClient,
    SessionProvider,
};
use heat_stack::{
    DesiredState, FailureMatch, ReconcilerConfig, StackError, StackRequest,
    DEFAULT_MAX_NESTED_DEPTH,
};

pub mod debug;
pub mod ensure;
pub mod list;
pub mod show;

/// heatctl - converge and debug OpenStack Heat stacks
#[derive(Parser, Debug)]
#[command(name = "heatctl")]
#[command(version, about = "heatctl - converge and debug OpenStack Heat stacks")]
#[command(long_about = r#"
heatctl drives a named Heat stack to a desired state and reports why a
stack failed. One JSON result record is written to stdout; logs go to
stderr.

STATES:
  present  → Create the stack from --template unless it already exists
  absent   → Delete the stack if it exists and wait until it is gone
             (with --check, present/absent only report "changed")
  list     → List stacks visible to the project
  show     → Show one stack
  debug    → Report failed resources and software-deployment output

EXIT CODES:
  0   - Success
  1   - General error
  2   - Invalid arguments
  3   - Authentication or endpoint failure
  4   - Stack reached a failed state
  5   - Timed out
  6   - Conflicting lifecycle operation
  130 - Cancelled
"#)]
pub struct Cli {
    /// Stack name (required except with --state list)
    #[arg(long)]
    pub name: Option<String>,

    /// Template file or file:// URI
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Environment file; repeat to merge several, later files win
    #[arg(long = "environment", short = 'e')]
    pub environment: Vec<PathBuf>,

    /// Template parameter as KEY=VALUE; may be repeated
    #[arg(long = "parameter", short = 'P', value_parser = parse_parameter)]
    pub parameters: Vec<(String, String)>,

    /// What to do with the stack
    #[arg(long, value_enum, default_value_t = StateArg::Present)]
    pub state: StateArg,

    /// Only report whether present/absent would change the stack
    #[arg(long)]
    pub check: bool,

    /// Seconds to wait for a create or delete to finish
    #[arg(long, default_value_t = 180)]
    pub timeout: u64,

    /// Seconds between status polls
    #[arg(long, default_value_t = 5)]
    pub poll_interval: u64,

    /// Nested-stack depth searched for failed resources
    #[arg(long, default_value_t = DEFAULT_MAX_NESTED_DEPTH)]
    pub max_nested_depth: u32,

    /// Failure policy: contains[:TOKEN], suffix[:TOKEN], exact:A,B or pattern:REGEX
    #[arg(long, default_value = "contains:FAILED")]
    pub failure_match: FailureMatch,

    #[command(flatten)]
    pub auth: AuthArgs,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateArg {
    Present,
    Absent,
    List,
    Show,
    Debug,
}

impl StateArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateArg::Present => "present",
            StateArg::Absent => "absent",
            StateArg::List => "list",
            StateArg::Show => "show",
            StateArg::Debug => "debug",
        }
    }
}

/// Credential flags. Each falls back to the usual `OS_*` variable.
#[derive(Args, Debug, Default)]
pub struct AuthArgs {
    /// Named cloud from clouds.yaml
    #[arg(long, env = "OS_CLOUD")]
    pub cloud: Option<String>,

    /// Explicit clouds.yaml path
    #[arg(long)]
    pub clouds_file: Option<PathBuf>,

    #[arg(long, env = "OS_USERNAME")]
    pub os_username: Option<String>,

    #[arg(long, env = "OS_PASSWORD", hide_env_values = true)]
    pub os_password: Option<String>,

    #[arg(long, env = "OS_PROJECT_NAME")]
    pub os_project_name: Option<String>,

    /// Identity v2.0 name for the project
    #[arg(long, env = "OS_TENANT_NAME")]
    pub os_tenant_name: Option<String>,

    #[arg(long, env = "OS_AUTH_URL")]
    pub os_auth_url: Option<String>,

    #[arg(long, env = "OS_REGION_NAME")]
    pub os_region_name: Option<String>,

    #[arg(long, env = "OS_USER_DOMAIN_NAME")]
    pub os_user_domain_name: Option<String>,

    #[arg(long, env = "OS_PROJECT_DOMAIN_NAME")]
    pub os_project_domain_name: Option<String>,

    /// Catalog interface: public, internal or admin
    #[arg(long, env = "OS_INTERFACE")]
    pub os_interface: Option<String>,
}

impl AuthArgs {
    /// Build credentials from clouds.yaml (if `--cloud` is given) overlaid
    /// with any explicit flags.
    pub fn credentials(&self) -> Result<Credentials> {
        let mut credentials = match &self.cloud {
            Some(cloud) => load_cloud(cloud, self.clouds_file.as_deref())
                .with_context(|| format!("loading cloud '{}'", cloud))?,
            None => Credentials::new("", "", "", DEFAULT_AUTH_URL),
        };

        if let Some(username) = &self.os_username {
            credentials.username = username.clone();
        }
        if let Some(password) = &self.os_password {
            credentials.password = password.clone();
        }
        if let Some(project) = self.os_project_name.as_ref().or(self.os_tenant_name.as_ref()) {
            credentials.project_name = project.clone();
        }
        if let Some(auth_url) = &self.os_auth_url {
            credentials.auth_url = auth_url.clone();
        }
        if let Some(region) = &self.os_region_name {
            credentials.region_name = Some(region.clone());
        }
        if let Some(domain) = &self.os_user_domain_name {
            credentials.user_domain_name = domain.clone();
        }
        if let Some(domain) = &self.os_project_domain_name {
            credentials.project_domain_name = domain.clone();
        }
        if let Some(interface) = &self.os_interface {
            credentials.interface = EndpointInterface::parse(interface).ok_or_else(|| {
                StackError::Validation(format!("unknown endpoint interface '{}'", interface))
            })?;
        }

        credentials.validate().map_err(StackError::from)?;
        Ok(credentials)
    }

    /// Authenticate and hand back an orchestration client.
    pub async fn connect(&self) -> Result<Arc<dyn OrchestrationClient>> {
        let credentials = self.credentials()?;
        debug!("Authenticating as {:?}", credentials);

        let client = KeystoneSession::new()
            .authenticate(&credentials)
            .await
            .map_err(StackError::from)?;
        debug!("Using orchestration endpoint {}", client.endpoint());
        Ok(Arc::new(client))
    }
}

impl Cli {
    /// Stack name, which every state except `list` needs.
    pub fn stack_name(&self) -> Result<&str> {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(StackError::Validation(format!(
                "--name is required with {} state",
                self.state.as_str()
            ))
            .into()),
        }
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig::default()
            .poll_interval(Duration::from_secs(self.poll_interval.max(1)))
            .max_nested_depth(self.max_nested_depth)
            .failure_match(self.failure_match.clone())
    }

    /// Translate present/absent flags into a stack request.
    pub fn stack_request(&self, desired_state: DesiredState) -> Result<StackRequest> {
        let mut request = StackRequest::new(self.stack_name()?, desired_state).timeout_secs(self.timeout);
        request.template_source = self.template.clone();
        request.environment_files = self.environment.clone();
        request.parameters = self.parameters.iter().cloned().collect();
        request.check = self.check;
        request.validate()?;
        Ok(request)
    }
}

fn parse_parameter(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}
