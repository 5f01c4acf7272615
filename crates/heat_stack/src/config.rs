//! Reconciler configuration and failure-matching policy.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use heat_api::RetryPolicy;
use regex::Regex;

use crate::error::StackError;

/// Default wait between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Nested-stack depth the failure walk asks the API to descend.
pub const DEFAULT_MAX_NESTED_DEPTH: u32 = 5;

/// Status token treated as failure by default.
pub const FAILED_TOKEN: &str = "FAILED";

/// How a resource status string is judged to be a failure.
///
/// Heat embeds free-form phase text in resource status, so the default is
/// a substring match on `FAILED`; stricter policies are opt-in.
#[derive(Debug, Clone)]
pub enum FailureMatch {
    /// Status contains the token anywhere.
    Contains(String),
    /// Status ends with the token.
    Suffix(String),
    /// Status equals one of the listed values.
    Exact(BTreeSet<String>),
    /// Status matches the regular expression.
    Pattern(Regex),
}

impl Default for FailureMatch {
    fn default() -> Self {
        FailureMatch::Contains(FAILED_TOKEN.to_string())
    }
}

impl FailureMatch {
    pub fn matches(&self, status: &str) -> bool {
        match self {
            FailureMatch::Contains(token) => status.contains(token.as_str()),
            FailureMatch::Suffix(token) => status.ends_with(token.as_str()),
            FailureMatch::Exact(values) => values.contains(status),
            FailureMatch::Pattern(re) => re.is_match(status),
        }
    }
}

impl fmt::Display for FailureMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureMatch::Contains(token) => write!(f, "contains:{}", token),
            FailureMatch::Suffix(token) => write!(f, "suffix:{}", token),
            FailureMatch::Exact(values) => {
                let values: Vec<&str> = values.iter().map(String::as_str).collect();
                write!(f, "exact:{}", values.join(","))
            }
            FailureMatch::Pattern(re) => write!(f, "pattern:{}", re.as_str()),
        }
    }
}

/// Parses `contains[:TOKEN]`, `suffix[:TOKEN]`, `exact:A,B` or `pattern:REGEX`.
impl FromStr for FailureMatch {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, arg) = match s.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (s, None),
        };
        let token = || arg.filter(|a| !a.is_empty()).unwrap_or(FAILED_TOKEN).to_string();

        match kind {
            "contains" => Ok(FailureMatch::Contains(token())),
            "suffix" => Ok(FailureMatch::Suffix(token())),
            "exact" => {
                let values: BTreeSet<String> = arg
                    .unwrap_or_default()
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect();
                if values.is_empty() {
                    return Err(StackError::Validation(
                        "exact failure match needs at least one status".to_string(),
                    ));
                }
                Ok(FailureMatch::Exact(values))
            }
            "pattern" => {
                let re = Regex::new(arg.unwrap_or_default())
                    .map_err(|e| StackError::Validation(format!("invalid failure pattern: {}", e)))?;
                Ok(FailureMatch::Pattern(re))
            }
            other => Err(StackError::Validation(format!(
                "unknown failure match policy '{}'",
                other
            ))),
        }
    }
}

/// Tunables shared by the reconciler and the inspector.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Wait between status polls
    pub poll_interval: Duration,
    /// Depth bound for the nested failure walk
    pub max_nested_depth: u32,
    /// Policy deciding which resource statuses count as failed
    pub failure_match: FailureMatch,
    /// Backoff for idempotent reads
    pub read_retry: RetryPolicy,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_nested_depth: DEFAULT_MAX_NESTED_DEPTH,
            failure_match: FailureMatch::default(),
            read_retry: RetryPolicy::default(),
        }
    }
}

impl ReconcilerConfig {
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn max_nested_depth(mut self, depth: u32) -> Self {
        self.max_nested_depth = depth;
        self
    }

    pub fn failure_match(mut self, policy: FailureMatch) -> Self {
        self.failure_match = policy;
        self
    }

    pub fn read_retry(mut self, policy: RetryPolicy) -> Self {
        self.read_retry = policy;
        self
    }
}
