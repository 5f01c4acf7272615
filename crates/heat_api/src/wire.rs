//! Heat JSON shapes and their mapping to typed records.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::models::{DeploymentDiagnostic, ResourceRecord, StackRecord, StackStatus};

#[derive(Debug, Deserialize)]
pub(crate) struct StackEnvelope {
    pub stack: WireStack,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StackListEnvelope {
    #[serde(default)]
    pub stacks: Vec<WireStack>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedEnvelope {
    pub stack: CreatedStack,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedStack {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResourceListEnvelope {
    #[serde(default)]
    pub resources: Vec<WireResource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeploymentEnvelope {
    pub software_deployment: WireDeployment,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeploymentListEnvelope {
    #[serde(default)]
    pub software_deployments: Vec<WireDeployment>,
}

/// Heat fault body: `{"explanation": ..., "error": {"message": ...}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct FaultBody {
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub error: Option<FaultDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FaultDetail {
    #[serde(default)]
    pub message: Option<String>,
}

/// Best human-readable message from an error response body.
pub(crate) fn fault_message(body: &str) -> String {
    match serde_json::from_str::<FaultBody>(body) {
        Ok(fault) => fault
            .error
            .and_then(|e| e.message)
            .filter(|m| !m.is_empty())
            .or(fault.explanation)
            .unwrap_or_else(|| body.to_string()),
        Err(_) => body.to_string(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireStack {
    pub id: String,
    pub stack_name: String,
    pub stack_status: String,
    #[serde(default)]
    pub stack_status_reason: Option<String>,
    #[serde(default)]
    pub creation_time: Option<String>,
    #[serde(default)]
    pub updated_time: Option<String>,
}

impl From<WireStack> for StackRecord {
    fn from(wire: WireStack) -> Self {
        StackRecord {
            id: wire.id,
            name: wire.stack_name,
            status: StackStatus::parse(&wire.stack_status),
            status_reason: wire.stack_status_reason.unwrap_or_default(),
            creation_time: wire.creation_time.as_deref().and_then(parse_timestamp),
            updated_time: wire.updated_time.as_deref().and_then(parse_timestamp),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireLink {
    pub href: String,
    pub rel: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireResource {
    pub resource_name: String,
    pub resource_type: String,
    pub resource_status: String,
    #[serde(default)]
    pub resource_status_reason: Option<String>,
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub links: Vec<WireLink>,
}

impl From<WireResource> for ResourceRecord {
    fn from(wire: WireResource) -> Self {
        let parent_stack_id = wire
            .links
            .iter()
            .find(|link| link.rel == "stack")
            .and_then(|link| last_path_segment(&link.href));

        ResourceRecord {
            name: wire.resource_name,
            resource_type: wire.resource_type,
            status: wire.resource_status,
            status_reason: wire.resource_status_reason.unwrap_or_default(),
            physical_resource_id: wire.physical_resource_id.unwrap_or_default(),
            parent_stack_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireDeployment {
    pub id: String,
    #[serde(default)]
    pub server_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub status_reason: Option<String>,
    #[serde(default)]
    pub output_values: Option<HashMap<String, serde_json::Value>>,
}

impl From<WireDeployment> for DeploymentDiagnostic {
    fn from(wire: WireDeployment) -> Self {
        let stderr_output = wire
            .output_values
            .as_ref()
            .and_then(|values| values.get("deploy_stderr"))
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_string();

        DeploymentDiagnostic {
            deployment_id: wire.id,
            server_id: wire.server_id.unwrap_or_default(),
            stderr_output,
            status: wire.status.unwrap_or_default(),
            status_reason: wire.status_reason.unwrap_or_default(),
        }
    }
}

fn last_path_segment(href: &str) -> Option<String> {
    href.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Heat emits naive ISO timestamps (`2016-03-01T10:00:00`), sometimes with
/// a zone suffix. Naive values are UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StackAction, StackState};

    #[test]
    fn test_stack_mapping() {
        let body = r#"{
            "stack": {
                "id": "5f0d2a3c",
                "stack_name": "demo",
                "stack_status": "CREATE_FAILED",
                "stack_status_reason": "Resource CREATE failed: timeout",
                "creation_time": "2016-03-01T10:00:00",
                "updated_time": null,
                "links": []
            }
        }"#;

        let envelope: StackEnvelope = serde_json::from_str(body).unwrap();
        let record = StackRecord::from(envelope.stack);

        assert_eq!(record.id, "5f0d2a3c");
        assert_eq!(record.name, "demo");
        assert_eq!(record.status.action, StackAction::Create);
        assert_eq!(record.status.state, StackState::Failed);
        assert_eq!(record.status_reason, "Resource CREATE failed: timeout");
        assert!(record.creation_time.is_some());
        assert!(record.updated_time.is_none());
    }

    #[test]
    fn test_resource_parent_from_stack_link() {
        let body = r#"{
            "resources": [{
                "resource_name": "config_deploy",
                "resource_type": "OS::Heat::SoftwareDeployment",
                "resource_status": "CREATE_FAILED",
                "resource_status_reason": "Error: deployment exited with non-zero status",
                "physical_resource_id": "dep-1",
                "links": [
                    {"href": "http://heat:8004/v1/t/stacks/demo-inner/abc123/resources/config_deploy", "rel": "self"},
                    {"href": "http://heat:8004/v1/t/stacks/demo-inner/abc123", "rel": "stack"}
                ]
            }]
        }"#;

        let envelope: ResourceListEnvelope = serde_json::from_str(body).unwrap();
        let records: Vec<ResourceRecord> = envelope.resources.into_iter().map(Into::into).collect();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].parent_stack_id.as_deref(), Some("abc123"));
        assert_eq!(records[0].physical_resource_id, "dep-1");
    }

    #[test]
    fn test_deployment_stderr_extraction() {
        let body = r#"{
            "software_deployment": {
                "id": "dep-1",
                "server_id": "srv-9",
                "status": "FAILED",
                "status_reason": "deploy_status_code : Deployment exited with non-zero status code: 1",
                "output_values": {"deploy_stderr": "puppet: command not found", "deploy_status_code": 1}
            }
        }"#;

        let envelope: DeploymentEnvelope = serde_json::from_str(body).unwrap();
        let diagnostic = DeploymentDiagnostic::from(envelope.software_deployment);

        assert_eq!(diagnostic.server_id, "srv-9");
        assert_eq!(diagnostic.stderr_output, "puppet: command not found");
        assert_eq!(diagnostic.status, "FAILED");
    }

    #[test]
    fn test_deployment_without_outputs() {
        let body = r#"{"software_deployment": {"id": "dep-2", "output_values": null}}"#;
        let envelope: DeploymentEnvelope = serde_json::from_str(body).unwrap();
        let diagnostic = DeploymentDiagnostic::from(envelope.software_deployment);
        assert!(diagnostic.stderr_output.is_empty());
        assert!(diagnostic.server_id.is_empty());
    }

    #[test]
    fn test_timestamp_formats() {
        assert!(parse_timestamp("2016-03-01T10:00:00").is_some());
        assert!(parse_timestamp("2016-03-01T10:00:00Z").is_some());
        assert!(parse_timestamp("2016-03-01T10:00:00.123456").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_fault_message() {
        let body = r#"{"explanation": "The resource could not be found.", "code": 404,
                       "error": {"message": "The Stack (demo) could not be found.", "type": "EntityNotFound"}}"#;
        assert_eq!(fault_message(body), "The Stack (demo) could not be found.");
        assert_eq!(fault_message("plain text"), "plain text");
    }
}
