//! Wire models for the execution service.
//!
//! These mirror the JSON the service speaks.  The engine derives its own
//! view models (nodes, connections) from them and never sends them back
//! except through [`WorkflowDefinition`] exports.

use std::collections::BTreeMap;

use nodes::{NodeStatus, StepType};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

// ---------------------------------------------------------------------------
// Workflow definitions
// ---------------------------------------------------------------------------

/// A backend-declared unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub name: String,
    /// Canvas position; absent when the backend has never stored a layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default = "empty_object")]
    pub config: Value,
    /// Ordered successor step ids.
    #[serde(default)]
    pub next_steps: Vec<String>,
}

/// A workflow as owned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Accepts either a JSON string or integer; always held as a string.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: BTreeMap<String, Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_step_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Execution snapshots
// ---------------------------------------------------------------------------

/// Overall state of one execution as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// `pending` is reported before the first step starts.
    #[serde(alias = "pending")]
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The step the service is working on right now.  Only `id` is required;
/// the service sends the full step record, whose extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Outcome of one executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepProgress {
    pub id: String,
    pub status: NodeStatus,
}

/// Point-in-time status of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub execution_id: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub current_step: Option<StepRef>,
    #[serde(default)]
    pub steps_executed: Vec<StepProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ExecutionSnapshot {
    /// `(executed, total)` for a workflow of `total` steps.
    pub fn progress(&self, total: usize) -> (usize, usize) {
        (self.steps_executed.len(), total)
    }
}

// ---------------------------------------------------------------------------
// Request / response envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ExecuteRequest<'a> {
    pub input_data: &'a Value,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteResponse {
    pub execution_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ExecutionEnvelope {
    pub execution: ExecutionSnapshot,
}

/// Entries stay raw so one undecodable workflow cannot hide the others.
#[derive(Debug, Deserialize)]
pub struct WorkflowListEnvelope {
    #[serde(default)]
    pub workflows: Vec<Value>,
}

impl WorkflowListEnvelope {
    /// Decode every entry on its own, skipping (and logging) the ones that
    /// do not match [`WorkflowDefinition`], e.g. steps of an unknown type.
    pub fn into_definitions(self) -> Vec<WorkflowDefinition> {
        self.workflows
            .into_iter()
            .filter_map(|raw| {
                let id = raw.get("id").cloned().unwrap_or(Value::Null);
                match serde_json::from_value(raw) {
                    Ok(workflow) => Some(workflow),
                    Err(err) => {
                        warn!(workflow_id = %id, "skipping workflow: {err}");
                        None
                    }
                }
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct CreateWorkflowRequest<'a> {
    pub name: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowEnvelope {
    pub workflow: WorkflowDefinition,
}

/// Error body shape used by the service: `{"error": "..."}`.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn workflow_with_integer_id_and_sparse_steps() {
        let wf: WorkflowDefinition = serde_json::from_value(json!({
            "id": 7,
            "name": "Docs",
            "steps": {
                "upload": { "id": "upload", "type": "input", "name": "Upload", "next_steps": ["check"] },
                "check":  { "id": "check", "type": "validation", "name": "Check", "x": 10.0, "y": 20.0 }
            }
        }))
        .unwrap();

        assert_eq!(wf.id, "7");
        assert_eq!(wf.description, None);
        assert_eq!(wf.steps["upload"].next_steps, vec!["check"]);
        assert_eq!(wf.steps["upload"].x, None);
        assert_eq!(wf.steps["check"].config, json!({}));
        assert_eq!(wf.steps["check"].x, Some(10.0));
    }

    #[test]
    fn workflow_without_steps_defaults_to_empty() {
        let wf: WorkflowDefinition =
            serde_json::from_value(json!({ "id": "workflow_1", "name": "Blank" })).unwrap();
        assert!(wf.steps.is_empty());
    }

    #[test]
    fn snapshot_tolerates_full_step_records() {
        let snap: ExecutionSnapshot = serde_json::from_value(json!({
            "workflow_id": "wf",
            "execution_id": "exec-1",
            "status": "running",
            "current_step": { "id": "validate", "name": "Validate", "type": "validation", "status": "running" },
            "steps_executed": [
                { "id": "upload", "status": "completed", "type": "input", "duration": 0.4 }
            ],
            "execution_log": []
        }))
        .unwrap();

        assert_eq!(snap.status, ExecutionStatus::Running);
        assert_eq!(snap.current_step.as_ref().map(|s| s.id.as_str()), Some("validate"));
        assert_eq!(snap.steps_executed[0].status, NodeStatus::Completed);
        assert_eq!(snap.progress(4), (1, 4));
    }

    #[test]
    fn unknown_step_type_only_drops_its_own_workflow() {
        let envelope: WorkflowListEnvelope = serde_json::from_value(json!({
            "workflows": [
                {
                    "id": 1,
                    "name": "Docs",
                    "steps": { "upload": { "id": "upload", "type": "input", "name": "Upload" } }
                },
                {
                    "id": 2,
                    "name": "Webhook",
                    "steps": { "call": { "id": "call", "type": "api_call", "name": "Call" } }
                }
            ],
            "total": 2
        }))
        .unwrap();

        let workflows = envelope.into_definitions();
        assert_eq!(workflows.len(), 1);
        assert_eq!(workflows[0].id, "1");
    }

    #[test]
    fn pending_execution_reads_as_running() {
        let snap: ExecutionSnapshot = serde_json::from_value(json!({
            "execution_id": "e", "status": "pending", "current_step": null
        }))
        .unwrap();
        assert_eq!(snap.status, ExecutionStatus::Running);
        assert!(snap.steps_executed.is_empty());
    }
}
