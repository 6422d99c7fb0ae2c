//! The `ExecutionService` trait: everything the engine needs from the backend.

use async_trait::async_trait;
use serde_json::Value;

use crate::{ClientError, ExecutionSnapshot, WorkflowDefinition};

/// Remote workflow store and executor.
///
/// Implementations must be cheap to share: the engine holds one behind an
/// `Arc` and calls it from spawned tasks.
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// `GET /workflows`
    async fn list_workflows(&self) -> Result<Vec<WorkflowDefinition>, ClientError>;

    /// `POST /workflows`
    async fn create_workflow(
        &self,
        name: &str,
        description: &str,
    ) -> Result<WorkflowDefinition, ClientError>;

    /// `POST /workflows/{id}/execute`; returns the new execution id.
    async fn execute(&self, workflow_id: &str, input: &Value) -> Result<String, ClientError>;

    /// `GET /workflows/executions/{execution_id}`
    async fn execution_status(&self, execution_id: &str)
        -> Result<ExecutionSnapshot, ClientError>;
}
