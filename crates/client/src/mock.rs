//! `MockExecutionService`: a scripted test double for [`ExecutionService`].
//!
//! Each call is recorded; status polls pop scripted replies in order and
//! keep returning the last snapshot once the script runs dry.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::{ClientError, ExecutionService, ExecutionSnapshot, WorkflowDefinition};

/// What a scripted call returns.
#[derive(Debug, Clone)]
pub enum MockOutcome<T> {
    /// Succeed with this value.
    Reply(T),
    /// Fail with [`ClientError::AuthRequired`].
    Unauthorized,
    /// Fail with a 503 [`ClientError::Status`].
    Unavailable(String),
}

impl<T: Clone> MockOutcome<T> {
    fn to_result(&self) -> Result<T, ClientError> {
        match self {
            Self::Reply(value) => Ok(value.clone()),
            Self::Unauthorized => Err(ClientError::AuthRequired),
            Self::Unavailable(msg) => Err(ClientError::Status {
                status: 503,
                message: msg.clone(),
            }),
        }
    }
}

/// In-memory execution service driven by a script.
pub struct MockExecutionService {
    workflows: Mutex<Vec<WorkflowDefinition>>,
    execute_outcome: MockOutcome<String>,
    snapshots: Mutex<VecDeque<MockOutcome<ExecutionSnapshot>>>,
    last_snapshot: Mutex<Option<ExecutionSnapshot>>,
    /// Every `(workflow_id, input)` passed to `execute`, in call order.
    pub execute_calls: Arc<Mutex<Vec<(String, Value)>>>,
    /// Every execution id passed to `execution_status`, in call order.
    pub status_calls: Arc<Mutex<Vec<String>>>,
}

impl MockExecutionService {
    fn with_execute(outcome: MockOutcome<String>) -> Self {
        Self {
            workflows: Mutex::new(Vec::new()),
            execute_outcome: outcome,
            snapshots: Mutex::new(VecDeque::new()),
            last_snapshot: Mutex::new(None),
            execute_calls: Arc::new(Mutex::new(Vec::new())),
            status_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A service that accepts every execute call with `execution_id`.
    pub fn accepting(execution_id: impl Into<String>) -> Self {
        Self::with_execute(MockOutcome::Reply(execution_id.into()))
    }

    /// A service whose execute endpoint answers 401.
    pub fn unauthorized() -> Self {
        Self::with_execute(MockOutcome::Unauthorized)
    }

    /// A service whose execute endpoint answers 503 with `msg`.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::with_execute(MockOutcome::Unavailable(msg.into()))
    }

    /// Queue snapshots returned by successive status polls.
    pub fn with_snapshots(self, snapshots: impl IntoIterator<Item = ExecutionSnapshot>) -> Self {
        self.snapshots
            .lock()
            .unwrap()
            .extend(snapshots.into_iter().map(MockOutcome::Reply));
        self
    }

    /// Queue an arbitrary status-poll outcome.
    pub fn then(self, outcome: MockOutcome<ExecutionSnapshot>) -> Self {
        self.snapshots.lock().unwrap().push_back(outcome);
        self
    }

    /// Seed the workflow list.
    pub fn with_workflows(self, workflows: impl IntoIterator<Item = WorkflowDefinition>) -> Self {
        self.workflows.lock().unwrap().extend(workflows);
        self
    }

    /// Number of execute calls seen.
    pub fn execute_count(&self) -> usize {
        self.execute_calls.lock().unwrap().len()
    }

    /// Number of status polls seen.
    pub fn status_count(&self) -> usize {
        self.status_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ExecutionService for MockExecutionService {
    async fn list_workflows(&self) -> Result<Vec<WorkflowDefinition>, ClientError> {
        Ok(self.workflows.lock().unwrap().clone())
    }

    async fn create_workflow(
        &self,
        name: &str,
        description: &str,
    ) -> Result<WorkflowDefinition, ClientError> {
        let mut workflows = self.workflows.lock().unwrap();
        let created = WorkflowDefinition {
            id: format!("workflow_{}", workflows.len() + 1),
            name: name.to_owned(),
            description: Some(description.to_owned()),
            steps: BTreeMap::new(),
            start_step_id: None,
        };
        workflows.push(created.clone());
        Ok(created)
    }

    async fn execute(&self, workflow_id: &str, input: &Value) -> Result<String, ClientError> {
        self.execute_calls
            .lock()
            .unwrap()
            .push((workflow_id.to_owned(), input.clone()));
        self.execute_outcome.to_result()
    }

    async fn execution_status(
        &self,
        execution_id: &str,
    ) -> Result<ExecutionSnapshot, ClientError> {
        self.status_calls.lock().unwrap().push(execution_id.to_owned());

        let next = self.snapshots.lock().unwrap().pop_front();
        match next {
            Some(outcome) => {
                let result = outcome.to_result();
                if let Ok(snapshot) = &result {
                    *self.last_snapshot.lock().unwrap() = Some(snapshot.clone());
                }
                result
            }
            None => self.last_snapshot.lock().unwrap().clone().ok_or_else(|| {
                ClientError::Status {
                    status: 404,
                    message: format!("no scripted snapshot for '{execution_id}'"),
                }
            }),
        }
    }
}
