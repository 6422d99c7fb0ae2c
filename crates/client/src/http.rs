//! reqwest-backed [`ExecutionService`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::models::{
    CreateWorkflowRequest, ErrorBody, ExecuteRequest, ExecuteResponse, ExecutionEnvelope,
    WorkflowEnvelope, WorkflowListEnvelope,
};
use crate::{ClientError, ExecutionService, ExecutionSnapshot, WorkflowDefinition};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection settings for the execution service.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service root including any path prefix, e.g. `http://localhost:5000/api`.
    pub base_url: String,
    /// Bearer credential supplied by the auth layer.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

// ---------------------------------------------------------------------------
// HttpExecutionService
// ---------------------------------------------------------------------------

/// Talks to the execution service over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpExecutionService {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpExecutionService {
    /// Build a client from `config`.
    ///
    /// # Errors
    /// Returns [`ClientError::Http`] if the underlying HTTP client cannot be
    /// constructed (e.g. TLS backend initialisation fails).
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            token: config.token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

/// Map a response onto `T`, translating 401 and other failures.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        warn!("execution service rejected the credential");
        return Err(ClientError::AuthRequired);
    }

    let body = response.bytes().await?;
    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
        return Err(ClientError::Status {
            status: status.as_u16(),
            message,
        });
    }

    Ok(serde_json::from_slice(&body)?)
}

#[async_trait]
impl ExecutionService for HttpExecutionService {
    #[instrument(skip(self))]
    async fn list_workflows(&self) -> Result<Vec<WorkflowDefinition>, ClientError> {
        let response = self.request(Method::GET, "/workflows").send().await?;
        let envelope: WorkflowListEnvelope = decode(response).await?;
        let listed = envelope.workflows.len();
        let workflows = envelope.into_definitions();
        debug!("fetched {} of {listed} workflows", workflows.len());
        Ok(workflows)
    }

    #[instrument(skip(self, description))]
    async fn create_workflow(
        &self,
        name: &str,
        description: &str,
    ) -> Result<WorkflowDefinition, ClientError> {
        let response = self
            .request(Method::POST, "/workflows")
            .json(&CreateWorkflowRequest { name, description })
            .send()
            .await?;
        let envelope: WorkflowEnvelope = decode(response).await?;
        Ok(envelope.workflow)
    }

    #[instrument(skip(self, input))]
    async fn execute(&self, workflow_id: &str, input: &Value) -> Result<String, ClientError> {
        let response = self
            .request(Method::POST, &format!("/workflows/{workflow_id}/execute"))
            .json(&ExecuteRequest { input_data: input })
            .send()
            .await?;
        let accepted: ExecuteResponse = decode(response).await?;
        debug!("execution '{}' accepted", accepted.execution_id);
        Ok(accepted.execution_id)
    }

    #[instrument(skip(self))]
    async fn execution_status(
        &self,
        execution_id: &str,
    ) -> Result<ExecutionSnapshot, ClientError> {
        let response = self
            .request(Method::GET, &format!("/workflows/executions/{execution_id}"))
            .send()
            .await?;
        let envelope: ExecutionEnvelope = decode(response).await?;
        Ok(envelope.execution)
    }
}
