//! REST access to the task backend.

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::task::{Task, TaskCreate, TaskId, TaskPatch, TaskStatus};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The five backend calls the board relies on.
///
/// Each call is a single attempt; implementations do not retry or cache.
#[allow(async_fn_in_trait)]
pub trait TaskGateway {
    async fn list_tasks(&self) -> Result<Vec<Task>, GatewayError>;

    async fn create_task(&self, payload: &TaskCreate) -> Result<Task, GatewayError>;

    async fn update_status(&self, id: TaskId, status: TaskStatus) -> Result<Task, GatewayError>;

    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, GatewayError>;

    async fn delete_task(&self, id: TaskId) -> Result<(), GatewayError>;
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: TaskStatus,
}

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), body = %body, "backend rejected request");
        Err(GatewayError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

impl TaskGateway for HttpGateway {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn list_tasks(&self) -> Result<Vec<Task>, GatewayError> {
        let response = self.client.get(self.url("/tasks/")).send().await?;
        let tasks: Vec<Task> = Self::parse_response(response).await?;
        debug!(count = tasks.len(), "listed tasks");
        Ok(tasks)
    }

    #[instrument(skip(self, payload), fields(title_len = payload.title.len()))]
    async fn create_task(&self, payload: &TaskCreate) -> Result<Task, GatewayError> {
        let response = self
            .client
            .post(self.url("/tasks/"))
            .json(payload)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    #[instrument(skip(self), fields(task_id = id, status = %status))]
    async fn update_status(&self, id: TaskId, status: TaskStatus) -> Result<Task, GatewayError> {
        let response = self
            .client
            .patch(self.url(&format!("/tasks/{id}/status")))
            .json(&StatusBody { status })
            .send()
            .await?;
        Self::parse_response(response).await
    }

    #[instrument(skip(self, patch), fields(task_id = id))]
    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, GatewayError> {
        let response = self
            .client
            .patch(self.url(&format!("/tasks/{id}")))
            .json(patch)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    #[instrument(skip(self), fields(task_id = id))]
    async fn delete_task(&self, id: TaskId) -> Result<(), GatewayError> {
        let response = self
            .client
            .delete(self.url(&format!("/tasks/{id}")))
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }
}
