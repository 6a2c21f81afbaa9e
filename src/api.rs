use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("workflow api request failed: {0}")]
    Request(String),
    #[error("workflow api response could not be decoded: {0}")]
    Decode(String),
}

/// Lifecycle state reported by the remote workflow for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    WaitingForInput,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "RUNNING"),
            RunStatus::WaitingForInput => write!(f, "WAITING_FOR_INPUT"),
            RunStatus::Completed => write!(f, "COMPLETED"),
            RunStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// One reported state of a run at a point in time. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub conversation_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub timestamp: String,
}

impl StatusSnapshot {
    /// Remote-reported failures carry their detail in `error`; prefer it
    /// over the generic `message` when rendering a FAILED snapshot.
    pub fn display_message(&self) -> &str {
        if self.status == RunStatus::Failed {
            if let Some(error) = self.error.as_deref() {
                if !error.trim().is_empty() {
                    return error;
                }
            }
        }
        &self.message
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartWorkflowRequest {
    pub requirement: String,
    pub repository_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs_pasted: Option<String>,
}

/// Blocking HTTP client for the remote workflow orchestrator.
#[derive(Debug, Clone)]
pub struct WorkflowClient {
    api_base: String,
}

impl WorkflowClient {
    pub fn new(api_base: &str) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ApiError> {
        let response = ureq::get(&self.endpoint(path))
            .call()
            .map_err(|e| ApiError::Request(e.to_string()))?;
        response
            .into_json::<T>()
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn post_json<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Request(e.to_string()))?;
        let response = ureq::post(&self.endpoint(path))
            .send_json(body)
            .map_err(|e| ApiError::Request(e.to_string()))?;
        response
            .into_json::<T>()
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Start a new workflow run from an initial operator request.
    pub fn start(&self, request: &StartWorkflowRequest) -> Result<StatusSnapshot, ApiError> {
        self.post_json("workflows/start", request)
    }

    /// Fetch the current status of an in-flight run.
    pub fn status(&self, conversation_id: &str) -> Result<StatusSnapshot, ApiError> {
        let path = format!("workflows/{}/status", urlencoding::encode(conversation_id));
        self.get_json(&path)
    }

    /// Deliver an operator response to a run waiting for input.
    pub fn respond(&self, conversation_id: &str, text: &str) -> Result<StatusSnapshot, ApiError> {
        let path = format!("workflows/{}/respond", urlencoding::encode(conversation_id));
        self.post_json(&path, &json!({ "response": text }))
    }
}
