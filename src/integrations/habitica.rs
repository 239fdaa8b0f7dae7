use crate::config::{HabiticaConfig, HttpConfig};
use crate::error::SyncError;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const HABITICA_API: &str = "https://habitica.com/api/v3";

/// Thin client over the Habitica v3 REST API. Auth is two custom headers;
/// every call expects a 2xx status and fails the run otherwise.
pub struct HabiticaClient {
    client: Client,
    base_url: String,
    user_id: String,
    api_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HabiticaTodo {
    pub id: String,
    pub text: String,
    /// Correlation key: the RTM task id stored on the Habitica task.
    /// At most one Habitica task carries a given alias.
    #[serde(default)]
    pub alias: Option<String>,
}

/// A creation record for the batch-create call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTodo {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub alias: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl NewTodo {
    pub fn todo(text: &str, alias: &str, date: Option<String>) -> Self {
        Self {
            text: text.to_string(),
            kind: "todo".to_string(),
            alias: alias.to_string(),
            date,
        }
    }
}

#[derive(Deserialize)]
struct TodosResponse {
    #[serde(default)]
    data: Vec<HabiticaTodo>,
}

impl HabiticaClient {
    pub fn new(config: &HabiticaConfig, http: &HttpConfig) -> Result<Self, SyncError> {
        Self::with_base_url(config, http, HABITICA_API)
    }

    pub fn with_base_url(
        config: &HabiticaConfig,
        http: &HttpConfig,
        base_url: &str,
    ) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(http.timeout_seconds.max(5)))
            .build()
            .map_err(|e| SyncError::Request(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: config.user_id.clone(),
            api_token: config.api_token.clone(),
        })
    }

    pub fn open_todos(&self) -> Result<Vec<HabiticaTodo>, SyncError> {
        self.todos("todos")
    }

    pub fn completed_todos(&self) -> Result<Vec<HabiticaTodo>, SyncError> {
        self.todos("completedTodos")
    }

    fn todos(&self, kind: &str) -> Result<Vec<HabiticaTodo>, SyncError> {
        let url = format!("{}/tasks/user", self.base_url);
        let resp = self
            .client
            .get(url)
            .header("x-api-user", &self.user_id)
            .header("x-api-key", &self.api_token)
            .query(&[("type", kind)])
            .send()
            .map_err(|e| SyncError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(SyncError::Request(format!(
                "Habitica task list ({kind}) failed: HTTP {}",
                resp.status()
            )));
        }
        let body: TodosResponse = resp
            .json()
            .map_err(|e| SyncError::Api(format!("malformed Habitica task list: {e}")))?;
        Ok(body.data)
    }

    /// One batch call carrying all new-task records.
    pub fn create_todos(&self, todos: &[NewTodo]) -> Result<(), SyncError> {
        let url = format!("{}/tasks/user", self.base_url);
        let resp = self
            .client
            .post(url)
            .header("x-api-user", &self.user_id)
            .header("x-api-key", &self.api_token)
            .json(todos)
            .send()
            .map_err(|e| SyncError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(SyncError::Request(format!(
                "Habitica task create failed: HTTP {}",
                resp.status()
            )));
        }
        Ok(())
    }

    /// Marks the to-do with the given alias complete by scoring it up.
    pub fn score_up(&self, alias: &str) -> Result<(), SyncError> {
        let url = format!("{}/tasks/{}/score/up", self.base_url, alias);
        let resp = self
            .client
            .post(url)
            .header("x-api-user", &self.user_id)
            .header("x-api-key", &self.api_token)
            .send()
            .map_err(|e| SyncError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(SyncError::Request(format!(
                "Habitica score-up for {alias} failed: HTTP {}",
                resp.status()
            )));
        }
        Ok(())
    }
}
