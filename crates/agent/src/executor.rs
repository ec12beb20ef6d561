use std::time::Duration;

use async_trait::async_trait;
use huddle_core::{
    domain::routing::ExecutionContext,
    services::{ExecutorError, TaskExecutor, TaskOutcome},
};
use serde::Serialize;
use tracing::debug;

/// Local executor that acknowledges the task without interpreting it.
#[derive(Clone, Debug, Default)]
pub struct EchoTaskExecutor;

#[async_trait]
impl TaskExecutor for EchoTaskExecutor {
    async fn execute(
        &self,
        _team_id: &str,
        task: &str,
        context: &ExecutionContext,
    ) -> Result<TaskOutcome, ExecutorError> {
        let mode = if context.requires_enhancement { "interpreted" } else { "command" };
        Ok(TaskOutcome::reply(format!("received ({mode}, {}): {task}", context.flow_type.as_str())))
    }
}

#[derive(Serialize)]
struct TaskRequest<'a> {
    team_id: &'a str,
    task: &'a str,
    context: &'a ExecutionContext,
}

/// JSON client for a remote task executor (`POST {base_url}/tasks`).
#[derive(Clone, Debug)]
pub struct HttpTaskExecutor {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTaskExecutor {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ExecutorError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ExecutorError::Transport(format!(
                "executor base url `{base_url}` must start with http:// or https://"
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("huddle/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| ExecutorError::Transport(error.to_string()))?;

        Ok(Self { http, base_url })
    }

    pub fn tasks_url(&self) -> String {
        format!("{}/tasks", self.base_url)
    }
}

#[async_trait]
impl TaskExecutor for HttpTaskExecutor {
    async fn execute(
        &self,
        team_id: &str,
        task: &str,
        context: &ExecutionContext,
    ) -> Result<TaskOutcome, ExecutorError> {
        let response = self
            .http
            .post(self.tasks_url())
            .json(&TaskRequest { team_id, task, context })
            .send()
            .await
            .map_err(|error| ExecutorError::Transport(error.to_string()))?;

        let status = response.status();
        debug!(
            event_name = "executor.http.response",
            status = status.as_u16(),
            team_id,
            "task executor responded"
        );
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ExecutorError::Rejected { status: status.as_u16(), message });
        }

        response
            .json::<TaskOutcome>()
            .await
            .map_err(|error| ExecutorError::InvalidResponse(error.to_string()))
    }
}
