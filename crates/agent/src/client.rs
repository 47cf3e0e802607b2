//! Where an agent gets its work from and where results go.

use anyhow::{bail, Context};
use async_trait::async_trait;
use calc_core::{AgentTask, TaskEnvelope, TaskResult};
use reqwest::StatusCode;
use tracing::debug;

/// Source of ready tasks and sink for their results.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Next ready task, `None` when nothing is queued.
    async fn fetch(&self) -> anyhow::Result<Option<AgentTask>>;

    async fn submit(&self, result: TaskResult) -> anyhow::Result<()>;
}

/// Talks to a calc server over `/internal/task`.
pub struct HttpTaskSource {
    client: reqwest::Client,
    url: String,
}

impl HttpTaskSource {
    /// `server_url` is the server base, e.g. `http://localhost:8080`.
    pub fn new(server_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/internal/task", server_url.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TaskSource for HttpTaskSource {
    async fn fetch(&self) -> anyhow::Result<Option<AgentTask>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("GET {}", self.url))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let envelope: TaskEnvelope = response
                    .json()
                    .await
                    .context("decoding task envelope")?;
                debug!(task_id = %envelope.task.id, "task received");
                Ok(Some(envelope.task))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                bail!("GET {} returned {}: {}", self.url, status, body)
            }
        }
    }

    async fn submit(&self, result: TaskResult) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&result)
            .send()
            .await
            .with_context(|| format!("POST {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("POST {} for task {} returned {}: {}", self.url, result.id, status, body);
        }
        Ok(())
    }
}
