//! Progress backend seam and its implementations.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;
use url::Url;

use crate::error::BackendError;
use crate::records::{CompletionRecord, ProgressRecord};

/// Receiver of pushed records. Implementations must tolerate records
/// arriving out of order; `sequence` decides which one is newest.
#[async_trait]
pub trait ProgressBackend: Send + Sync {
    async fn push_progress(&self, record: &ProgressRecord) -> Result<(), BackendError>;
    async fn push_completion(&self, record: &CompletionRecord) -> Result<(), BackendError>;
}

/// Posts records as JSON to `{endpoint}/progress` and `{endpoint}/completion`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    progress_url: Url,
    completion_url: Url,
}

impl HttpBackend {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, BackendError> {
        let base = if endpoint.ends_with('/') {
            endpoint.to_string()
        } else {
            format!("{}/", endpoint)
        };
        let parse_error = |source| BackendError::Endpoint {
            endpoint: endpoint.to_string(),
            source,
        };
        let base = Url::parse(&base).map_err(parse_error)?;
        let progress_url = base.join("progress").map_err(parse_error)?;
        let completion_url = base.join("completion").map_err(parse_error)?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::Client)?;

        Ok(Self {
            client,
            progress_url,
            completion_url,
        })
    }

    pub fn progress_url(&self) -> &Url {
        &self.progress_url
    }

    pub fn completion_url(&self) -> &Url {
        &self.completion_url
    }

    async fn post<T: serde::Serialize + Sync>(&self, url: &Url, body: &T) -> Result<(), BackendError> {
        let response = self
            .client
            .post(url.clone())
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|source| BackendError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressBackend for HttpBackend {
    async fn push_progress(&self, record: &ProgressRecord) -> Result<(), BackendError> {
        self.post(&self.progress_url, record).await
    }

    async fn push_completion(&self, record: &CompletionRecord) -> Result<(), BackendError> {
        self.post(&self.completion_url, record).await
    }
}

/// Backend that only logs, for offline runs and the harness.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingBackend;

#[async_trait]
impl ProgressBackend for LoggingBackend {
    async fn push_progress(&self, record: &ProgressRecord) -> Result<(), BackendError> {
        info!(
            launch_id = %record.launch_id,
            sequence = record.sequence,
            completion = %record.completion_status,
            success = %record.success_status,
            "progress record"
        );
        Ok(())
    }

    async fn push_completion(&self, record: &CompletionRecord) -> Result<(), BackendError> {
        info!(
            launch_id = %record.launch_id,
            sequence = record.sequence,
            completed = record.completed,
            final_score = ?record.final_score,
            "completion record"
        );
        Ok(())
    }
}
