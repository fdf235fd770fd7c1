//! Collaborators that feed live printer data into the template context.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::time::Duration;
use tracing::debug;

use crate::models::JobInfo;

/// Source of the printer's current job information.
#[async_trait]
pub trait JobInfoProvider: Send + Sync {
    async fn current_job(&self) -> Result<JobInfo>;
}

/// Source of webcam snapshots (JPEG bytes).
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn snapshot(&self) -> Result<Option<Vec<u8>>>;
}

/// Job information pushed by the host and read on every event.
#[derive(Debug, Default)]
pub struct SharedJobInfo {
    current: RwLock<JobInfo>,
}

impl SharedJobInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, info: JobInfo) {
        *self.current.write() = info;
    }

    pub fn get(&self) -> JobInfo {
        self.current.read().clone()
    }
}

#[async_trait]
impl JobInfoProvider for SharedJobInfo {
    async fn current_job(&self) -> Result<JobInfo> {
        Ok(self.get())
    }
}

/// Fetches a still image from the webcam's snapshot URL.
#[derive(Debug, Clone)]
pub struct HttpSnapshotProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpSnapshotProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SnapshotProvider for HttpSnapshotProvider {
    async fn snapshot(&self) -> Result<Option<Vec<u8>>> {
        debug!(url = %self.url, "Fetching webcam snapshot");
        let response = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;

        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(bytes.to_vec()))
    }
}
