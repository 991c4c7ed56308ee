use crate::core::{RepoRecord, RepoSource};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Serves a fixed record without touching the network. Used by `--offline`.
#[derive(Debug, Clone)]
pub struct PreviewRepoSource {
    record: RepoRecord,
    latency: Duration,
}

impl PreviewRepoSource {
    pub fn new(record: RepoRecord) -> Self {
        Self {
            record,
            latency: Duration::ZERO,
        }
    }

    /// 模擬網路延遲
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl Default for PreviewRepoSource {
    fn default() -> Self {
        Self::new(RepoRecord {
            name: "react-query".to_string(),
            description: "Hooks for fetching, caching and updating asynchronous data".to_string(),
            subscriber_count: "0".to_string(),
            star_count: "0".to_string(),
            fork_count: "0".to_string(),
        })
    }
}

#[async_trait]
impl RepoSource for PreviewRepoSource {
    async fn fetch_repo_data(&self) -> Result<RepoRecord> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(self.record.clone())
    }
}
