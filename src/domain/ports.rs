use crate::domain::model::{CounterSync, RepoRecord};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Read side: where repository records come from.
#[async_trait]
pub trait RepoSource: Send + Sync {
    async fn fetch_repo_data(&self) -> Result<RepoRecord>;
}

/// Write side. Implementations decide their own idempotence.
#[async_trait]
pub trait RepoMutator: Send + Sync {
    async fn mutate_repo_data(&self) -> Result<()>;
}

pub trait ConfigProvider: Send + Sync {
    fn api_endpoint(&self) -> &str;
    fn tick_interval(&self) -> Duration;
    fn mutation_delay(&self) -> Duration;
    fn request_timeout(&self) -> Option<Duration>;
    fn counter_sync(&self) -> CounterSync;
    fn offline(&self) -> bool;
    fn run_for(&self) -> Option<Duration>;
}
