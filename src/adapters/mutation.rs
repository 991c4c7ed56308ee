use crate::core::RepoMutator;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_MUTATION_DELAY_MS: u64 = 1000;
pub const DEFAULT_MUTATION_DELAY: Duration = Duration::from_millis(DEFAULT_MUTATION_DELAY_MS);

/// Stand-in for a repository write: waits, then succeeds.
#[derive(Debug, Clone)]
pub struct MutationStub {
    delay: Duration,
}

impl MutationStub {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for MutationStub {
    fn default() -> Self {
        Self::new(DEFAULT_MUTATION_DELAY)
    }
}

#[async_trait]
impl RepoMutator for MutationStub {
    async fn mutate_repo_data(&self) -> Result<()> {
        tracing::debug!("Simulating repository write ({:?})", self.delay);
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}
