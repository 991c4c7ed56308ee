use super::{DEFAULT_MUTATION_DELAY_MS, DEFAULT_REPO_ENDPOINT, DEFAULT_TICK_INTERVAL_MS};
use crate::core::{ConfigProvider, CounterSync};
use crate::utils::error::Result;
use crate::utils::validation::{validate_provider, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "repo-pulse")]
#[command(about = "Polls a repository record and a local counter through a query cache")]
pub struct CliConfig {
    #[arg(long, default_value = DEFAULT_REPO_ENDPOINT)]
    pub api_endpoint: String,

    #[arg(long, default_value_t = DEFAULT_TICK_INTERVAL_MS)]
    pub tick_interval_ms: u64,

    #[arg(long, default_value_t = DEFAULT_MUTATION_DELAY_MS)]
    pub mutation_delay_ms: u64,

    #[arg(long, help = "Abort repository requests after this many seconds")]
    pub request_timeout_secs: Option<u64>,

    #[arg(long, default_value_t = CounterSync::Invalidate, help = "invalidate | push")]
    pub counter_sync: CounterSync,

    #[arg(long, help = "Serve a fixed preview record instead of calling the API")]
    pub offline: bool,

    #[arg(long, help = "Exit after this many seconds")]
    pub run_for_secs: Option<u64>,

    #[arg(long, value_name = "FILE", help = "Read settings from a TOML file")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_REPO_ENDPOINT.to_string(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            mutation_delay_ms: DEFAULT_MUTATION_DELAY_MS,
            request_timeout_secs: None,
            counter_sync: CounterSync::Invalidate,
            offline: false,
            run_for_secs: None,
            config: None,
            verbose: false,
            json_logs: false,
        }
    }
}

impl ConfigProvider for CliConfig {
    fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }

    fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    fn mutation_delay(&self) -> Duration {
        Duration::from_millis(self.mutation_delay_ms)
    }

    fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    fn counter_sync(&self) -> CounterSync {
        self.counter_sync
    }

    fn offline(&self) -> bool {
        self.offline
    }

    fn run_for(&self) -> Option<Duration> {
        self.run_for_secs.map(Duration::from_secs)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_provider(self)
    }
}
