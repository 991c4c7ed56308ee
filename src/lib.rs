pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;
pub use crate::config::TomlConfig;

pub use crate::adapters::{HttpRepoSource, MutationStub, PreviewRepoSource};
pub use crate::app::dashboard::{Dashboard, DashboardSnapshot, COUNTER_KEY, REPO_DATA_KEY};
pub use crate::core::{counter::CounterService, query_client::QueryClient};
pub use crate::domain::model::{CounterSync, RepoRecord};
pub use crate::utils::error::{PulseError, Result};
