#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use toml_config::TomlConfig;

pub use crate::adapters::github::DEFAULT_REPO_ENDPOINT;
pub use crate::adapters::mutation::DEFAULT_MUTATION_DELAY_MS;
pub use crate::core::counter::DEFAULT_TICK_INTERVAL_MS;
