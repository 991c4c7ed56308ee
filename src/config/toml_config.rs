use super::{DEFAULT_MUTATION_DELAY_MS, DEFAULT_REPO_ENDPOINT, DEFAULT_TICK_INTERVAL_MS};
use crate::core::{ConfigProvider, CounterSync};
use crate::utils::error::{PulseError, Result};
use crate::utils::validation::{validate_provider, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub counter: CounterConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub mutation: MutationConfig,
    pub runtime: Option<RuntimeConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CounterConfig {
    pub tick_interval_ms: Option<u64>,
    pub sync: Option<CounterSync>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub offline: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MutationConfig {
    pub delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub run_for_secs: Option<u64>,
}

impl TomlConfig {
    /// 從檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| PulseError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${API_HOST})，找不到的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| PulseError::ConfigError {
            message: format!("Invalid placeholder pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

impl ConfigProvider for TomlConfig {
    fn api_endpoint(&self) -> &str {
        self.source.endpoint.as_deref().unwrap_or(DEFAULT_REPO_ENDPOINT)
    }

    fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.counter.tick_interval_ms.unwrap_or(DEFAULT_TICK_INTERVAL_MS))
    }

    fn mutation_delay(&self) -> Duration {
        Duration::from_millis(self.mutation.delay_ms.unwrap_or(DEFAULT_MUTATION_DELAY_MS))
    }

    fn request_timeout(&self) -> Option<Duration> {
        self.source.timeout_seconds.map(Duration::from_secs)
    }

    fn counter_sync(&self) -> CounterSync {
        self.counter.sync.unwrap_or_default()
    }

    fn offline(&self) -> bool {
        self.source.offline.unwrap_or(false)
    }

    fn run_for(&self) -> Option<Duration> {
        self.runtime
            .as_ref()
            .and_then(|runtime| runtime.run_for_secs)
            .map(Duration::from_secs)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.source.endpoint {
            if endpoint.contains("${") && !self.offline() {
                return Err(PulseError::ConfigValidationError {
                    field: "source.endpoint".to_string(),
                    message: format!("Unresolved environment variable in '{}'", endpoint),
                });
            }
        }
        validate_provider(self)
    }
}
