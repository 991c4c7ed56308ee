use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Network request failed: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {status} for {url}")]
    HttpStatusError { status: u16, url: String },

    #[error("Response decoding failed: {0}")]
    DecodeError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("No query registered under key '{key}'")]
    UnknownQueryError { key: String },

    #[error("No mutation registered under key '{key}'")]
    UnknownMutationError { key: String },

    #[error("Counter service was released; no value for '{key}'")]
    CounterReleasedError { key: String },

    #[error("Query '{key}' failed: {source}")]
    QueryFailed {
        key: String,
        #[source]
        source: Arc<PulseError>,
    },

    #[error("Mutation '{key}' failed: {source}")]
    MutationFailed {
        key: String,
        #[source]
        source: Arc<PulseError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Configuration,
    Cache,
    System,
}

impl PulseError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PulseError::NetworkError(_) | PulseError::HttpStatusError { .. } => {
                ErrorCategory::Network
            }
            PulseError::DecodeError(_) => ErrorCategory::Data,
            PulseError::IoError(_) => ErrorCategory::System,
            PulseError::ConfigError { .. }
            | PulseError::InvalidConfigValueError { .. }
            | PulseError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            PulseError::UnknownQueryError { .. }
            | PulseError::UnknownMutationError { .. }
            | PulseError::CounterReleasedError { .. } => ErrorCategory::Cache,
            // 包裝過的錯誤沿用原始錯誤的分類
            PulseError::QueryFailed { source, .. } | PulseError::MutationFailed { source, .. } => {
                source.category()
            }
        }
    }

    pub fn is_network_error(&self) -> bool {
        self.category() == ErrorCategory::Network
    }

    /// Innermost error, looking through cache wrappers.
    pub fn root(&self) -> &PulseError {
        match self {
            PulseError::QueryFailed { source, .. } | PulseError::MutationFailed { source, .. } => {
                source.root()
            }
            other => other,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.root() {
            PulseError::NetworkError(e) if e.is_timeout() => {
                "The endpoint did not answer in time; raise --request-timeout-secs or retry later"
            }
            PulseError::NetworkError(_) => "Check the network connection and the endpoint URL",
            PulseError::HttpStatusError { status, .. } if *status == 403 || *status == 429 => {
                "The upstream API is rate limiting this client; wait a while or use --offline"
            }
            PulseError::HttpStatusError { .. } => "Verify that the endpoint URL points to a repository",
            PulseError::DecodeError(_) => {
                "The endpoint answered with an unexpected body; make sure it serves repository JSON"
            }
            PulseError::IoError(_) => "Check file permissions and paths",
            PulseError::ConfigError { .. }
            | PulseError::InvalidConfigValueError { .. }
            | PulseError::ConfigValidationError { .. } => {
                "Fix the configuration value and run again (see --help)"
            }
            PulseError::UnknownQueryError { .. } | PulseError::UnknownMutationError { .. } => {
                "Register the query or mutation before using it"
            }
            PulseError::CounterReleasedError { .. } => {
                "Keep the dashboard alive while its queries are in use"
            }
            PulseError::QueryFailed { .. } | PulseError::MutationFailed { .. } => {
                "Inspect the logs for the underlying failure"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.root() {
            PulseError::NetworkError(_) => "Could not reach the repository endpoint".to_string(),
            PulseError::HttpStatusError { status, .. } => {
                format!("The repository endpoint refused the request (HTTP {})", status)
            }
            PulseError::DecodeError(_) => "The repository data could not be read".to_string(),
            PulseError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting '{}': {}", field, reason)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PulseError>;
