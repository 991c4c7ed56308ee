use crate::utils::error::PulseError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Repository summary as served by the GitHub repos API.
///
/// Field names follow their meaning; the serde renames keep the wire names
/// (`subscribers_count`, `stargazers_count`, `forks_count`) in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRecord {
    pub name: String,
    pub description: String,
    #[serde(rename = "subscribers_count", deserialize_with = "string_or_number")]
    pub subscriber_count: String,
    #[serde(rename = "stargazers_count", deserialize_with = "string_or_number")]
    pub star_count: String,
    #[serde(rename = "forks_count", deserialize_with = "string_or_number")]
    pub fork_count: String,
}

/// 字串原樣保留；GitHub 實際回傳數字，轉成十進位字串
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Text(text) => Ok(text),
        Raw::Number(number) => Ok(number.to_string()),
    }
}

/// How a counter tick reaches the query cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterSync {
    /// Invalidate the cached entry and let the cache re-read the counter.
    #[default]
    Invalidate,
    /// Write the new value straight into the cache.
    Push,
}

impl fmt::Display for CounterSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterSync::Invalidate => write!(f, "invalidate"),
            CounterSync::Push => write!(f, "push"),
        }
    }
}

impl FromStr for CounterSync {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "invalidate" => Ok(CounterSync::Invalidate),
            "push" => Ok(CounterSync::Push),
            other => Err(PulseError::InvalidConfigValueError {
                field: "counter_sync".to_string(),
                value: other.to_string(),
                reason: "expected 'invalidate' or 'push'".to_string(),
            }),
        }
    }
}
