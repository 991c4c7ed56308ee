use crate::core::{ConfigProvider, RepoRecord, RepoSource};
use crate::utils::error::{PulseError, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_REPO_ENDPOINT: &str = "https://api.github.com/repos/tannerlinsley/react-query";

const CLIENT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Reads one repository record over HTTP. No retry, no caching.
#[derive(Debug, Clone)]
pub struct HttpRepoSource {
    client: Client,
    endpoint: String,
}

impl HttpRepoSource {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_timeout(endpoint, None)
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config<C: ConfigProvider + ?Sized>(config: &C) -> Result<Self> {
        Self::with_timeout(config.api_endpoint(), config.request_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RepoSource for HttpRepoSource {
    async fn fetch_repo_data(&self) -> Result<RepoRecord> {
        tracing::debug!("Making API request to: {}", self.endpoint);
        let response = self
            .client
            .get(&self.endpoint)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("API response status: {}", status);

        if !status.is_success() {
            return Err(PulseError::HttpStatusError {
                status: status.as_u16(),
                url: self.endpoint.clone(),
            });
        }

        // 先讀完 body 再解析，傳輸錯誤與格式錯誤才能分開
        let body = response.bytes().await?;
        let record: RepoRecord = serde_json::from_slice(&body)?;
        Ok(record)
    }
}
