//! Sources of the live API description

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::{Error, Result};

/// Something that can produce the live API description document
#[async_trait]
pub trait DescriptionSource: Send + Sync {
    /// Fetch the current description as JSON
    async fn fetch(&self) -> Result<Value>;

    /// Where the description comes from (for logs and reports)
    fn location(&self) -> String;
}

/// Fetches the description over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpDescriptionSource {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpDescriptionSource {
    /// Create a source for `url` with a whole-fetch `timeout`
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(Error::Config("sync.swagger_url is not configured".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mcp-api-catalog/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    async fn fetch_inner(&self) -> Result<Value> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("fetching {} timed out", self.url))
                } else {
                    Error::Sync(format!("failed to fetch {}: {e}", self.url))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Sync(format!(
                "fetching {} returned {status}",
                self.url
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Sync(format!("failed to read {}: {e}", self.url)))?;
        debug!(url = %self.url, bytes = body.len(), "Fetched live description");

        serde_json::from_str(&body)
            .map_err(|e| Error::Sync(format!("live description is not valid JSON: {e}")))
    }
}

#[async_trait]
impl DescriptionSource for HttpDescriptionSource {
    async fn fetch(&self) -> Result<Value> {
        tokio::time::timeout(self.timeout, self.fetch_inner())
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "fetching {} exceeded {}ms",
                    self.url,
                    self.timeout.as_millis()
                ))
            })?
    }

    fn location(&self) -> String {
        self.url.clone()
    }
}

/// Reads a previously downloaded description from disk (JSON, or YAML by
/// `.yaml`/`.yml` extension)
#[derive(Debug, Clone)]
pub struct FileDescriptionSource {
    path: PathBuf,
}

impl FileDescriptionSource {
    /// Create a source reading `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DescriptionSource for FileDescriptionSource {
    async fn fetch(&self) -> Result<Value> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::Sync(format!("failed to read {}: {e}", self.path.display()))
        })?;

        let is_yaml = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
        if !is_yaml {
            return serde_json::from_str(&content)
                .map_err(|e| Error::Sync(format!("live description is not valid JSON: {e}")));
        }

        // Through serde_yaml::Value so unquoted status codes become string keys
        let document: serde_yaml::Value = serde_yaml::from_str(&content)
            .map_err(|e| Error::Sync(format!("live description is not valid YAML: {e}")))?;
        serde_json::to_value(document)
            .map_err(|e| Error::Sync(format!("live description cannot be represented as JSON: {e}")))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Serves an in-memory document
#[derive(Debug, Clone)]
pub struct StaticDescriptionSource {
    document: Value,
}

impl StaticDescriptionSource {
    /// Wrap an already parsed document
    #[must_use]
    pub fn new(document: Value) -> Self {
        Self { document }
    }
}

#[async_trait]
impl DescriptionSource for StaticDescriptionSource {
    async fn fetch(&self) -> Result<Value> {
        Ok(self.document.clone())
    }

    fn location(&self) -> String {
        "in-memory".to_string()
    }
}
