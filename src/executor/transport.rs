//! Transport boundary for dispatching prepared calls
//!
//! # Security
//!
//! - The bearer credential is resolved once at construction and never logged
//! - Error bodies are truncated before they are surfaced

use std::time::Duration;

use async_trait::async_trait;
use catalog_core::HttpMethod;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde_json::{Map, Value};
use tracing::debug;

use super::request::param_string;
use crate::config::ApiConfig;
use crate::{Error, Result};

/// Maximum number of characters of an error body included in messages
const ERROR_BODY_LIMIT: usize = 500;

/// Response payload returned by a transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportResponse {
    /// Body that was not JSON
    Text(String),
    /// Parsed JSON body
    Json(Value),
}

impl TransportResponse {
    /// Payload as a JSON value (text becomes a JSON string)
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Text(text) => Value::String(text),
            Self::Json(value) => value,
        }
    }
}

/// Issues the final request against the described API.
///
/// Authentication, retries and connection management live behind this
/// trait; the executor only chooses the call shape.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// Issue a request with any method
    async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        query: &Map<String, Value>,
        body: Option<&Value>,
    ) -> Result<TransportResponse>;

    /// Issue a GET request
    async fn get(&self, path: &str, query: &Map<String, Value>) -> Result<TransportResponse> {
        self.request(HttpMethod::Get, path, query, None).await
    }

    /// Issue a POST request
    async fn post(
        &self,
        path: &str,
        query: &Map<String, Value>,
        body: Option<&Value>,
    ) -> Result<TransportResponse> {
        self.request(HttpMethod::Post, path, query, body).await
    }

    /// Issue a PUT request
    async fn put(
        &self,
        path: &str,
        query: &Map<String, Value>,
        body: Option<&Value>,
    ) -> Result<TransportResponse> {
        self.request(HttpMethod::Put, path, query, body).await
    }
}

/// `reqwest` transport against a fixed base URL
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    headers: HeaderMap,
    bearer_token: Option<String>,
}

impl HttpTransport {
    /// Create a transport for `base_url` with a per-request `timeout`
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is empty or the client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(Error::Config("api.base_url is not configured".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mcp-api-catalog/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers: HeaderMap::new(),
            bearer_token: None,
        })
    }

    /// Build a transport from the `api` config section
    ///
    /// # Errors
    ///
    /// Returns an error for a missing base URL or an invalid header.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let mut transport = Self::new(&config.base_url, config.request_timeout)?;
        for (name, value) in &config.headers {
            transport = transport.with_header(name, value)?;
        }
        if let Some(token) = config.resolve_auth_token() {
            transport = transport.with_bearer_token(token);
        }
        Ok(transport)
    }

    /// Add a header sent with every request
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the name or value is not a valid header.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let header_name = name
            .parse::<HeaderName>()
            .map_err(|e| Error::Config(format!("Invalid header name '{name}': {e}")))?;
        let header_value = value
            .parse::<HeaderValue>()
            .map_err(|e| Error::Config(format!("Invalid value for header '{name}': {e}")))?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Send `Authorization: Bearer <token>` with every request
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        query: &Map<String, Value>,
        body: Option<&Value>,
    ) -> Result<TransportResponse> {
        let url = self.url(path);
        let method_name = Method::from_bytes(method.as_str().as_bytes())
            .map_err(|e| Error::Internal(format!("Invalid HTTP method '{method}': {e}")))?;

        let mut request = self
            .client
            .request(method_name, &url)
            .headers(self.headers.clone());

        if !query.is_empty() {
            let pairs: Vec<(&str, String)> = query
                .iter()
                .map(|(name, value)| (name.as_str(), param_string(value)))
                .collect();
            request = request.query(&pairs);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(ref token) = self.bearer_token {
            request = request.bearer_auth(token);
        }

        debug!(method = %method, url = %url, "Dispatching request");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(format!("{method} {path} timed out"))
            } else {
                Error::Transport(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Error::Transport(format!(
                "API returned {}: {}",
                status,
                text.chars().take(ERROR_BODY_LIMIT).collect::<String>()
            )));
        }

        Ok(match serde_json::from_str::<Value>(&text) {
            Ok(value) => TransportResponse::Json(value),
            Err(_) => TransportResponse::Text(text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_with_query_and_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pages/42"))
            .and(query_param("expand", "true"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "42"})))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(server.uri(), Duration::from_secs(5))
            .unwrap()
            .with_bearer_token("secret");
        let mut query = Map::new();
        query.insert("expand".to_string(), json!(true));

        let response = transport.get("/pages/42", &query).await.unwrap();
        assert_eq!(response, TransportResponse::Json(json!({"id": "42"})));
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pages"))
            .and(body_json(json!({"title": "Hello"})))
            .respond_with(ResponseTemplate::new(201).set_body_string("created"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(format!("{}/", server.uri()), Duration::from_secs(5))
            .unwrap()
            .with_header("x-workspace", "docs")
            .unwrap();

        let response = transport
            .post("/pages", &Map::new(), Some(&json!({"title": "Hello"})))
            .await
            .unwrap();
        assert_eq!(response, TransportResponse::Text("created".to_string()));
    }

    #[tokio::test]
    async fn test_error_status_is_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404).set_body_string("x".repeat(2000)))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = transport
            .request(HttpMethod::Delete, "/pages/1", &Map::new(), None)
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("API returned 404"));
        assert!(message.len() < 600);
        assert_eq!(err.kind(), "transport_error");
    }

    #[test]
    fn test_invalid_header_rejected() {
        let transport = HttpTransport::new("https://api.example.com", Duration::from_secs(5)).unwrap();
        assert!(transport.with_header("bad header", "v").is_err());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let err = HttpTransport::new("", Duration::from_secs(5)).unwrap_err();
        assert_eq!(err.kind(), "config_error");
    }
}
