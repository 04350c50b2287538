//! Request-time execution of catalog operations
//!
//! A call goes through, in order: input checks, exact `(path, method)`
//! resolution against the current catalog snapshot, the required-field
//! check, parameter partitioning and path interpolation, and finally
//! dispatch through an [`ApiTransport`] under a timeout. Any failure is
//! turned into an `isError` result; [`EndpointExecutor::execute`] never
//! returns an error.

mod request;
mod transport;

pub use request::{PreparedRequest, check_input, interpolate, missing_required, param_string};
pub use transport::{ApiTransport, HttpTransport, TransportResponse};

use std::sync::Arc;
use std::time::{Duration, Instant};

use catalog_core::HttpMethod;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::catalog::CatalogHandle;
use crate::{Error, Result};

/// Default per-call timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Caller input for one execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Path template exactly as listed by discovery
    pub path: String,
    /// HTTP method (case-insensitive)
    pub method: String,
    /// Flat name/value mapping of path, query and body fields
    #[serde(default)]
    pub parameters: Option<Value>,
    /// Check required fields before dispatch
    #[serde(default = "default_validate")]
    pub validate: bool,
}

fn default_validate() -> bool {
    true
}

impl ExecutionRequest {
    /// Request with no parameters and validation on
    pub fn new(path: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
            parameters: None,
            validate: true,
        }
    }

    /// Set the call parameters
    #[must_use]
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Skip the required-field check
    #[must_use]
    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }
}

/// One text block of an execution result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    /// Always `text`
    #[serde(rename = "type")]
    pub content_type: String,
    /// Payload or error message
    pub text: String,
}

impl TextContent {
    fn new(text: String) -> Self {
        Self {
            content_type: "text".to_string(),
            text,
        }
    }
}

/// Metadata attached to every execution result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMetadata {
    /// Resolved path on success, requested path otherwise
    pub endpoint: String,
    /// Requested method, uppercased
    pub method: String,
    /// RFC 3339 completion time
    pub timestamp: String,
    /// Whether the call succeeded
    pub success: bool,
    /// Classification tag of the failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

/// Outcome of one execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Text payload
    pub content: Vec<TextContent>,
    /// Set on failure
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    /// Call metadata
    pub metadata: ExecutionMetadata,
}

impl ExecutionResult {
    /// Successful result carrying `payload`
    #[must_use]
    pub fn success(endpoint: &str, method: &str, payload: &Value) -> Self {
        Self {
            content: vec![TextContent::new(payload_text(payload))],
            is_error: false,
            metadata: ExecutionMetadata {
                endpoint: endpoint.to_string(),
                method: method.to_uppercase(),
                timestamp: Utc::now().to_rfc3339(),
                success: true,
                error_type: None,
            },
        }
    }

    /// Failed result for `error`
    #[must_use]
    pub fn failure(endpoint: &str, method: &str, error: &Error) -> Self {
        Self {
            content: vec![TextContent::new(format!("Error: {error}"))],
            is_error: true,
            metadata: ExecutionMetadata {
                endpoint: endpoint.to_string(),
                method: method.to_uppercase(),
                timestamp: Utc::now().to_rfc3339(),
                success: false,
                error_type: Some(error.kind().to_string()),
            },
        }
    }

    /// The first text block
    #[must_use]
    pub fn text(&self) -> &str {
        self.content.first().map_or("", |c| c.text.as_str())
    }
}

/// Text shown to the caller: strings as-is, anything else pretty-printed JSON
fn payload_text(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Resolves, validates and dispatches calls against catalog operations
pub struct EndpointExecutor {
    catalog: Arc<CatalogHandle>,
    transport: Arc<dyn ApiTransport>,
    timeout: Duration,
}

impl EndpointExecutor {
    /// Create an executor over a shared catalog and a transport
    pub fn new(catalog: Arc<CatalogHandle>, transport: Arc<dyn ApiTransport>) -> Self {
        Self {
            catalog,
            transport,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-call timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute a call, turning every failure into an `isError` result
    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        let start = Instant::now();

        match self.try_execute(request).await {
            Ok((endpoint, payload)) => {
                info!(
                    method = %request.method.to_uppercase(),
                    endpoint = %endpoint,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Executed endpoint"
                );
                ExecutionResult::success(&endpoint, &request.method, &payload)
            }
            Err(e) => {
                warn!(
                    method = %request.method,
                    path = %request.path,
                    error_type = e.kind(),
                    error = %e,
                    "Endpoint execution failed"
                );
                ExecutionResult::failure(&request.path, &request.method, &e)
            }
        }
    }

    /// Execute a call, returning the resolved path and the response payload
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error: input, resolution,
    /// validation, interpolation, transport or timeout.
    pub async fn try_execute(&self, request: &ExecutionRequest) -> Result<(String, Value)> {
        let prepared = self.prepare(request)?;
        let response = tokio::time::timeout(self.timeout, self.dispatch(&prepared))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "{} {} exceeded {}ms",
                    prepared.method,
                    prepared.path,
                    self.timeout.as_millis()
                ))
            })??;

        Ok((prepared.path, response.into_value()))
    }

    /// Run every step up to dispatch
    ///
    /// # Errors
    ///
    /// Returns an input, resolution, validation or interpolation error.
    pub fn prepare(&self, request: &ExecutionRequest) -> Result<PreparedRequest> {
        let (method, parameters) =
            check_input(&request.path, &request.method, request.parameters.as_ref())?;
        let empty = Map::new();
        let parameters = parameters.unwrap_or(&empty);

        let catalog = self.catalog.snapshot();
        let descriptor = catalog
            .find(method, &request.path)
            .ok_or_else(|| Error::OperationNotFound {
                method: method.to_string(),
                path: request.path.clone(),
            })?;

        if request.validate {
            let missing = missing_required(descriptor, parameters);
            if !missing.is_empty() {
                return Err(Error::MissingRequired(missing));
            }
        }

        let prepared = PreparedRequest::build(descriptor, parameters)?;
        debug!(
            name = %descriptor.name,
            path = %prepared.path,
            path_params = prepared.path_params.len(),
            query = prepared.query.len(),
            body = prepared.body.len(),
            "Prepared request"
        );
        Ok(prepared)
    }

    async fn dispatch(&self, prepared: &PreparedRequest) -> Result<TransportResponse> {
        let body = prepared.body_payload();
        let transport = self.transport.as_ref();

        match prepared.method {
            HttpMethod::Get => transport.get(&prepared.path, &prepared.query).await,
            HttpMethod::Post => {
                transport
                    .post(&prepared.path, &prepared.query, body.as_ref())
                    .await
            }
            HttpMethod::Put => {
                transport
                    .put(&prepared.path, &prepared.query, body.as_ref())
                    .await
            }
            HttpMethod::Delete | HttpMethod::Patch => {
                transport
                    .request(prepared.method, &prepared.path, &prepared.query, body.as_ref())
                    .await
            }
        }
    }
}
