//! Operation descriptor - the unit of the catalog
//!
//! Descriptors are persisted as JSON objects inside chunk files:
//!
//! ```json
//! {
//!     "name": "getPageById",
//!     "description": "Retrieve a page",
//!     "method": "GET",
//!     "path": "/pages/{id}",
//!     "inputSchema": { "type": "object", "required": ["id"] },
//!     "outputSchema": { "type": "object" },
//!     "tags": ["pages"]
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::HttpMethod;

/// One callable API operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    /// Unique operation name (normalized operation id)
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// HTTP method
    pub method: HttpMethod,

    /// Path template, e.g. `/pages/{id}`
    pub path: String,

    /// Flattened schema of every caller-supplied parameter and body field
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,

    /// Flattened schema of the 200 response body
    #[serde(default = "empty_object_schema")]
    pub output_schema: Value,

    /// Category labels, in declaration order
    #[serde(default)]
    pub tags: Vec<String>,
}

fn empty_object_schema() -> Value {
    json!({"type": "object"})
}

impl OperationDescriptor {
    /// Create a descriptor with empty object schemas and no tags
    pub fn new(name: impl Into<String>, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            method,
            path: path.into(),
            input_schema: empty_object_schema(),
            output_schema: empty_object_schema(),
            tags: Vec::new(),
        }
    }

    /// Check whether this descriptor is the operation at `(method, path)`
    #[must_use]
    pub fn matches(&self, method: HttpMethod, path: &str) -> bool {
        self.method == method && self.path == path
    }

    /// Placeholder names in the path template, in order of first appearance
    #[must_use]
    pub fn path_placeholders(&self) -> Vec<String> {
        extract_placeholders(&self.path)
    }

    /// Whether the path template contains any `{...}` placeholder
    #[must_use]
    pub fn has_path_params(&self) -> bool {
        !self.path_placeholders().is_empty()
    }

    /// Names listed in `inputSchema.required`
    #[must_use]
    pub fn required_inputs(&self) -> Vec<String> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of properties declared by the input schema
    #[must_use]
    pub fn input_property_count(&self) -> usize {
        self.input_schema
            .get("properties")
            .and_then(Value::as_object)
            .map_or(0, serde_json::Map::len)
    }
}

/// Extract `{name}` placeholder names from a path template.
///
/// Duplicates are reported once. An unterminated `{` ends the scan.
#[must_use]
pub fn extract_placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = &after[..end];
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
        rest = &after[end + 1..];
    }

    names
}
