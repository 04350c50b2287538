//! Live API description model
//!
//! Only the subset the sync engine needs is modelled:
//! `paths -> {method -> {operationId, parameters, requestBody, responses}}`.
//! Both `OpenAPI` 3.x (`requestBody.content`) and Swagger 2.0 (`in: body`
//! parameters, `responses.200.schema`) shapes are understood. Local `$ref`s
//! are resolved against the document before schemas are flattened.

use catalog_core::{HttpMethod, OperationDescriptor, flatten_schema};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::{Error, Result};

/// `$ref` chains longer than this are left unresolved
const MAX_REF_DEPTH: usize = 32;

/// One operation of the live description
#[derive(Debug, Clone)]
pub struct RawOperation {
    /// HTTP method
    pub method: HttpMethod,
    /// Path template
    pub path: String,
    /// `operationId`
    pub operation_id: Option<String>,
    /// Short summary
    pub summary: Option<String>,
    /// Long description
    pub description: Option<String>,
    /// Tags
    pub tags: Vec<String>,
    /// Path-level and operation-level parameters, refs resolved
    pub parameters: Vec<Parameter>,
    /// JSON request body schema, refs resolved, not yet flattened
    pub request_schema: Option<Value>,
    /// JSON 200-response schema, refs resolved, not yet flattened
    pub response_schema: Option<Value>,
}

/// Operation parameter
#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Location (`path`, `query`, `header`, `cookie`, or Swagger 2 `body`)
    #[serde(rename = "in")]
    pub location: String,
    /// Whether the parameter is required
    #[serde(default)]
    pub required: bool,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// `OpenAPI` 3 schema (or Swagger 2 body schema)
    #[serde(default)]
    pub schema: Option<Value>,
    /// Swagger 2 inline type
    #[serde(default, rename = "type")]
    pub param_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationObject {
    #[serde(default)]
    operation_id: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    parameters: Vec<Value>,
    #[serde(default)]
    request_body: Option<Value>,
    #[serde(default)]
    responses: Map<String, Value>,
}

/// Parsed live description
#[derive(Debug, Clone)]
pub struct ApiDescription {
    title: Option<String>,
    operations: Vec<RawOperation>,
}

impl ApiDescription {
    /// Parse a fetched JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sync`] if the document has no `paths` object or an
    /// operation object cannot be parsed.
    pub fn parse(document: &Value) -> Result<Self> {
        let paths = document
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::Sync("live description has no 'paths' object".to_string()))?;

        let mut operations = Vec::new();

        for (path, item) in paths {
            let item = if item.get("$ref").is_some() {
                resolve_refs(item, document)
            } else {
                item.clone()
            };
            let Some(item) = item.as_object() else {
                return Err(Error::Sync(format!("path item '{path}' is not an object")));
            };

            let shared_params = item
                .get("parameters")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            for (key, op_value) in item {
                let Ok(method) = key.parse::<HttpMethod>() else {
                    continue; // parameters, summary, head, options, ...
                };

                let op: OperationObject = serde_json::from_value(op_value.clone()).map_err(|e| {
                    Error::Sync(format!("failed to parse operation {method} {path}: {e}"))
                })?;

                operations.push(build_operation(method, path, op, &shared_params, document)?);
            }
        }

        let title = document
            .pointer("/info/title")
            .and_then(Value::as_str)
            .map(str::to_string);

        info!(
            title = title.as_deref().unwrap_or("untitled"),
            operations = operations.len(),
            "Parsed live API description"
        );

        Ok(Self { title, operations })
    }

    /// Description title, if any
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// All operations in document order
    #[must_use]
    pub fn operations(&self) -> &[RawOperation] {
        &self.operations
    }

    /// Exact lookup by path and method
    #[must_use]
    pub fn find(&self, method: HttpMethod, path: &str) -> Option<&RawOperation> {
        self.operations
            .iter()
            .find(|op| op.method == method && op.path == path)
    }
}

impl RawOperation {
    /// Flattened `(inputSchema, outputSchema)` pair for this operation
    #[must_use]
    pub fn flattened_schemas(&self) -> (Value, Value) {
        (self.input_schema(), self.output_schema())
    }

    /// Input schema: path/query parameters plus the flattened body fields
    #[must_use]
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required: Vec<Value> = Vec::new();

        for param in self
            .parameters
            .iter()
            .filter(|p| p.location == "path" || p.location == "query")
        {
            let schema = param.schema.clone().unwrap_or_else(|| {
                json!({"type": param.param_type.as_deref().unwrap_or("string")})
            });
            let mut prop = match flatten_schema(&schema) {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            if let Some(ref desc) = param.description {
                prop.insert("description".to_string(), Value::String(desc.clone()));
            }
            properties.insert(param.name.clone(), Value::Object(prop));

            let name = Value::String(param.name.clone());
            if (param.required || param.location == "path") && !required.contains(&name) {
                required.push(name);
            }
        }

        if let Some(ref body) = self.request_schema {
            let flat = flatten_schema(body);
            if let Some(body_props) = flat.get("properties").and_then(Value::as_object) {
                for (k, v) in body_props {
                    properties.insert(k.clone(), v.clone());
                }
            }
            if let Some(body_required) = flat.get("required").and_then(Value::as_array) {
                for r in body_required {
                    if !required.contains(r) {
                        required.push(r.clone());
                    }
                }
            }
        }

        let mut schema = Map::new();
        schema.insert("type".to_string(), Value::String("object".to_string()));
        if !properties.is_empty() {
            schema.insert("properties".to_string(), Value::Object(properties));
        }
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        Value::Object(schema)
    }

    /// Output schema: the flattened 200-response body, or an empty object schema
    #[must_use]
    pub fn output_schema(&self) -> Value {
        self.response_schema
            .as_ref()
            .map_or_else(|| json!({"type": "object"}), flatten_schema)
    }

    /// Build a fresh catalog descriptor for this operation
    #[must_use]
    pub fn to_descriptor(&self) -> OperationDescriptor {
        let fallback = || format_name(&format!("{}_{}", self.method.as_str().to_lowercase(), self.path));
        let name = self
            .operation_id
            .as_deref()
            .map(format_name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(fallback);

        let mut descriptor = OperationDescriptor::new(name, self.method, &self.path);
        descriptor.description = self
            .summary
            .clone()
            .or_else(|| self.description.clone())
            .unwrap_or_else(|| format!("{} {}", self.method, self.path));
        let (input, output) = self.flattened_schemas();
        descriptor.input_schema = input;
        descriptor.output_schema = output;
        descriptor.tags.clone_from(&self.tags);
        descriptor
    }
}

fn build_operation(
    method: HttpMethod,
    path: &str,
    op: OperationObject,
    shared_params: &[Value],
    document: &Value,
) -> Result<RawOperation> {
    let mut parameters: Vec<Parameter> = Vec::new();

    // Operation-level parameters override path-level ones with the same name and location
    for raw in shared_params.iter().chain(op.parameters.iter()) {
        let resolved = resolve_refs(raw, document);
        let param: Parameter = serde_json::from_value(resolved).map_err(|e| {
            Error::Sync(format!("failed to parse parameter of {method} {path}: {e}"))
        })?;
        parameters.retain(|p| !(p.name == param.name && p.location == param.location));
        parameters.push(param);
    }

    let mut request_schema = op
        .request_body
        .as_ref()
        .map(|body| resolve_refs(body, document))
        .and_then(|body| json_media_schema(body.get("content")));

    // Swagger 2: body parameter carries the request schema
    if request_schema.is_none() {
        request_schema = parameters
            .iter()
            .find(|p| p.location == "body")
            .and_then(|p| p.schema.clone());
    }

    let response_schema = op.responses.get("200").and_then(|response| {
        let response = resolve_refs(response, document);
        json_media_schema(response.get("content")).or_else(|| response.get("schema").cloned())
    });

    debug!(%method, path, operation_id = ?op.operation_id, "Parsed operation");

    Ok(RawOperation {
        method,
        path: path.to_string(),
        operation_id: op.operation_id,
        summary: op.summary,
        description: op.description,
        tags: op.tags,
        parameters,
        request_schema,
        response_schema,
    })
}

/// Schema of the JSON media type in a `content` map
fn json_media_schema(content: Option<&Value>) -> Option<Value> {
    let content = content?.as_object()?;
    content
        .get("application/json")
        .or_else(|| {
            content
                .iter()
                .find(|(media_type, _)| media_type.contains("json"))
                .map(|(_, media)| media)
        })
        .and_then(|media| media.get("schema"))
        .cloned()
}

/// Resolve local `$ref`s (`#/...`) recursively.
///
/// Sibling keys of a `$ref` are laid over the referenced object. References
/// that cannot be found, that point back into a reference already being
/// expanded, or that chain past [`MAX_REF_DEPTH`], are kept as-is.
#[must_use]
pub fn resolve_refs(value: &Value, document: &Value) -> Value {
    resolve_with(value, document, &mut Vec::new())
}

fn resolve_with(value: &Value, document: &Value, active: &mut Vec<String>) -> Value {
    match value {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                let Some(pointer) = reference.strip_prefix('#') else {
                    return value.clone();
                };
                if active.len() >= MAX_REF_DEPTH || active.iter().any(|r| r == reference) {
                    return value.clone();
                }
                let Some(target) = document.pointer(pointer) else {
                    return value.clone();
                };

                active.push(reference.to_string());
                let mut resolved = resolve_with(target, document, active);
                if let Value::Object(ref mut resolved_map) = resolved {
                    for (k, v) in map.iter().filter(|(k, _)| k.as_str() != "$ref") {
                        resolved_map.insert(k.clone(), resolve_with(v, document, active));
                    }
                }
                active.pop();
                return resolved;
            }

            Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), resolve_with(v, document, active)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| resolve_with(v, document, active))
                .collect(),
        ),
        _ => value.clone(),
    }
}

/// Normalize an operation identifier into a catalog name.
///
/// Non-alphanumeric characters become `_`, runs of `_` collapse, and leading
/// or trailing `_` are trimmed. Case is preserved.
#[must_use]
pub fn format_name(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut prev_underscore = false;

    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c);
            prev_underscore = false;
        } else if !prev_underscore {
            result.push('_');
            prev_underscore = true;
        }
    }

    result.trim_matches('_').to_string()
}
