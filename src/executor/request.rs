//! Request preparation: input checks, parameter partitioning and path
//! interpolation. Everything here is pure.

use catalog_core::{HttpMethod, OperationDescriptor, extract_placeholders};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Characters never accepted in a requested path
const FORBIDDEN_PATH_CHARS: [char; 6] = ['<', '>', '"', '\'', '`', '\\'];

/// A call ready for dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedRequest {
    /// Method of the resolved operation
    pub method: HttpMethod,
    /// Path template of the resolved operation
    pub template: String,
    /// Interpolated path
    pub path: String,
    /// Parameters consumed by path placeholders
    pub path_params: Map<String, Value>,
    /// Parameters sent as query string
    pub query: Map<String, Value>,
    /// Parameters sent as JSON body fields
    pub body: Map<String, Value>,
}

impl PreparedRequest {
    /// Partition `parameters` for `descriptor` and interpolate its path.
    ///
    /// Null values count as absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedPlaceholders`] naming every placeholder
    /// that had no value.
    pub fn build(descriptor: &OperationDescriptor, parameters: &Map<String, Value>) -> Result<Self> {
        let placeholders = descriptor.path_placeholders();

        let mut path_params = Map::new();
        let mut query = Map::new();
        let mut body = Map::new();

        for (name, value) in parameters {
            if value.is_null() {
                continue;
            }
            if placeholders.iter().any(|p| p == name) {
                path_params.insert(name.clone(), value.clone());
            } else if matches!(
                descriptor.method,
                HttpMethod::Get | HttpMethod::Delete | HttpMethod::Patch
            ) {
                query.insert(name.clone(), value.clone());
            } else {
                body.insert(name.clone(), value.clone());
            }
        }

        let path = interpolate(&descriptor.path, &path_params)?;

        Ok(Self {
            method: descriptor.method,
            template: descriptor.path.clone(),
            path,
            path_params,
            query,
            body,
        })
    }

    /// JSON body to send, if the method carries one and there is anything to send
    #[must_use]
    pub fn body_payload(&self) -> Option<Value> {
        (self.method.carries_body() && !self.body.is_empty())
            .then(|| Value::Object(self.body.clone()))
    }
}

/// Check the shape of a call before anything is resolved
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for a malformed path, an unsupported
/// method, or parameters that are not a JSON object.
pub fn check_input<'a>(
    path: &str,
    method: &str,
    parameters: Option<&'a Value>,
) -> Result<(HttpMethod, Option<&'a Map<String, Value>>)> {
    check_path(path)?;

    let method: HttpMethod = method
        .parse()
        .map_err(|e: catalog_core::ParseMethodError| Error::InvalidInput(e.to_string()))?;

    let parameters = match parameters {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map),
        Some(other) => {
            return Err(Error::InvalidInput(format!(
                "parameters must be an object of name/value pairs, got {}",
                json_type(other)
            )));
        }
    };

    Ok((method, parameters))
}

fn check_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::InvalidInput("path must not be empty".to_string()));
    }
    if !path.starts_with('/') {
        return Err(Error::InvalidInput(format!(
            "path must start with '/': {path}"
        )));
    }
    if let Some(c) = path
        .chars()
        .find(|c| FORBIDDEN_PATH_CHARS.contains(c) || c.is_whitespace() || c.is_control())
    {
        return Err(Error::InvalidInput(format!(
            "path contains forbidden character {c:?}"
        )));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(Error::InvalidInput(
            "path must not contain '..' segments".to_string(),
        ));
    }
    Ok(())
}

/// Names in the descriptor's `required` list that are absent or null
#[must_use]
pub fn missing_required(
    descriptor: &OperationDescriptor,
    parameters: &Map<String, Value>,
) -> Vec<String> {
    descriptor
        .required_inputs()
        .into_iter()
        .filter(|name| parameters.get(name).is_none_or(Value::is_null))
        .collect()
}

/// Replace each `{name}` in `template` with its percent-encoded value
///
/// # Errors
///
/// Returns [`Error::UnresolvedPlaceholders`] naming exactly the
/// placeholders with no value.
pub fn interpolate(template: &str, values: &Map<String, Value>) -> Result<String> {
    let mut path = template.to_string();
    let mut unresolved = Vec::new();

    for name in extract_placeholders(template) {
        match values.get(&name).filter(|v| !v.is_null()) {
            Some(value) => {
                path = path.replace(&format!("{{{name}}}"), &encode_segment(&param_string(value)));
            }
            None => unresolved.push(name),
        }
    }

    if unresolved.is_empty() {
        Ok(path)
    } else {
        Err(Error::UnresolvedPlaceholders(unresolved))
    }
}

/// String form of a parameter value for paths and query strings
#[must_use]
pub fn param_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn encode_segment(raw: &str) -> String {
    // form encoding writes spaces as '+', a literal '+' is already %2B
    url::form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_check_path() {
        assert!(check_path("/pages/{id}").is_ok());
        assert!(check_path("").is_err());
        assert!(check_path("pages").is_err());
        assert!(check_path("/pages/<script>").is_err());
        assert!(check_path("/pages/'1'").is_err());
        assert!(check_path("/pages/a b").is_err());
        assert!(check_path("/pages/../admin").is_err());
        assert!(check_path("/pages/a..b").is_ok());
    }

    #[test]
    fn test_check_input_method_and_parameters() {
        let (method, parameters) = check_input("/pages", "get", None).unwrap();
        assert_eq!(method, HttpMethod::Get);
        assert!(parameters.is_none());

        let err = check_input("/pages", "OPTIONS", None).unwrap_err();
        assert_eq!(err.kind(), "input_error");

        let list = json!(["id"]);
        let err = check_input("/pages", "GET", Some(&list)).unwrap_err();
        assert!(err.to_string().contains("got array"));

        let null = Value::Null;
        assert!(check_input("/pages", "GET", Some(&null)).unwrap().1.is_none());
    }

    #[test]
    fn test_partition_get() {
        let descriptor = OperationDescriptor::new("getPage", HttpMethod::Get, "/pages/{id}");
        let prepared =
            PreparedRequest::build(&descriptor, &params(json!({"id": "42", "expand": true})))
                .unwrap();

        assert_eq!(prepared.path, "/pages/42");
        assert_eq!(prepared.path_params, params(json!({"id": "42"})));
        assert_eq!(prepared.query, params(json!({"expand": true})));
        assert!(prepared.body.is_empty());
        assert_eq!(prepared.body_payload(), None);
    }

    #[test]
    fn test_partition_post() {
        let descriptor = OperationDescriptor::new("addBlock", HttpMethod::Post, "/pages/{id}/blocks");
        let prepared = PreparedRequest::build(
            &descriptor,
            &params(json!({"id": 7, "content": "hi", "skip": null})),
        )
        .unwrap();

        assert_eq!(prepared.path, "/pages/7/blocks");
        assert!(prepared.query.is_empty());
        assert_eq!(prepared.body_payload(), Some(json!({"content": "hi"})));
    }

    #[test]
    fn test_partition_patch_uses_query() {
        let descriptor = OperationDescriptor::new("patchPage", HttpMethod::Patch, "/pages/{id}");
        let prepared =
            PreparedRequest::build(&descriptor, &params(json!({"id": "1", "title": "x"}))).unwrap();

        assert_eq!(prepared.query, params(json!({"title": "x"})));
        assert_eq!(prepared.body_payload(), None);
    }

    #[test]
    fn test_interpolate_encodes_values() {
        let path = interpolate("/files/{name}", &params(json!({"name": "a b/c+d"}))).unwrap();
        assert_eq!(path, "/files/a%20b%2Fc%2Bd");
    }

    #[test]
    fn test_interpolate_names_exactly_the_unresolved() {
        let template = "/teams/{team}/pages/{page}/blocks/{block}";
        let err = interpolate(template, &params(json!({"page": "1", "block": null}))).unwrap_err();

        match err {
            Error::UnresolvedPlaceholders(names) => assert_eq!(names, vec!["team", "block"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_interpolate_leaves_no_placeholders() {
        let template = "/teams/{team}/pages/{page}";
        let path =
            interpolate(template, &params(json!({"team": "t", "page": "p", "x": 1}))).unwrap();
        assert!(!path.contains('{') && !path.contains('}'));
        assert_eq!(path, "/teams/t/pages/p");
    }

    #[test]
    fn test_missing_required_aggregates() {
        let mut descriptor = OperationDescriptor::new("createPage", HttpMethod::Post, "/pages");
        descriptor.input_schema = json!({
            "type": "object",
            "required": ["title", "parent", "body"]
        });

        let missing = missing_required(&descriptor, &params(json!({"parent": null, "body": "x"})));
        assert_eq!(missing, vec!["title", "parent"]);
    }
}
