//! Tool-call surface: the discovery and execution calls exposed to an
//! upstream protocol layer.
//!
//! Both handlers take raw JSON arguments and always return a value; bad
//! arguments become structured failures, never errors.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use catalog_core::HttpMethod;

use crate::catalog::{CatalogListing, EndpointCatalog, ListFilters, MIN_SEARCH_LEN};
use crate::executor::{EndpointExecutor, ExecutionRequest, ExecutionResult};
use crate::{Error, Result};

/// Name of the discovery tool
pub const LIST_TOOL: &str = "list_api_endpoints";

/// Name of the execution tool
pub const EXECUTE_TOOL: &str = "execute_api_endpoint";

/// A callable tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    /// Tool name
    pub name: String,
    /// Human-readable title
    pub title: String,
    /// What the tool does
    pub description: String,
    /// Input JSON Schema
    pub input_schema: Value,
    /// Behavior hints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
}

/// Hints about tool behavior
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    /// Tool does not modify external state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,
    /// Tool interacts with external entities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_world_hint: Option<bool>,
}

/// The two callable tools
#[must_use]
pub fn describe_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: LIST_TOOL.to_string(),
            title: "List API Endpoints".to_string(),
            description: "Discover available API endpoints grouped by category. \
                          Filter by method, category or search term, then call \
                          execute_api_endpoint with an exact path and method."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "methodFilter": {
                        "type": "string",
                        "enum": HttpMethod::names(),
                        "description": "Only list endpoints with this HTTP method"
                    },
                    "categoryFilter": {
                        "type": "string",
                        "description": "Only list endpoints whose category or tags contain this text"
                    },
                    "searchTerm": {
                        "type": "string",
                        "minLength": MIN_SEARCH_LEN,
                        "description": "Case-insensitive text matched against name, description and path"
                    },
                    "includeDetails": {
                        "type": "boolean",
                        "description": "Include tags, path parameter and body hints for each endpoint",
                        "default": false
                    }
                },
                "required": []
            }),
            annotations: Some(ToolAnnotations {
                read_only_hint: Some(true),
                open_world_hint: Some(false),
            }),
        },
        ToolSpec {
            name: EXECUTE_TOOL.to_string(),
            title: "Execute API Endpoint".to_string(),
            description: "Call one API endpoint by its exact path template and method. \
                          Parameters are a flat object; path placeholders, query and \
                          body fields are routed automatically."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path template exactly as listed, e.g. /pages/{id}"
                    },
                    "method": {
                        "type": "string",
                        "enum": HttpMethod::names(),
                        "description": "HTTP method"
                    },
                    "parameters": {
                        "type": "object",
                        "description": "Path, query and body values by name",
                        "default": {}
                    },
                    "validate": {
                        "type": "boolean",
                        "description": "Check required parameters before calling",
                        "default": true
                    }
                },
                "required": ["path", "method"]
            }),
            annotations: Some(ToolAnnotations {
                read_only_hint: Some(false),
                open_world_hint: Some(true),
            }),
        },
    ]
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListArgs {
    method_filter: Option<String>,
    category_filter: Option<String>,
    search_term: Option<String>,
    #[serde(default)]
    include_details: bool,
}

fn parse_list_args(args: &Value) -> Result<ListFilters> {
    let args: ListArgs = if args.is_null() {
        ListArgs::default()
    } else {
        serde_json::from_value(args.clone())
            .map_err(|e| Error::InvalidFilter(format!("malformed arguments: {e}")))?
    };

    Ok(ListFilters {
        method: args.method_filter,
        category: args.category_filter,
        search: args.search_term,
        include_details: args.include_details,
    })
}

/// Handle a discovery call
#[must_use]
pub fn handle_list_endpoints(catalog: &EndpointCatalog, args: &Value) -> Value {
    match parse_list_args(args).and_then(|filters| catalog.list(&filters)) {
        Ok(listing) => list_success(&listing),
        Err(e) => list_failure(catalog, &e),
    }
}

fn list_success(listing: &CatalogListing) -> Value {
    let next_step = if listing.total == 0 {
        "No endpoints matched. Remove or relax the filters and list again.".to_string()
    } else {
        format!(
            "Pick one of the {} endpoints above and call {EXECUTE_TOOL} with its exact path and method.",
            listing.total
        )
    };

    json!({
        "success": true,
        "totalEndpoints": listing.total,
        "categories": listing.categories,
        "endpoints": listing.endpoints,
        "instructions": format!(
            "Use {EXECUTE_TOOL} with {{path, method, parameters}}. Pass the path template \
             unchanged (e.g. /pages/{{id}}); put path placeholder values, query fields and \
             body fields together in parameters."
        ),
        "nextStepInstruction": next_step,
    })
}

fn list_failure(catalog: &EndpointCatalog, error: &Error) -> Value {
    json!({
        "success": false,
        "error": error.kind(),
        "message": error.to_string(),
        "availableFilters": {
            "methods": HttpMethod::names(),
            "categories": catalog.categories(),
        },
        "suggestion": format!(
            "Use one of the listed methods or categories, or a search term of at least {MIN_SEARCH_LEN} characters."
        ),
    })
}

/// Handle an execution call
pub async fn handle_execute_endpoint(executor: &EndpointExecutor, args: &Value) -> ExecutionResult {
    match serde_json::from_value::<ExecutionRequest>(args.clone()) {
        Ok(request) => executor.execute(&request).await,
        Err(e) => {
            let path = args.get("path").and_then(Value::as_str).unwrap_or_default();
            let method = args.get("method").and_then(Value::as_str).unwrap_or_default();
            ExecutionResult::failure(
                path,
                method,
                &Error::InvalidInput(format!("malformed arguments: {e}")),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::OperationDescriptor;
    use pretty_assertions::assert_eq;

    fn catalog() -> EndpointCatalog {
        let mut get_page = OperationDescriptor::new("getPage", HttpMethod::Get, "/pages/{id}");
        get_page.description = "Fetch a page".to_string();
        let create_user = OperationDescriptor::new("createUser", HttpMethod::Post, "/users");
        EndpointCatalog::new(vec![create_user, get_page])
    }

    #[test]
    fn test_describe_tools() {
        let tools = describe_tools();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec![LIST_TOOL, EXECUTE_TOOL]);
        assert_eq!(tools[1].input_schema["required"], json!(["path", "method"]));
    }

    #[test]
    fn test_list_success_shape() {
        let out = handle_list_endpoints(&catalog(), &json!({}));

        assert_eq!(out["success"], true);
        assert_eq!(out["totalEndpoints"], 2);
        assert_eq!(out["categories"], json!(["content", "users"]));
        assert_eq!(out["endpoints"]["content"][0]["name"], "getPage");
        assert!(out["instructions"].as_str().unwrap().contains(EXECUTE_TOOL));
        assert!(out["nextStepInstruction"].is_string());
    }

    #[test]
    fn test_list_put_on_get_post_catalog_is_empty() {
        let out = handle_list_endpoints(&catalog(), &json!({"methodFilter": "PUT"}));

        assert_eq!(out["success"], true);
        assert_eq!(out["totalEndpoints"], 0);
        assert_eq!(out["categories"], json!([]));
        assert_eq!(out["endpoints"], json!({}));
    }

    #[test]
    fn test_list_invalid_method_reports_filters() {
        let out = handle_list_endpoints(&catalog(), &json!({"methodFilter": "FETCH"}));

        assert_eq!(out["success"], false);
        assert_eq!(out["error"], "input_error");
        assert_eq!(
            out["availableFilters"]["methods"],
            json!(["GET", "POST", "PUT", "DELETE", "PATCH"])
        );
        assert_eq!(
            out["availableFilters"]["categories"],
            json!(["content", "users"])
        );
        assert!(out["suggestion"].is_string());
    }

    #[test]
    fn test_list_malformed_arguments() {
        let out = handle_list_endpoints(&catalog(), &json!({"includeDetails": "yes"}));
        assert_eq!(out["success"], false);

        let out = handle_list_endpoints(&catalog(), &Value::Null);
        assert_eq!(out["success"], true);
    }

    #[test]
    fn test_list_details() {
        let out = handle_list_endpoints(
            &catalog(),
            &json!({"searchTerm": "page", "includeDetails": true}),
        );

        let entry = &out["endpoints"]["content"][0];
        assert_eq!(entry["hasPathParams"], true);
        assert_eq!(entry["acceptsBody"], false);
    }
}
