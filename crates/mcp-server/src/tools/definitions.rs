//! The fixed tool surface advertised by `tools/list`

use serde_json::{json, Map, Value};

use crate::protocol::{McpInputSchema, McpTool};

pub const FETCH_SWAGGER_INFO: &str = "fetch_swagger_info";
pub const LIST_ENDPOINTS: &str = "list_endpoints";
pub const GET_ENDPOINT_DETAILS: &str = "get_endpoint_details";
pub const EXECUTE_API_REQUEST: &str = "execute_api_request";
pub const VALIDATE_API_RESPONSE: &str = "validate_api_response";

fn property(schema_type: &str, description: &str) -> Value {
    json!({ "type": schema_type, "description": description })
}

fn tool(name: &str, description: &str, properties: &[(&str, Value)], required: &[&str]) -> McpTool {
    let properties: Map<String, Value> = properties
        .iter()
        .map(|(name, schema)| (name.to_string(), schema.clone()))
        .collect();

    McpTool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: McpInputSchema::object(properties, required),
    }
}

/// All tools, in advertisement order
pub fn tool_definitions() -> Vec<McpTool> {
    vec![
        tool(
            FETCH_SWAGGER_INFO,
            "Fetch Swagger/OpenAPI documentation to discover available API endpoints",
            &[(
                "url",
                property(
                    "string",
                    "URL to the swagger.json or swagger.yaml file. If not provided, will try to use the base URL with common Swagger paths.",
                ),
            )],
            &[],
        ),
        tool(
            LIST_ENDPOINTS,
            "List all available API endpoints after fetching Swagger documentation",
            &[],
            &[],
        ),
        tool(
            GET_ENDPOINT_DETAILS,
            "Get detailed information about a specific API endpoint",
            &[
                (
                    "path",
                    property("string", "The endpoint path to get details for (e.g., '/users/{id}')"),
                ),
                (
                    "method",
                    property("string", "The HTTP method (GET, POST, PUT, DELETE, etc.)"),
                ),
            ],
            &["path", "method"],
        ),
        tool(
            EXECUTE_API_REQUEST,
            "Execute an API request to a specific endpoint",
            &[
                ("method", property("string", "HTTP method (GET, POST, PUT, DELETE, etc.)")),
                ("path", property("string", "The endpoint path (e.g., '/users/123')")),
                ("params", property("object", "Query parameters as key-value pairs")),
                (
                    "body",
                    property("object", "Request body as a JSON object (for POST/PUT/PATCH)"),
                ),
                ("headers", property("object", "Custom headers as key-value pairs")),
            ],
            &["method", "path"],
        ),
        tool(
            VALIDATE_API_RESPONSE,
            "Validate an API response against the schema from Swagger documentation",
            &[
                ("path", property("string", "The endpoint path")),
                ("method", property("string", "The HTTP method")),
                ("statusCode", property("number", "The HTTP status code")),
                ("responseBody", property("object", "The response body to validate")),
            ],
            &["path", "method", "statusCode", "responseBody"],
        ),
    ]
}
