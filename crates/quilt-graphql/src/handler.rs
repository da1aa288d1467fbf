//! Axum HTTP handlers for GraphQL endpoints.
//!
//! This module provides the HTTP handlers for GraphQL requests:
//! - `POST {endpoint}` - Execute an operation sent as a JSON body
//! - `GET {endpoint}` - Execute an operation sent as URL params, or serve the
//!   interactive console (development only)
//! - `GET {subscription_endpoint}` - WebSocket upgrade for subscriptions
//!
//! Every operation gets a fresh
//! [`RequestContext`](crate::context::RequestContext) from the
//! [`ContextFactory`]. Execution responses are always `200 OK`; only requests
//! that cannot be turned into an operation get a `400`.

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::dynamic::Schema;
use async_graphql::http::{ALL_WEBSOCKET_PROTOCOLS, Credentials, GraphiQLSource};
use async_graphql::{Data, Extensions, Request as GraphQLOperation, Variables};
use async_graphql_axum::{GraphQLProtocol, GraphQLWebSocket};
use async_graphql_parser::parse_query;
use async_graphql_parser::types::{DocumentOperations, OperationType};
use axum::Json;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Extension, Query, Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GraphQLConfig;
use crate::context::{AuthenticatedUser, ContextFactory, RequestInfo, ResponseHandle};
use crate::error::GraphQLError;

/// State shared across GraphQL handlers.
#[derive(Clone)]
pub struct GraphQLState {
    /// The executable schema.
    pub schema: Schema,

    /// Builds the per-operation context.
    pub context_factory: ContextFactory,

    /// GraphQL configuration.
    pub config: Arc<GraphQLConfig>,
}

/// GraphQL request body.
#[derive(Debug, Deserialize)]
pub struct GraphQLRequest {
    /// The GraphQL query string.
    pub query: String,

    /// Optional operation name for multi-operation documents.
    #[serde(rename = "operationName")]
    pub operation_name: Option<String>,

    /// Optional variables for the query.
    pub variables: Option<serde_json::Value>,

    /// Optional extensions.
    pub extensions: Option<serde_json::Value>,
}

/// Query parameters for GET requests.
#[derive(Debug, Default, Deserialize)]
pub struct GraphQLQueryParams {
    /// The GraphQL query string.
    pub query: Option<String>,

    /// Optional operation name.
    #[serde(rename = "operationName")]
    pub operation_name: Option<String>,

    /// Optional variables (JSON string).
    pub variables: Option<String>,

    /// Optional extensions (JSON string).
    pub extensions: Option<String>,
}

/// Handles POST requests to the execution endpoint.
///
/// The body is read up to `graphql.body_limit_bytes`; an oversized or
/// malformed body is answered with `400 Bad Request`.
pub async fn graphql_handler(State(state): State<GraphQLState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, state.config.body_limit_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Failed to read GraphQL request body");
            return error_response(GraphQLError::InvalidRequest(e.to_string()));
        }
    };
    let request: GraphQLRequest = match serde_json::from_slice(&bytes) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Malformed GraphQL request body");
            return error_response(GraphQLError::InvalidRequest(e.to_string()));
        }
    };

    execute(&state, RequestInfo::from_parts(&parts), request).await
}

/// Handles GET requests to the execution endpoint.
///
/// When the console is enabled, a browser asking for HTML without a query
/// gets GraphiQL instead.
pub async fn graphql_handler_get(State(state): State<GraphQLState>, request: Request) -> Response {
    let (parts, _body) = request.into_parts();

    let params = match Query::<GraphQLQueryParams>::try_from_uri(&parts.uri) {
        Ok(Query(params)) => params,
        Err(e) => return error_response(GraphQLError::InvalidRequest(e.to_string())),
    };

    if params.query.is_none() && state.config.console_enabled() && accepts_html(&parts.headers)
    {
        return console(&state.config).into_response();
    }

    let request = match params_to_request(params) {
        Ok(request) => request,
        Err(e) => return error_response(e),
    };

    // Only queries are safe to run from a URL.
    match operation_type(&request.query, request.operation_name.as_deref()) {
        Some(OperationType::Query) | None => {}
        Some(ty) => {
            debug!(operation = %ty, "Rejected non-query operation over GET");
            let mut response = error_response(GraphQLError::MethodNotAllowed(ty.to_string()));
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("POST"));
            return response;
        }
    }

    execute(&state, RequestInfo::from_parts(&parts), request).await
}

/// Handles WebSocket upgrades on the subscription endpoint.
///
/// The context is built once per connection from the upgrade request and is
/// shared by every operation on that connection.
pub async fn graphql_ws_handler(
    State(state): State<GraphQLState>,
    protocol: GraphQLProtocol,
    user: Option<Extension<AuthenticatedUser>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    upgrade: WebSocketUpgrade,
) -> Response {
    let request = RequestInfo {
        method,
        uri,
        headers,
        user: user.map(|Extension(user)| user),
    };
    debug!(
        user = ?request.user.as_ref().map(|u| &u.id),
        "Opening GraphQL subscription connection"
    );

    let context = state.context_factory.create(request, ResponseHandle::new());
    let mut data = Data::default();
    data.insert(context);

    let schema = state.schema.clone();
    upgrade
        .protocols(ALL_WEBSOCKET_PROTOCOLS)
        .on_upgrade(move |stream| {
            GraphQLWebSocket::new(stream, schema, protocol)
                .with_data(data)
                .serve()
        })
}

/// Executes one operation and copies response headers set by resolvers.
async fn execute(
    state: &GraphQLState,
    request_info: RequestInfo,
    request: GraphQLRequest,
) -> Response {
    let response_handle = ResponseHandle::new();
    let context = state
        .context_factory
        .create(request_info, response_handle.clone());

    let mut operation = GraphQLOperation::new(&request.query);
    if let Some(operation_name) = request.operation_name {
        operation = operation.operation_name(operation_name);
    }
    if let Some(variables) = request.variables {
        operation = operation.variables(Variables::from_json(variables));
    }
    if let Some(extensions) = request.extensions {
        match serde_json::from_value::<HashMap<String, async_graphql::Value>>(extensions) {
            Ok(extensions) => operation.extensions = Extensions(extensions),
            Err(e) => return error_response(GraphQLError::InvalidRequest(e.to_string())),
        }
    }
    operation = operation.data(context);

    debug!(query = %request.query, "Executing GraphQL operation");
    let response = state.schema.execute(operation).await;

    let mut http_response = (StatusCode::OK, Json(response)).into_response();
    http_response
        .headers_mut()
        .extend(response_handle.take_headers());
    http_response
}

/// Converts GET query params to a GraphQL request.
fn params_to_request(params: GraphQLQueryParams) -> Result<GraphQLRequest, GraphQLError> {
    let query = params
        .query
        .ok_or_else(|| GraphQLError::InvalidRequest("missing `query` parameter".into()))?;
    let variables = params
        .variables
        .map(|vars| serde_json::from_str(&vars))
        .transpose()
        .map_err(|e| GraphQLError::InvalidRequest(format!("invalid `variables`: {e}")))?;
    let extensions = params
        .extensions
        .map(|ext| serde_json::from_str(&ext))
        .transpose()
        .map_err(|e| GraphQLError::InvalidRequest(format!("invalid `extensions`: {e}")))?;

    Ok(GraphQLRequest {
        query,
        operation_name: params.operation_name,
        variables,
        extensions,
    })
}

/// Type of the operation a request selects. `None` when the document does not
/// parse or the operation cannot be selected; execution reports that.
fn operation_type(query: &str, operation_name: Option<&str>) -> Option<OperationType> {
    let document = parse_query(query).ok()?;
    match document.operations {
        DocumentOperations::Single(operation) => Some(operation.node.ty),
        DocumentOperations::Multiple(operations) => match operation_name {
            Some(name) => operations.get(name).map(|operation| operation.node.ty),
            None if operations.len() == 1 => {
                operations.values().next().map(|operation| operation.node.ty)
            }
            None => None,
        },
    }
}

fn accepts_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

/// The GraphiQL console, sending credentials with every request.
fn console(config: &GraphQLConfig) -> Html<String> {
    Html(
        GraphiQLSource::build()
            .endpoint(&config.endpoint)
            .subscription_endpoint(&config.subscription_endpoint)
            .credentials(Credentials::Include)
            .finish(),
    )
}

/// Returns an error response.
fn error_response(error: GraphQLError) -> Response {
    let status = StatusCode::from_u16(error.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let body = serde_json::json!({
        "errors": [{
            "message": error.to_string(),
            "extensions": {
                "code": error.error_code()
            }
        }]
    });

    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_request_deserialize() {
        let json = r#"{
            "query": "{ greeting }",
            "operationName": "Greet",
            "variables": {"name": "Ada"}
        }"#;

        let request: GraphQLRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.query, "{ greeting }");
        assert_eq!(request.operation_name, Some("Greet".to_string()));
        assert!(request.variables.is_some());
    }

    #[test]
    fn test_graphql_request_minimal() {
        let json = r#"{"query": "{ greeting }"}"#;

        let request: GraphQLRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.query, "{ greeting }");
        assert!(request.operation_name.is_none());
        assert!(request.variables.is_none());
    }

    #[test]
    fn test_params_to_request() {
        let params = GraphQLQueryParams {
            query: Some("{ greeting }".to_string()),
            operation_name: Some("Greet".to_string()),
            variables: Some(r#"{"name": "Ada"}"#.to_string()),
            extensions: None,
        };

        let request = params_to_request(params).unwrap();
        assert_eq!(request.query, "{ greeting }");
        assert_eq!(request.operation_name, Some("Greet".to_string()));
        assert!(request.variables.is_some());
    }

    #[test]
    fn test_params_to_request_missing_query() {
        let err = params_to_request(GraphQLQueryParams::default()).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_params_to_request_invalid_variables() {
        let params = GraphQLQueryParams {
            query: Some("{ greeting }".to_string()),
            variables: Some("not valid json".to_string()),
            ..GraphQLQueryParams::default()
        };

        let err = params_to_request(params).unwrap_err();
        assert!(err.to_string().contains("variables"));
    }

    #[test]
    fn test_accepts_html() {
        let mut headers = HeaderMap::new();
        assert!(!accepts_html(&headers));
        headers.insert(
            header::ACCEPT,
            "text/html,application/xhtml+xml".parse().unwrap(),
        );
        assert!(accepts_html(&headers));
    }

    #[test]
    fn test_console_uses_configured_endpoints() {
        let config = GraphQLConfig {
            endpoint: "/api/graphql".into(),
            subscription_endpoint: "/api/graphql/ws".into(),
            ..GraphQLConfig::default()
        };
        let Html(page) = console(&config);
        assert!(page.contains("/api/graphql"));
        assert!(page.contains("/api/graphql/ws"));
    }
}
