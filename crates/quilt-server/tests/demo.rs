//! End-to-end tests of the demo fragment tree behind the authentication
//! middleware.

use std::path::PathBuf;

use async_graphql::{Request as GraphQLOperation, value};
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::{Router, middleware};
use futures_util::StreamExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use quilt_graphql::{GraphQLConfig, GraphQLServer, Mode, with_graphql};
use quilt_server::{AuthState, authentication_middleware, graph};
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "demo-secret";

// =============================================================================
// Fixtures
// =============================================================================

fn server() -> GraphQLServer {
    let config = GraphQLConfig {
        mode: Mode::Development,
        fragments_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("graph"),
        ..GraphQLConfig::default()
    };
    with_graphql(Router::new(), config, &graph::catalog(), None).unwrap()
}

fn app() -> Router {
    server()
        .map_router(|router| {
            router.layer(middleware::from_fn_with_state(
                AuthState::new(SECRET),
                authentication_middleware,
            ))
        })
        .into_router()
}

fn bearer(sub: &str) -> String {
    let exp = time::OffsetDateTime::now_utc().unix_timestamp() + 3600;
    let token = encode(
        &Header::default(),
        &json!({ "sub": sub, "exp": exp }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {token}")
}

async fn graphql(query: &str, authorization: Option<String>) -> Value {
    let mut request = Request::builder()
        .method("POST")
        .uri("/graphql")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(value) = authorization {
        request = request.header(header::AUTHORIZATION, value);
    }
    let request = request
        .body(Body::from(json!({ "query": query }).to_string()))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Queries and mutations
// =============================================================================

#[tokio::test]
async fn test_hello_is_uppercased_by_directive() {
    let body = graphql(r#"{ hello(name: "ada") }"#, None).await;
    assert_eq!(body["data"]["hello"], "HELLO, ADA");
}

#[tokio::test]
async fn test_users_from_second_fragment() {
    let body = graphql("{ users { id email homepage } }", None).await;
    let users = body["data"]["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["email"], "ada@example.com");
    assert_eq!(users[1]["homepage"], Value::Null);
}

#[tokio::test]
async fn test_me_requires_token() {
    let body = graphql("{ me { id } }", None).await;
    assert_eq!(body["data"]["me"], Value::Null);
    assert_eq!(body["errors"][0]["extensions"]["code"], "UNAUTHORIZED");

    let body = graphql("{ me { id name } }", Some(bearer("grace"))).await;
    assert_eq!(body["data"]["me"], json!({ "id": "grace", "name": "Grace Hopper" }));
}

#[tokio::test]
async fn test_rename_validates_input() {
    let body = graphql(r#"mutation { rename(name: "  ") { name } }"#, Some(bearer("ada"))).await;
    assert_eq!(body["errors"][0]["extensions"]["code"], "BAD_USER_INPUT");

    let body = graphql(r#"mutation { rename(name: "Countess") { id name } }"#, Some(bearer("ada")))
        .await;
    assert_eq!(body["data"]["rename"], json!({ "id": "ada", "name": "Countess" }));
}

// =============================================================================
// Subscriptions
// =============================================================================

#[tokio::test]
async fn test_ticks_stream() {
    let server = server();
    let responses: Vec<_> = server
        .schema()
        .execute_stream(GraphQLOperation::new(
            "subscription { ticks(count: 3, intervalMs: 1) }",
        ))
        .collect()
        .await;

    let data: Vec<_> = responses.into_iter().map(|r| r.data).collect();
    assert_eq!(
        data,
        vec![
            value!({ "ticks": 1 }),
            value!({ "ticks": 2 }),
            value!({ "ticks": 3 })
        ]
    );
}

#[tokio::test]
async fn test_ticks_rejects_non_positive_interval() {
    let server = server();
    for interval in [0, -5] {
        let responses: Vec<_> = server
            .schema()
            .execute_stream(GraphQLOperation::new(format!(
                "subscription {{ ticks(count: 2, intervalMs: {interval}) }}"
            )))
            .collect()
            .await;

        assert_eq!(responses.len(), 1);
        let error = &responses[0].errors[0];
        assert_eq!(error.message, "intervalMs must be at least 1");
        let code = error.extensions.as_ref().and_then(|e| e.get("code"));
        assert_eq!(code, Some(&async_graphql::Value::from("BAD_USER_INPUT")));
    }
}
