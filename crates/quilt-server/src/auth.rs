//! Bearer token authentication.
//!
//! Attaches an [`AuthenticatedUser`] to requests carrying a valid HS256
//! bearer token. It never rejects a request: authorization is decided later
//! by the `isAuthenticated` directive.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use quilt_graphql::AuthenticatedUser;
use serde_json::Value;

/// Token verification settings shared by every request.
#[derive(Clone)]
pub struct AuthState {
    key: DecodingKey,
    validation: Validation,
}

impl AuthState {
    pub fn new(secret: &str) -> Arc<Self> {
        Arc::new(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        })
    }

    /// Verifies a token and extracts the user. `None` when the token is
    /// invalid, expired or has no `sub` claim.
    pub fn authenticate(&self, token: &str) -> Option<AuthenticatedUser> {
        let claims = match decode::<Value>(token, &self.key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!(error = %e, "Bearer token rejected");
                return None;
            }
        };
        let subject = claims.get("sub").and_then(Value::as_str)?.to_string();
        Some(AuthenticatedUser::new(subject, token).with_claims(claims))
    }
}

/// Authentication middleware.
///
/// Requests without a usable `Authorization: Bearer` header pass through
/// anonymous.
pub async fn authentication_middleware(
    State(state): State<Arc<AuthState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    if let Some(user) = token.and_then(|t| state.authenticate(t)) {
        tracing::debug!(user = %user.id, path = %req.uri().path(), "Request authenticated");
        req.extensions_mut().insert(user);
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::{Extension, Router, middleware};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;
    use tower::ServiceExt;

    const SECRET: &str = "test-secret";

    fn token(secret: &str, claims: Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn exp(offset: i64) -> i64 {
        time::OffsetDateTime::now_utc().unix_timestamp() + offset
    }

    fn app() -> Router {
        Router::new()
            .route(
                "/",
                get(|user: Option<Extension<AuthenticatedUser>>| async move {
                    user.map_or_else(|| "anonymous".to_string(), |Extension(u)| u.id)
                }),
            )
            .layer(middleware::from_fn_with_state(
                AuthState::new(SECRET),
                authentication_middleware,
            ))
    }

    async fn who(authorization: Option<String>) -> String {
        let mut request = Request::builder().uri("/");
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }
        let response = app()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_valid_token_attaches_user() {
        let token = token(SECRET, json!({ "sub": "ada", "exp": exp(3600) }));
        assert_eq!(who(Some(format!("Bearer {token}"))).await, "ada");
    }

    #[tokio::test]
    async fn test_missing_header_is_anonymous() {
        assert_eq!(who(None).await, "anonymous");
    }

    #[tokio::test]
    async fn test_bad_tokens_are_anonymous() {
        let wrong_secret = token("other", json!({ "sub": "ada", "exp": exp(3600) }));
        assert_eq!(who(Some(format!("Bearer {wrong_secret}"))).await, "anonymous");

        let expired = token(SECRET, json!({ "sub": "ada", "exp": exp(-3600) }));
        assert_eq!(who(Some(format!("Bearer {expired}"))).await, "anonymous");

        let no_subject = token(SECRET, json!({ "exp": exp(3600) }));
        assert_eq!(who(Some(format!("Bearer {no_subject}"))).await, "anonymous");

        assert_eq!(who(Some("Basic dXNlcjpwYXNz".into())).await, "anonymous");
    }

    #[test]
    fn test_authenticate_keeps_token_and_claims() {
        let raw = token(SECRET, json!({ "sub": "ada", "exp": exp(60), "role": "admin" }));
        let user = AuthState::new(SECRET).authenticate(&raw).unwrap();
        assert_eq!(user.token, raw);
        assert_eq!(user.claims["role"], "admin");
    }
}
