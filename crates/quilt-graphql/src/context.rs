//! GraphQL execution context.
//!
//! This module provides the per-request context handed to every resolver and
//! the factory that builds it. A context is created fresh for each operation
//! (or each subscription connection) and dropped when it completes.
//!
//! # Example
//!
//! ```ignore
//! use quilt_graphql::{ContextFactory, RequestInfo, ResponseHandle};
//!
//! let factory = ContextFactory::new(Some(extra_fields));
//! let context = factory.create(RequestInfo::from_parts(&parts), ResponseHandle::new());
//! assert!(context.headers.authorization.is_some() == context.user.is_some());
//! ```

use std::sync::Arc;

use axum::http::header::{HeaderName, HeaderValue};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Uri};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Field names owned by the context itself. Static extra fields with these
/// names are dropped.
pub const RESERVED_CONTEXT_FIELDS: [&str; 4] = ["req", "res", "headers", "user"];

/// Identity attached to a request by the upstream authentication layer.
///
/// The authentication middleware inserts this value into the request
/// extensions; its absence means the request is anonymous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Subject identifier.
    pub id: String,

    /// Bearer token the user authenticated with.
    pub token: String,

    /// Decoded token claims.
    #[serde(default)]
    pub claims: serde_json::Value,
}

impl AuthenticatedUser {
    /// Creates a user with empty claims.
    pub fn new(id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            token: token.into(),
            claims: serde_json::Value::Null,
        }
    }

    /// Attaches decoded claims.
    #[must_use]
    pub fn with_claims(mut self, claims: serde_json::Value) -> Self {
        self.claims = claims;
        self
    }
}

/// Headers derived for directive implementations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthHeaders {
    /// The authenticated user's token, or `None` for anonymous requests.
    pub authorization: Option<String>,
}

/// The inbound request as seen by resolvers.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// HTTP method.
    pub method: Method,
    /// Request URI.
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
    /// Identity attached by the authentication layer.
    pub user: Option<AuthenticatedUser>,
}

impl RequestInfo {
    /// Captures the parts of an HTTP request, including the authenticated
    /// user from the request extensions.
    #[must_use]
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            user: parts.extensions.get::<AuthenticatedUser>().cloned(),
        }
    }

    /// A request with no headers and no user. Used where no HTTP request
    /// exists, e.g. when executing a schema directly.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            method: Method::POST,
            uri: Uri::from_static("/"),
            headers: HeaderMap::new(),
            user: None,
        }
    }
}

/// Response-side handle shared with resolvers.
///
/// Headers set here are copied onto the HTTP response once execution
/// finishes. Subscription connections have no response to write to; headers
/// set there are discarded.
#[derive(Debug, Clone, Default)]
pub struct ResponseHandle {
    headers: Arc<Mutex<HeaderMap>>,
}

impl ResponseHandle {
    /// Creates an empty handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing existing values.
    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        self.headers.lock().insert(name, value);
    }

    /// Appends a header value (e.g. `set-cookie`).
    pub fn append_header(&self, name: HeaderName, value: HeaderValue) {
        self.headers.lock().append(name, value);
    }

    /// Returns a copy of the headers set so far.
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        self.headers.lock().clone()
    }

    /// Removes and returns the headers set so far.
    #[must_use]
    pub fn take_headers(&self) -> HeaderMap {
        std::mem::take(&mut *self.headers.lock())
    }
}

/// Per-request execution context.
///
/// Cloning is cheap; resolvers receive their own clone.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The inbound request.
    pub request: Arc<RequestInfo>,

    /// Handle for response headers.
    pub response: ResponseHandle,

    /// Derived headers (currently only the authorization value).
    pub headers: AuthHeaders,

    /// Authenticated user, if any.
    pub user: Option<AuthenticatedUser>,

    /// Statically configured extra fields.
    pub extra: Arc<serde_json::Map<String, serde_json::Value>>,
}

impl RequestContext {
    /// Returns whether the request is authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Returns the user ID if authenticated.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    /// Looks up a static extra field.
    #[must_use]
    pub fn extra(&self, name: &str) -> Option<&serde_json::Value> {
        self.extra.get(name)
    }
}

/// Builds a [`RequestContext`] for every operation.
#[derive(Debug, Clone, Default)]
pub struct ContextFactory {
    extra: Arc<serde_json::Map<String, serde_json::Value>>,
}

impl ContextFactory {
    /// Creates a factory with optional static extra fields.
    ///
    /// Extra fields named like a fixed context field (`req`, `res`,
    /// `headers`, `user`) are dropped; the fixed fields always win.
    #[must_use]
    pub fn new(extra: Option<serde_json::Map<String, serde_json::Value>>) -> Self {
        let mut extra = extra.unwrap_or_default();
        for reserved in RESERVED_CONTEXT_FIELDS {
            if extra.remove(reserved).is_some() {
                warn!(
                    field = reserved,
                    "Static context field shadows a fixed field and is ignored"
                );
            }
        }
        Self {
            extra: Arc::new(extra),
        }
    }

    /// Returns the static extra fields.
    #[must_use]
    pub fn extra(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.extra
    }

    /// Builds the context for one operation.
    ///
    /// The authorization value is the user's token, or `None` when the
    /// request carries no user.
    #[must_use]
    pub fn create(&self, request: RequestInfo, response: ResponseHandle) -> RequestContext {
        let user = request.user.clone();
        let headers = AuthHeaders {
            authorization: user.as_ref().map(|u| u.token.clone()),
        };

        RequestContext {
            request: Arc::new(request),
            response,
            headers,
            user,
            extra: Arc::clone(&self.extra),
        }
    }
}
