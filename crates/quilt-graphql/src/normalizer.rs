//! Error normalization between development and production.
//!
//! In development every error reaches the client untouched. In production,
//! only classified errors do: those raised as [`ApiError`], and those
//! carrying the `extensions.exception.name == "AuthorizationError"` marker.
//! Anything else is logged and replaced by a fixed, detail-free error.
//!
//! [`ErrorNormalizerExtension`] installs the normalizer as an engine
//! extension, so it sees every response: queries, mutations, each
//! subscription event, and parse or validation failures.

use std::sync::Arc;

use async_graphql::extensions::{
    Extension, ExtensionContext, ExtensionFactory, NextRequest, NextSubscribe,
};
use async_graphql::{Response, ServerError, Value};
use futures_util::stream::{BoxStream, StreamExt};
use tracing::error;

use crate::api_error::{AUTHORIZATION_ERROR_NAME, ApiError};
use crate::config::Mode;

/// Message of the error that replaces unclassified errors in production.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong.";

/// Decides what the client sees of an execution error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorNormalizer {
    mode: Mode,
}

impl ErrorNormalizer {
    /// Creates a normalizer for `mode`.
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        Self { mode }
    }

    /// The mode this normalizer runs in.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns `true` if `error` is safe to show verbatim.
    #[must_use]
    pub fn is_classified(error: &ServerError) -> bool {
        error.source::<ApiError>().is_some() || has_authorization_marker(error)
    }

    /// Normalizes one error.
    #[must_use]
    pub fn normalize(&self, error: ServerError) -> ServerError {
        if self.mode.is_development() || Self::is_classified(&error) {
            return error;
        }

        error!(
            message = %error.message,
            path = ?error.path,
            locations = ?error.locations,
            "Unclassified GraphQL error masked"
        );
        ServerError::new(GENERIC_ERROR_MESSAGE, None)
    }

    /// Normalizes every error of a response.
    #[must_use]
    pub fn normalize_response(&self, mut response: Response) -> Response {
        if !response.errors.is_empty() {
            response.errors = response
                .errors
                .into_iter()
                .map(|e| self.normalize(e))
                .collect();
        }
        response
    }
}

fn has_authorization_marker(error: &ServerError) -> bool {
    let Some(Value::Object(exception)) = error
        .extensions
        .as_ref()
        .and_then(|extensions| extensions.get("exception"))
    else {
        return false;
    };
    matches!(exception.get("name"), Some(Value::String(name)) if name == AUTHORIZATION_ERROR_NAME)
}

/// Engine extension applying an [`ErrorNormalizer`] to every response.
#[derive(Debug, Clone, Copy)]
pub struct ErrorNormalizerExtension {
    normalizer: ErrorNormalizer,
}

impl ErrorNormalizerExtension {
    /// Creates the extension.
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        Self {
            normalizer: ErrorNormalizer::new(mode),
        }
    }
}

impl ExtensionFactory for ErrorNormalizerExtension {
    fn create(&self) -> Arc<dyn Extension> {
        Arc::new(NormalizeErrors(self.normalizer))
    }
}

struct NormalizeErrors(ErrorNormalizer);

#[async_trait::async_trait]
impl Extension for NormalizeErrors {
    async fn request(&self, ctx: &ExtensionContext<'_>, next: NextRequest<'_>) -> Response {
        let response = next.run(ctx).await;
        self.0.normalize_response(response)
    }

    fn subscribe<'s>(
        &self,
        ctx: &ExtensionContext<'_>,
        stream: BoxStream<'s, Response>,
        next: NextSubscribe<'_>,
    ) -> BoxStream<'s, Response> {
        let normalizer = self.0;
        next.run(ctx, stream)
            .map(move |response| normalizer.normalize_response(response))
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::{ErrorExtensions, Pos};

    fn unclassified() -> ServerError {
        let pos = Some(Pos { line: 1, column: 3 });
        let mut error = ServerError::new("db password is hunter2", pos);
        error.path = vec![async_graphql::PathSegment::Field("a".into())];
        error
    }

    fn classified(api_error: ApiError) -> ServerError {
        api_error
            .into_error()
            .into_server_error(Pos { line: 2, column: 5 })
    }

    #[test]
    fn test_production_masks_unclassified() {
        let normalizer = ErrorNormalizer::new(Mode::Production);
        let masked = normalizer.normalize(unclassified());

        assert_eq!(masked.message, GENERIC_ERROR_MESSAGE);
        assert!(masked.locations.is_empty());
        assert!(masked.path.is_empty());
        assert!(masked.extensions.is_none());
        assert!(masked.source.is_none());
    }

    #[test]
    fn test_production_passes_classified_unchanged() {
        let normalizer = ErrorNormalizer::new(Mode::Production);
        for api_error in [
            ApiError::api("RATE_LIMITED", "slow down"),
            ApiError::authentication("log in first"),
            ApiError::user_input("email is invalid"),
            ApiError::forbidden("not yours"),
            ApiError::authorization("nope"),
        ] {
            let original = classified(api_error);
            let normalized = normalizer.normalize(original.clone());
            assert_eq!(normalized, original);
        }
    }

    fn with_exception(message: &str, name: &str) -> ServerError {
        let name = name.to_string();
        async_graphql::Error::new(message)
            .extend_with(move |_, e| {
                e.set("exception", async_graphql::value!({ "name": name.clone() }))
            })
            .into_server_error(Pos { line: 1, column: 1 })
    }

    #[test]
    fn test_marker_alone_classifies() {
        let error = with_exception("custom auth failure", "AuthorizationError");
        let normalized = ErrorNormalizer::new(Mode::Production).normalize(error.clone());
        assert_eq!(normalized, error);
    }

    #[test]
    fn test_other_exception_names_are_masked() {
        let error = with_exception("boom", "TypeError");
        let normalized = ErrorNormalizer::new(Mode::Production).normalize(error);
        assert_eq!(normalized.message, GENERIC_ERROR_MESSAGE);
    }

    #[test]
    fn test_development_passes_everything() {
        let normalizer = ErrorNormalizer::new(Mode::Development);
        let original = unclassified();
        assert_eq!(normalizer.normalize(original.clone()), original);
    }

    #[test]
    fn test_normalize_response() {
        let mut response = Response::new(Value::Null);
        response.errors = vec![unclassified(), classified(ApiError::forbidden("no"))];

        let response = ErrorNormalizer::new(Mode::Production).normalize_response(response);
        assert_eq!(response.errors[0].message, GENERIC_ERROR_MESSAGE);
        assert_eq!(response.errors[1].message, "no");
    }
}
