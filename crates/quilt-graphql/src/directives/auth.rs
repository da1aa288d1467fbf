//! The built-in `isAuthenticated` directive.

use futures_util::stream::{self, StreamExt};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use tracing::debug;

use super::{DirectiveSite, SchemaDirective};
use crate::api_error::ApiError;
use crate::config::AuthDirectiveConfig;
use crate::context::RequestContext;
use crate::resolvers::{FieldResolver, SubscriptionResolver};

const NOT_AUTHORIZED: &str = "You are not authorized for this resource";

/// Rejects fields when the request carries no authorization value.
///
/// Without a secret, any non-empty authorization value is accepted. With a
/// secret, the value (optionally prefixed by `Bearer `) must also verify as
/// an HS256 JWT with a valid `exp`.
#[derive(Clone)]
pub struct IsAuthenticatedDirective {
    verifier: Option<(DecodingKey, Validation)>,
}

impl IsAuthenticatedDirective {
    /// Creates the directive. `secret` enables token verification.
    #[must_use]
    pub fn new(secret: Option<&str>) -> Self {
        let verifier = secret.map(|secret| {
            (
                DecodingKey::from_secret(secret.as_bytes()),
                Validation::new(Algorithm::HS256),
            )
        });
        Self { verifier }
    }

    /// Creates the directive from configuration.
    #[must_use]
    pub fn from_config(config: &AuthDirectiveConfig) -> Self {
        Self::new(config.jwt_secret.as_deref())
    }

    /// Checks the context of one request.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Authorization`] when the authorization value is
    /// missing, empty, or fails verification.
    pub fn check(&self, context: &RequestContext) -> Result<(), ApiError> {
        let token = context
            .headers
            .authorization
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ApiError::authorization(NOT_AUTHORIZED))?;

        if let Some((key, validation)) = &self.verifier {
            let token = token.strip_prefix("Bearer ").unwrap_or(token);
            decode::<serde_json::Value>(token, key, validation).map_err(|e| {
                debug!(error = %e, "Authorization token rejected");
                ApiError::authorization(NOT_AUTHORIZED)
            })?;
        }
        Ok(())
    }
}

impl SchemaDirective for IsAuthenticatedDirective {
    fn wrap_field(&self, resolver: FieldResolver, _site: &DirectiveSite) -> FieldResolver {
        let directive = self.clone();
        FieldResolver::new(move |input| {
            let checked = directive.check(&input.context);
            let resolver = resolver.clone();
            async move {
                checked.map_err(ApiError::into_error)?;
                resolver.call(input).await
            }
        })
    }

    fn wrap_subscription(
        &self,
        resolver: SubscriptionResolver,
        _site: &DirectiveSite,
    ) -> SubscriptionResolver {
        let directive = self.clone();
        SubscriptionResolver::new(move |input| match directive.check(&input.context) {
            Ok(()) => resolver.call(input),
            Err(e) => stream::once(async move { Err(e.into_error()) }).boxed(),
        })
    }
}
