//! Classified, client-facing errors.
//!
//! Resolvers return [`ApiError`] when a failure is caused by the client and
//! its message is safe to show. [`ApiError::into_error`] keeps it as the
//! error source, which is how the error normalizer recognizes it. Any other
//! error raised during execution is unclassified.

use async_graphql::{ErrorExtensions, Value};

/// Exception name carried by authorization errors in
/// `extensions.exception.name`.
pub const AUTHORIZATION_ERROR_NAME: &str = "AuthorizationError";

/// Classified error kinds.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// Generic API error with a caller-chosen code.
    #[error("{message}")]
    Api {
        /// Machine-readable code placed in `extensions.code`.
        code: String,
        /// Client-facing message.
        message: String,
    },

    /// The request is not authenticated.
    #[error("{0}")]
    Authentication(String),

    /// The client sent invalid input.
    #[error("{message}")]
    UserInput {
        /// Client-facing message.
        message: String,
        /// Optional list of offending argument names.
        invalid_args: Vec<String>,
    },

    /// The caller is authenticated but not allowed to do this.
    #[error("{0}")]
    Forbidden(String),

    /// The caller failed an authorization check.
    #[error("{0}")]
    Authorization(String),
}

impl ApiError {
    /// Creates a generic API error.
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    /// Creates a user input error without argument details.
    pub fn user_input(message: impl Into<String>) -> Self {
        Self::UserInput {
            message: message.into(),
            invalid_args: Vec::new(),
        }
    }

    /// Creates a forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Creates an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization(message.into())
    }

    /// Converts into an engine error carrying the classification extensions.
    #[must_use]
    pub fn into_error(self) -> async_graphql::Error {
        self.extend()
    }

    /// Returns the code placed in `extensions.code`.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Api { code, .. } => code,
            Self::Authentication(_) => "UNAUTHENTICATED",
            Self::UserInput { .. } => "BAD_USER_INPUT",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Authorization(_) => "UNAUTHORIZED",
        }
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> async_graphql::Error {
        let mut error = async_graphql::Error::new_with_source(self.clone());
        let extensions = error.extensions.get_or_insert_with(Default::default);
        extensions.set("code", self.code());
        match self {
            Self::UserInput { invalid_args, .. } if !invalid_args.is_empty() => {
                extensions.set(
                    "invalidArgs",
                    Value::List(invalid_args.iter().cloned().map(Value::String).collect()),
                );
            }
            Self::Authorization(_) => {
                extensions.set(
                    "exception",
                    async_graphql::value!({ "name": AUTHORIZATION_ERROR_NAME }),
                );
            }
            _ => {}
        }
        error
    }
}
