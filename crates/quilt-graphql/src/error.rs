//! Error types for composition and request handling.
//!
//! Composition errors are fatal: no server is assembled when any of them is
//! returned. Request errors are reported to the single client that caused
//! them. Errors raised by resolvers during execution are not represented
//! here; see [`crate::ApiError`] and [`crate::normalizer`].

use std::path::PathBuf;

/// Source label used for the built-in scalar definitions and resolvers.
pub const BUILTIN_SCALARS_SOURCE: &str = "<built-in scalars>";

/// Errors that can occur while composing or serving the GraphQL API.
#[derive(Debug, thiserror::Error)]
pub enum GraphQLError {
    /// The fragments directory cannot be read.
    #[error("fragment directory {path} is unreadable: {source}")]
    FragmentDirectory {
        /// Directory that was scanned.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A fragment file cannot be read.
    #[error("failed to read fragment {path}: {message}")]
    ReadFragment {
        /// File that failed.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// A configured glob pattern is invalid.
    #[error("invalid fragment pattern `{pattern}`: {message}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Description of the failure.
        message: String,
    },

    /// A catalog module does not follow the naming convention of its kind.
    #[error("module {path} is registered as {kind} but does not match {patterns:?}")]
    UnrecognizedModule {
        /// Catalog key of the module.
        path: String,
        /// Declared module kind.
        kind: &'static str,
        /// Patterns the key was matched against.
        patterns: Vec<String>,
    },

    /// A catalog module exported something that is not a valid fragment.
    #[error("module {path} has an invalid shape: {message}")]
    InvalidModuleShape {
        /// Catalog key of the module.
        path: String,
        /// Description of the problem.
        message: String,
    },

    /// A schema fragment is not valid SDL.
    #[error("failed to parse schema fragment {source_name}: {message}")]
    Parse {
        /// Source of the fragment.
        source_name: String,
        /// Parser message.
        message: String,
    },

    /// The same named type is defined by two fragments.
    #[error("type `{name}` is defined in both {first} and {second}")]
    DuplicateType {
        /// Type name.
        name: String,
        /// Source of the first definition.
        first: String,
        /// Source of the conflicting definition.
        second: String,
    },

    /// The same field is defined twice on a merged type.
    #[error("field `{type_name}.{field}` is defined in both {first} and {second}")]
    DuplicateField {
        /// Type name.
        type_name: String,
        /// Field name.
        field: String,
        /// Source of the first definition.
        first: String,
        /// Source of the conflicting definition.
        second: String,
    },

    /// The same directive is defined by two fragments.
    #[error("directive `@{name}` is defined in both {first} and {second}")]
    DuplicateDirective {
        /// Directive name.
        name: String,
        /// Source of the first definition.
        first: String,
        /// Source of the conflicting definition.
        second: String,
    },

    /// More than one `schema { ... }` definition.
    #[error("schema definition appears in both {first} and {second}")]
    DuplicateSchemaDefinition {
        /// Source of the first definition.
        first: String,
        /// Source of the conflicting definition.
        second: String,
    },

    /// An extension targets a type nobody defined.
    #[error("{source_name} extends unknown type `{name}`")]
    UnknownExtension {
        /// Extended type name.
        name: String,
        /// Source of the extension.
        source_name: String,
    },

    /// An extension's kind differs from the extended type's kind.
    #[error("{source_name} extends `{name}` with a different kind of type")]
    ExtensionKindMismatch {
        /// Extended type name.
        name: String,
        /// Source of the extension.
        source_name: String,
    },

    /// The merged schema has no query root type.
    #[error("merged schema does not define the query root type `{0}`")]
    MissingQueryRoot(String),

    /// The execution engine rejected the merged schema.
    #[error("failed to build executable schema: {0}")]
    SchemaBuildFailed(String),

    /// The GraphQL configuration is invalid.
    #[error("invalid GraphQL configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP request could not be turned into a GraphQL request.
    #[error("invalid GraphQL request: {0}")]
    InvalidRequest(String),

    /// A mutation or subscription was sent with GET.
    #[error("{0} operations can only be sent with POST")]
    MethodNotAllowed(String),
}

impl GraphQLError {
    /// Returns the HTTP status code for errors reported to clients.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::MethodNotAllowed(_) => 405,
            _ => 500,
        }
    }

    /// Returns the error code for GraphQL error extensions.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::FragmentDirectory { .. } | Self::ReadFragment { .. } => "FRAGMENT_UNREADABLE",
            Self::InvalidPattern { .. } => "INVALID_PATTERN",
            Self::UnrecognizedModule { .. } | Self::InvalidModuleShape { .. } => "INVALID_MODULE",
            Self::Parse { .. } => "SCHEMA_PARSE_FAILED",
            Self::DuplicateType { .. }
            | Self::DuplicateField { .. }
            | Self::DuplicateDirective { .. }
            | Self::DuplicateSchemaDefinition { .. } => "DUPLICATE_DEFINITION",
            Self::UnknownExtension { .. } | Self::ExtensionKindMismatch { .. } => {
                "INVALID_EXTENSION"
            }
            Self::MissingQueryRoot(_) => "MISSING_QUERY_ROOT",
            Self::SchemaBuildFailed(_) => "SCHEMA_BUILD_FAILED",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidRequest(_) => "BAD_REQUEST",
            Self::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
        }
    }

    /// Returns `true` when the error is a duplicate-definition conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.error_code() == "DUPLICATE_DEFINITION"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(GraphQLError::InvalidRequest("x".into()).status_code(), 400);
        assert_eq!(GraphQLError::SchemaBuildFailed("x".into()).status_code(), 500);
        assert_eq!(GraphQLError::MethodNotAllowed("mutation".into()).status_code(), 405);
    }

    #[test]
    fn test_duplicate_type_names_both_sources() {
        let err = GraphQLError::DuplicateType {
            name: "User".into(),
            first: "a.schema.graphql".into(),
            second: "b.schema.graphql".into(),
        };
        let message = err.to_string();
        assert!(message.contains("a.schema.graphql"));
        assert!(message.contains("b.schema.graphql"));
        assert!(err.is_conflict());
        assert_eq!(err.error_code(), "DUPLICATE_DEFINITION");
    }

    #[test]
    fn test_non_conflicts() {
        assert!(!GraphQLError::MissingQueryRoot("Query".into()).is_conflict());
        assert_eq!(
            GraphQLError::Parse {
                source_name: "x".into(),
                message: "y".into()
            }
            .error_code(),
            "SCHEMA_PARSE_FAILED"
        );
    }
}
