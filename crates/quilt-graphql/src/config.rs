//! GraphQL configuration.
//!
//! This module provides configuration options for the composition pipeline
//! and the HTTP surface. Configuration can be specified in `quilt.toml` under
//! the `[graphql]` section.
//!
//! # Example Configuration
//!
//! ```toml
//! [graphql]
//! mode = "development"
//! fragments_dir = "graph"
//! endpoint = "/graphql"
//! subscription_endpoint = "/graphql/ws"
//! max_depth = 15
//! max_complexity = 500
//!
//! [graphql.patterns]
//! schemas = ["**/*.schema.graphql"]
//! directive_schemas = ["**/*.directive.graphql"]
//! ```

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Development/production switch.
///
/// Only the exact value `development` (case-insensitive) selects development
/// behavior; every other value means production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Mode {
    /// Unmasked errors and the interactive console.
    Development,
    /// Masked errors, no console.
    #[default]
    Production,
}

impl Mode {
    /// Interprets a raw flag value such as the `QUILT_ENV` variable.
    #[must_use]
    pub fn from_flag(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("development") {
            Self::Development
        } else {
            Self::Production
        }
    }

    /// Returns `true` in development mode.
    #[must_use]
    pub fn is_development(self) -> bool {
        self == Self::Development
    }
}

impl From<String> for Mode {
    fn from(value: String) -> Self {
        Self::from_flag(&value)
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Glob patterns for the four fragment scans.
///
/// Patterns use gitignore syntax and are matched relative to the fragments
/// directory (schema scans) or against module catalog keys (module scans).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentPatterns {
    /// Schema fragments.
    #[serde(default = "default_schema_patterns")]
    pub schemas: Vec<String>,

    /// Directive schema fragments (directive definitions in SDL).
    #[serde(default = "default_directive_schema_patterns")]
    pub directive_schemas: Vec<String>,

    /// Resolver modules registered in the module catalog.
    #[serde(default = "default_resolver_patterns")]
    pub resolvers: Vec<String>,

    /// Directive implementation modules registered in the module catalog.
    #[serde(default = "default_directive_patterns")]
    pub directives: Vec<String>,
}

fn default_schema_patterns() -> Vec<String> {
    vec!["**/*.schema.graphql".into()]
}

fn default_directive_schema_patterns() -> Vec<String> {
    vec!["**/*.directive.graphql".into()]
}

fn default_resolver_patterns() -> Vec<String> {
    vec!["**/*_resolvers.rs".into()]
}

fn default_directive_patterns() -> Vec<String> {
    vec!["**/*_directive.rs".into()]
}

impl Default for FragmentPatterns {
    fn default() -> Self {
        Self {
            schemas: default_schema_patterns(),
            directive_schemas: default_directive_schema_patterns(),
            resolvers: default_resolver_patterns(),
            directives: default_directive_patterns(),
        }
    }
}

/// Settings for the built-in `isAuthenticated` directive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthDirectiveConfig {
    /// HS256 secret. When set, the authorization value must verify as a JWT;
    /// otherwise its presence is enough.
    #[serde(default)]
    pub jwt_secret: Option<String>,
}

/// GraphQL API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQLConfig {
    /// Development or production behavior.
    /// Default: production
    #[serde(default)]
    pub mode: Mode,

    /// Root of the schema fragment tree.
    /// Default: `graph`
    #[serde(default = "default_fragments_dir")]
    pub fragments_dir: PathBuf,

    /// Glob patterns for fragment discovery.
    #[serde(default)]
    pub patterns: FragmentPatterns,

    /// Path of the execution endpoint.
    /// Default: `/graphql`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Path of the subscription (WebSocket) endpoint.
    /// Default: `/graphql/ws`
    #[serde(default = "default_subscription_endpoint")]
    pub subscription_endpoint: String,

    /// Maximum query depth allowed.
    /// Default: 15
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum query complexity allowed.
    /// Default: 500
    #[serde(default = "default_max_complexity")]
    pub max_complexity: usize,

    /// Explicit introspection switch. When unset, introspection follows the
    /// mode (enabled only in development).
    #[serde(default)]
    pub introspection: Option<bool>,

    /// Maximum accepted request body size.
    /// Default: 1 MiB
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Built-in authorization directive settings.
    #[serde(default)]
    pub auth: AuthDirectiveConfig,
}

fn default_fragments_dir() -> PathBuf {
    PathBuf::from("graph")
}

fn default_endpoint() -> String {
    "/graphql".into()
}

fn default_subscription_endpoint() -> String {
    "/graphql/ws".into()
}

fn default_max_depth() -> usize {
    15
}

fn default_max_complexity() -> usize {
    500
}

fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for GraphQLConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            fragments_dir: default_fragments_dir(),
            patterns: FragmentPatterns::default(),
            endpoint: default_endpoint(),
            subscription_endpoint: default_subscription_endpoint(),
            max_depth: default_max_depth(),
            max_complexity: default_max_complexity(),
            introspection: None,
            body_limit_bytes: default_body_limit(),
            auth: AuthDirectiveConfig::default(),
        }
    }
}

impl GraphQLConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration values are invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_depth == 0 {
            return Err("graphql.max_depth must be > 0".into());
        }
        if self.max_complexity == 0 {
            return Err("graphql.max_complexity must be > 0".into());
        }
        if self.body_limit_bytes == 0 {
            return Err("graphql.body_limit_bytes must be > 0".into());
        }
        if !self.endpoint.starts_with('/') {
            return Err("graphql.endpoint must start with '/'".into());
        }
        if !self.subscription_endpoint.starts_with('/') {
            return Err("graphql.subscription_endpoint must start with '/'".into());
        }
        if self.endpoint == self.subscription_endpoint {
            return Err("graphql.endpoint and graphql.subscription_endpoint must differ".into());
        }
        let patterns = &self.patterns;
        for (name, list) in [
            ("schemas", &patterns.schemas),
            ("directive_schemas", &patterns.directive_schemas),
            ("resolvers", &patterns.resolvers),
            ("directives", &patterns.directives),
        ] {
            if list.is_empty() {
                return Err(format!("graphql.patterns.{name} must not be empty"));
            }
        }
        Ok(())
    }

    /// Whether introspection queries are answered.
    #[must_use]
    pub fn introspection_enabled(&self) -> bool {
        self.introspection.unwrap_or(self.mode.is_development())
    }

    /// Whether the interactive query console is served.
    #[must_use]
    pub fn console_enabled(&self) -> bool {
        self.mode.is_development()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GraphQLConfig::default();
        assert_eq!(config.mode, Mode::Production);
        assert_eq!(config.endpoint, "/graphql");
        assert_eq!(config.subscription_endpoint, "/graphql/ws");
        assert_eq!(config.max_depth, 15);
        assert_eq!(config.max_complexity, 500);
        assert!(!config.introspection_enabled());
        assert!(!config.console_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mode_flag() {
        assert_eq!(Mode::from_flag("development"), Mode::Development);
        assert_eq!(Mode::from_flag(" Development "), Mode::Development);
        assert_eq!(Mode::from_flag("production"), Mode::Production);
        assert_eq!(Mode::from_flag("staging"), Mode::Production);
        assert_eq!(Mode::from_flag(""), Mode::Production);
    }

    #[test]
    fn test_development_enables_console_and_introspection() {
        let config = GraphQLConfig {
            mode: Mode::Development,
            ..GraphQLConfig::default()
        };
        assert!(config.console_enabled());
        assert!(config.introspection_enabled());
    }

    #[test]
    fn test_introspection_override() {
        let config = GraphQLConfig {
            introspection: Some(true),
            ..GraphQLConfig::default()
        };
        assert!(config.introspection_enabled());
        assert!(!config.console_enabled());
    }

    #[test]
    fn test_invalid_endpoints() {
        let mut config = GraphQLConfig::default();
        config.endpoint = "graphql".into();
        assert!(config.validate().is_err());

        let mut config = GraphQLConfig::default();
        config.subscription_endpoint = "/graphql".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_limits() {
        let mut config = GraphQLConfig::default();
        config.max_depth = 0;
        assert!(config.validate().is_err());

        let mut config = GraphQLConfig::default();
        config.max_complexity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_pattern_list() {
        let mut config = GraphQLConfig::default();
        config.patterns.resolvers.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_from_toml() {
        let toml = r#"
            mode = "development"
            fragments_dir = "api/graph"
            max_depth = 20

            [patterns]
            schemas = ["**/*.graphql"]

            [auth]
            jwt_secret = "s3cret"
        "#;

        let config: GraphQLConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.mode, Mode::Development);
        assert_eq!(config.fragments_dir, PathBuf::from("api/graph"));
        assert_eq!(config.max_depth, 20);
        assert_eq!(config.patterns.schemas, vec!["**/*.graphql".to_string()]);
        assert_eq!(
            config.patterns.directive_schemas,
            vec!["**/*.directive.graphql".to_string()]
        );
        assert_eq!(config.auth.jwt_secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_unknown_mode_is_production() {
        let config: GraphQLConfig = toml::from_str(r#"mode = "qa""#).unwrap();
        assert_eq!(config.mode, Mode::Production);
    }
}
