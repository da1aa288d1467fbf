use quilt_graphql::{GraphQLConfig, Mode};
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};

/// Name of the single development/production switch.
pub const MODE_ENV_VAR: &str = "QUILT_ENV";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Upstream authentication middleware
    #[serde(default)]
    pub auth: AuthConfig,
    /// Composed GraphQL API
    #[serde(default)]
    pub graphql: GraphQLConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be > 0".into()));
        }
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host must not be empty".into()));
        }
        self.addr()?;
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        if self.auth.jwt_secret.as_deref() == Some("") {
            return Err(ConfigError::Invalid("auth.jwt_secret must not be empty".into()));
        }
        self.graphql.validate().map_err(ConfigError::Invalid)
    }

    /// Listen address. Host names are resolved and the first address wins.
    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        let host = self.server.host.as_str();
        let unresolved =
            || ConfigError::Invalid(format!("server.host {host:?} cannot be resolved"));
        (host, self.server.port)
            .to_socket_addrs()
            .map_err(|_| unresolved())?
            .next()
            .ok_or_else(unresolved)
    }

    /// Writes the mode flag into `graphql.mode`. An unset flag keeps the
    /// configured mode.
    pub fn apply_mode_flag(&mut self, flag: Option<&str>) {
        if let Some(flag) = flag {
            self.graphql.mode = Mode::from_flag(flag);
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// HS256 secret for bearer tokens. Without it every request is anonymous.
    #[serde(default)]
    pub jwt_secret: Option<String>,
}

pub mod loader {
    use super::{AppConfig, ConfigError, MODE_ENV_VAR};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigError> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or("quilt.toml"));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., QUILT__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("QUILT")
                .try_parsing(true)
                .separator("__"),
        );
        let mut merged: AppConfig = builder.build()?.try_deserialize()?;
        merged.apply_mode_flag(std::env::var(MODE_ENV_VAR).ok().as_deref());
        merged.validate()?;
        Ok(merged)
    }
}
