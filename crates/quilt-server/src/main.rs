use std::env;

use anyhow::Context;
use axum::{Router, middleware};
use quilt_graphql::{GraphQLServer, with_graphql};
use quilt_server::config::AppConfig;
use quilt_server::config::loader::load_config;
use quilt_server::{AuthState, authentication_middleware, graph, observability};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From QUILT_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (quilt.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (QUILT_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        let not_found = matches!(
            e,
            dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound
        );
        if !not_found {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    observability::init_tracing();

    let (config_path, source) = resolve_config_path();

    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        path = %config_path,
        source = %source,
        mode = %cfg.graphql.mode,
        "Configuration loaded"
    );

    observability::apply_logging_level(&cfg.logging.level);

    let server = match build_server(&cfg) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Server initialization failed: {e}");
            std::process::exit(2);
        }
    };

    if let Err(err) = run(server, &cfg).await {
        eprintln!("Server error: {err:#}");
        std::process::exit(1);
    }
}

/// Composes the GraphQL API and wraps it in authentication and tracing.
fn build_server(cfg: &AppConfig) -> Result<GraphQLServer, quilt_graphql::GraphQLError> {
    let server = with_graphql(Router::new(), cfg.graphql.clone(), &graph::catalog(), None)?;

    let auth = cfg.auth.jwt_secret.as_deref().map(AuthState::new);
    if auth.is_none() {
        tracing::warn!("auth.jwt_secret is not set; every request is anonymous");
    }

    Ok(server.map_router(|router| {
        let router = match auth {
            Some(state) => {
                router.layer(middleware::from_fn_with_state(state, authentication_middleware))
            }
            None => router,
        };
        router.layer(TraceLayer::new_for_http())
    }))
}

async fn run(server: GraphQLServer, cfg: &AppConfig) -> anyhow::Result<()> {
    let addr = cfg.addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        %addr,
        endpoint = %server.config().endpoint,
        subscription_endpoint = %server.config().subscription_endpoint,
        "Quilt server listening"
    );

    server
        .serve_with_shutdown(listener, shutdown_signal())
        .await
        .context("server terminated unexpectedly")
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: QUILT_CONFIG
/// 3. Default: quilt.toml
fn resolve_config_path() -> (String, ConfigSource) {
    // 1. Check CLI: --config <path>
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (path, ConfigSource::CliArgument);
            }
        }
    }

    // 2. Check environment variable
    if let Ok(path) = env::var("QUILT_CONFIG") {
        if !path.is_empty() {
            return (path, ConfigSource::EnvironmentVariable);
        }
    }

    // 3. Default to quilt.toml
    ("quilt.toml".to_string(), ConfigSource::Default)
}
