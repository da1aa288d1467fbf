//! Server assembly.
//!
//! [`with_graphql`] runs the whole composition pipeline once, at startup:
//!
//! 1. load fragments ([`FragmentLoader`])
//! 2. merge schema fragments, then directive schemas, then built-in scalars
//! 3. merge resolver fragments, then built-in scalar resolvers
//! 4. compose directives and bind `isAuthenticated`
//! 5. build the executable schema with the context factory and the error
//!    normalizer installed
//! 6. mount the execution and subscription endpoints on the caller's router
//!
//! The result is a [`GraphQLServer`] that is not yet bound to a port. No CORS
//! layer and no health route are added.

use std::future::Future;
use std::iter;
use std::sync::Arc;

use async_graphql::dynamic::Schema;
use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::GraphQLConfig;
use crate::context::ContextFactory;
use crate::directives::{DirectiveRegistry, IsAuthenticatedDirective, compose_directives};
use crate::error::GraphQLError;
use crate::handler::{GraphQLState, graphql_handler, graphql_handler_get, graphql_ws_handler};
use crate::loader::{FragmentLoader, LoadedFragments, ModuleCatalog};
use crate::resolvers::MergedResolverMap;
use crate::schema::{
    ExecutableSchemaBuilder, MergedSchema, builtin_scalar_fragment, builtin_scalar_resolvers,
};

/// The three merged outputs of the composition pipeline.
#[derive(Debug, Clone)]
pub struct Composition {
    /// Merged type definitions.
    pub schema: MergedSchema,
    /// Merged resolvers.
    pub resolvers: MergedResolverMap,
    /// Directive implementations by name.
    pub directives: DirectiveRegistry,
}

impl Composition {
    /// Builds the executable schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the merged schema.
    pub fn executable(
        &self,
        config: &GraphQLConfig,
        context_factory: ContextFactory,
    ) -> Result<Schema, GraphQLError> {
        ExecutableSchemaBuilder::new(&self.schema, &self.resolvers, &self.directives, config)
            .context_factory(context_factory)
            .build()
    }
}

/// Merges loaded fragments together with the built-in scalars and directive.
///
/// # Errors
///
/// Returns an error if the schema fragments conflict or fail to parse.
pub fn compose(
    loaded: &LoadedFragments,
    config: &GraphQLConfig,
) -> Result<Composition, GraphQLError> {
    let scalars = builtin_scalar_fragment();
    let schema = MergedSchema::merge(
        loaded
            .schemas
            .iter()
            .chain(&loaded.directive_schemas)
            .chain(iter::once(&scalars)),
    )?;

    let scalar_resolvers = builtin_scalar_resolvers();
    let resolvers =
        MergedResolverMap::merge(loaded.resolvers.iter().chain(iter::once(&scalar_resolvers)));

    let auth = Arc::new(IsAuthenticatedDirective::from_config(&config.auth));
    let directives = compose_directives(&loaded.directives, auth);

    info!(
        types = schema.type_names().count(),
        resolvers = resolvers.field_count(),
        directives = directives.len(),
        "GraphQL composition complete"
    );

    Ok(Composition {
        schema,
        resolvers,
        directives,
    })
}

/// Attaches a composed GraphQL API to an existing application router.
///
/// `context` holds static extra fields for every request context; fields
/// named `req`, `res`, `headers` or `user` are ignored.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or any composition step
/// fails. No server is assembled in that case.
///
/// # Example
///
/// ```ignore
/// let server = with_graphql(Router::new(), config, &catalog, None)?;
/// let listener = TcpListener::bind("127.0.0.1:8080").await?;
/// server.serve(listener).await?;
/// ```
pub fn with_graphql(
    app: Router,
    config: GraphQLConfig,
    catalog: &ModuleCatalog,
    context: Option<serde_json::Map<String, serde_json::Value>>,
) -> Result<GraphQLServer, GraphQLError> {
    config.validate().map_err(GraphQLError::InvalidConfig)?;

    let loaded = FragmentLoader::from_config(&config).load(catalog)?;
    let composition = compose(&loaded, &config)?;

    let context_factory = ContextFactory::new(context);
    let schema = composition.executable(&config, context_factory.clone())?;
    let config = Arc::new(config);

    let state = GraphQLState {
        schema: schema.clone(),
        context_factory,
        config: Arc::clone(&config),
    };
    let router = app.merge(graphql_router(state));

    info!(
        mode = %config.mode,
        endpoint = %config.endpoint,
        subscription_endpoint = %config.subscription_endpoint,
        console = config.console_enabled(),
        introspection = config.introspection_enabled(),
        "GraphQL server assembled"
    );

    Ok(GraphQLServer {
        router,
        schema,
        config,
    })
}

/// Routes of the execution and subscription endpoints.
pub fn graphql_router(state: GraphQLState) -> Router {
    let endpoint = state.config.endpoint.clone();
    let subscription_endpoint = state.config.subscription_endpoint.clone();

    Router::new()
        .route(&endpoint, get(graphql_handler_get).post(graphql_handler))
        .route(&subscription_endpoint, get(graphql_ws_handler))
        .with_state(state)
}

/// An assembled GraphQL server, not yet listening.
#[derive(Clone)]
pub struct GraphQLServer {
    router: Router,
    schema: Schema,
    config: Arc<GraphQLConfig>,
}

impl GraphQLServer {
    /// The application router with the GraphQL routes mounted.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Consumes the server, returning the router.
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }

    /// The executable schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The GraphQL configuration.
    #[must_use]
    pub fn config(&self) -> &GraphQLConfig {
        &self.config
    }

    /// Transforms the router, e.g. to add authentication or tracing layers.
    #[must_use]
    pub fn map_router(mut self, f: impl FnOnce(Router) -> Router) -> Self {
        self.router = f(self.router);
        self
    }

    /// Serves on `listener` until the process ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        axum::serve(listener, self.router).await
    }

    /// Serves on `listener` until `signal` resolves, then drains open
    /// connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails.
    pub async fn serve_with_shutdown(
        self,
        listener: TcpListener,
        signal: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        axum::serve(listener, self.router)
            .with_graceful_shutdown(signal)
            .await
    }
}
