//! # quilt-graphql
//!
//! Composes one executable GraphQL server from independently authored
//! pieces scattered across a source tree.
//!
//! ## Overview
//!
//! Schema fragments (`*.schema.graphql`) and directive definitions
//! (`*.directive.graphql`) are discovered on disk. Resolver and directive
//! implementation modules are registered in a [`ModuleCatalog`] under their
//! source paths. At startup everything is merged once:
//!
//! - type definitions merge strictly: a type defined twice is fatal
//! - resolvers merge last-write-wins, in fragment order
//! - directive implementations merge last-write-wins, and `isAuthenticated`
//!   is always bound to the built-in [`IsAuthenticatedDirective`]
//!
//! The merged outputs become an async-graphql dynamic schema served over
//! axum, with per-request [`RequestContext`] construction and production-safe
//! error normalization.
//!
//! ## Endpoints
//!
//! - `POST /graphql` - Execute an operation
//! - `GET /graphql` - Execute via URL params, or GraphiQL in development
//! - `GET /graphql/ws` - Subscriptions over WebSocket
//!
//! ## Configuration
//!
//! Add to `quilt.toml`:
//!
//! ```toml
//! [graphql]
//! mode = "production"
//! fragments_dir = "graph"
//! max_depth = 15
//! max_complexity = 500
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Configuration options
//! - [`loader`] - Fragment discovery and the module catalog
//! - [`schema`] - Schema merging, built-in scalars, executable schema
//! - [`resolvers`] - Resolver fragments and merging
//! - [`directives`] - Directive implementations and composition
//! - [`context`] - Per-request execution context
//! - [`api_error`] - Classified, client-facing errors
//! - [`normalizer`] - Error masking for production
//! - [`handler`] - Axum HTTP handlers
//! - [`server`] - Server assembly
//! - [`error`] - Composition and request errors

pub mod api_error;
pub mod config;
pub mod context;
pub mod directives;
pub mod error;
pub mod handler;
pub mod loader;
pub mod normalizer;
pub mod resolvers;
pub mod schema;
pub mod server;

// Re-export main types
pub use api_error::ApiError;
pub use config::{AuthDirectiveConfig, FragmentPatterns, GraphQLConfig, Mode};
pub use context::{
    AuthHeaders, AuthenticatedUser, ContextFactory, RequestContext, RequestInfo, ResponseHandle,
};
pub use directives::{
    DirectiveFragment, DirectiveMap, DirectiveRegistry, DirectiveSite, IsAuthenticatedDirective,
    SchemaDirective, compose_directives,
};
pub use error::GraphQLError;
pub use handler::GraphQLState;
pub use loader::{FragmentLoader, LoadedFragments, ModuleCatalog, SchemaFragment};
pub use normalizer::ErrorNormalizer;
pub use resolvers::{
    FieldResolver, MergedResolverMap, ResolverFragment, ResolverInput, ResolverMap,
    ScalarResolver, SubscriptionResolver,
};
pub use schema::{ExecutableSchemaBuilder, MergedSchema};
pub use server::{Composition, GraphQLServer, compose, with_graphql};

/// Result type for GraphQL operations.
pub type Result<T> = std::result::Result<T, GraphQLError>;
