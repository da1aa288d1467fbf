//! Resolver and directive modules of the demo fragment tree.
//!
//! The SDL half of the tree lives in `crates/quilt-server/graph/`. Modules
//! are registered under their own source path, so the catalog keys follow
//! the `*_resolvers.rs` and `*_directive.rs` conventions.

pub mod greeting_resolvers;
pub mod ticks_resolvers;
pub mod upper_directive;
pub mod users_resolvers;

use quilt_graphql::ModuleCatalog;

/// Every module of the demo tree.
pub fn catalog() -> ModuleCatalog {
    ModuleCatalog::new()
        .resolvers(greeting_resolvers::PATH, greeting_resolvers::resolvers)
        .resolvers(users_resolvers::PATH, users_resolvers::resolvers)
        .resolvers(ticks_resolvers::PATH, ticks_resolvers::resolvers)
        .directives(upper_directive::PATH, upper_directive::directives)
}
