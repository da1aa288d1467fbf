//! Schema merging and executable schema building.
//!
//! ## Components
//!
//! - [`MergedSchema`] - One logical schema assembled from SDL fragments
//! - [`ExecutableSchemaBuilder`] - Binds merged types, resolvers and
//!   directives into an async-graphql dynamic schema
//! - [`BUILTIN_SCALARS`] - Custom scalars appended to every composition

mod builder;
mod merger;
mod scalars;

pub use builder::ExecutableSchemaBuilder;
pub use merger::{MergedSchema, MergedType, RootTypes};
pub use scalars::{
    BUILTIN_SCALARS, BuiltinScalar, builtin_scalar_fragment, builtin_scalar_resolvers,
    builtin_scalar_sdl,
};
