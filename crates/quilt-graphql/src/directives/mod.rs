//! Schema directive implementations and the directive registry.
//!
//! A directive implementation is anything implementing [`SchemaDirective`]:
//! it receives the resolver of an annotated field and returns a resolver that
//! wraps it. Implementations are exported by directive modules in the
//! [`ModuleCatalog`](crate::loader::ModuleCatalog), merged last-write-wins by
//! [`compose_directives`], and then `isAuthenticated` is bound to the
//! built-in [`IsAuthenticatedDirective`].

mod auth;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_graphql::{Name, Value};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::resolvers::{FieldResolver, SubscriptionResolver};

pub use auth::IsAuthenticatedDirective;

/// Name the built-in authorization directive is always bound to.
pub const IS_AUTHENTICATED: &str = "isAuthenticated";

/// Where a directive was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveLocation {
    /// On an object type; applies to all its fields.
    Object,
    /// On a single field definition.
    FieldDefinition,
}

/// One application of a directive to a field.
#[derive(Debug, Clone)]
pub struct DirectiveSite {
    /// Directive name, without `@`.
    pub directive: String,

    /// Type owning the field.
    pub type_name: String,

    /// Field being wrapped.
    pub field_name: String,

    /// Whether the directive was written on the type or on the field.
    pub location: DirectiveLocation,

    /// Directive arguments, with defaults from the directive definition
    /// filled in.
    pub arguments: IndexMap<Name, Value>,
}

impl DirectiveSite {
    /// Returns an argument by name.
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }
}

/// A directive implementation.
pub trait SchemaDirective: Send + Sync {
    /// Wraps the resolver of an annotated query, mutation or object field.
    fn wrap_field(&self, resolver: FieldResolver, site: &DirectiveSite) -> FieldResolver;

    /// Wraps the resolver of an annotated subscription field.
    ///
    /// The default leaves subscriptions untouched.
    fn wrap_subscription(
        &self,
        resolver: SubscriptionResolver,
        _site: &DirectiveSite,
    ) -> SubscriptionResolver {
        resolver
    }
}

/// Shared handle to a directive implementation.
pub type DynDirective = Arc<dyn SchemaDirective>;

/// Directive implementations exported by one directive module.
#[derive(Clone, Default)]
pub struct DirectiveMap {
    entries: IndexMap<String, DynDirective>,
}

impl DirectiveMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an implementation under `name`.
    #[must_use]
    pub fn directive(mut self, name: &str, directive: impl SchemaDirective + 'static) -> Self {
        self.entries.insert(name.to_string(), Arc::new(directive));
        self
    }

    /// Registers an already shared implementation.
    #[must_use]
    pub fn shared(mut self, name: &str, directive: DynDirective) -> Self {
        self.entries.insert(name.to_string(), directive);
        self
    }

    /// Iterates over registrations in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DynDirective)> {
        self.entries.iter().map(|(name, d)| (name.as_str(), d))
    }

    /// Number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for DirectiveMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

/// A directive map tagged with the module it came from.
#[derive(Debug, Clone)]
pub struct DirectiveFragment {
    /// Catalog key of the module.
    pub source: String,
    /// The module's directives.
    pub map: DirectiveMap,
}

impl DirectiveFragment {
    /// Creates a fragment.
    pub fn new(source: impl Into<String>, map: DirectiveMap) -> Self {
        Self {
            source: source.into(),
            map,
        }
    }
}

/// Name to implementation mapping used when building the executable schema.
#[derive(Clone, Default)]
pub struct DirectiveRegistry {
    entries: IndexMap<String, DynDirective>,
    sources: HashMap<String, String>,
}

impl DirectiveRegistry {
    /// Returns the implementation bound to `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DynDirective> {
        self.entries.get(name)
    }

    /// Returns `true` if `name` is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the module that provided `name`.
    #[must_use]
    pub fn source_of(&self, name: &str) -> Option<&str> {
        self.sources.get(name).map(String::as_str)
    }

    /// Bound names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of bound names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no name is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn bind(&mut self, name: &str, directive: DynDirective, source: &str) {
        self.entries.insert(name.to_string(), directive);
        self.sources.insert(name.to_string(), source.to_string());
    }
}

impl fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.keys().map(|name| (name, self.sources.get(name))))
            .finish()
    }
}

/// Source label of the built-in authorization directive.
pub const BUILTIN_DIRECTIVE_SOURCE: &str = "<built-in directives>";

/// Merges on-disk directive fragments and binds `isAuthenticated`.
///
/// On a name collision the later fragment wins. Whatever the fragments
/// contain, `isAuthenticated` ends up bound to `auth`.
#[must_use]
pub fn compose_directives<'a>(
    fragments: impl IntoIterator<Item = &'a DirectiveFragment>,
    auth: DynDirective,
) -> DirectiveRegistry {
    let mut registry = DirectiveRegistry::default();

    for fragment in fragments {
        for (name, directive) in fragment.map.iter() {
            if let Some(previous) = registry.source_of(name) {
                warn!(
                    directive = name,
                    previous,
                    source = %fragment.source,
                    "Directive implementation overridden"
                );
            }
            registry.bind(name, Arc::clone(directive), &fragment.source);
        }
    }

    if let Some(previous) = registry.source_of(IS_AUTHENTICATED) {
        warn!(
            directive = IS_AUTHENTICATED,
            previous, "Built-in directive replaces module implementation"
        );
    }
    registry.bind(IS_AUTHENTICATED, auth, BUILTIN_DIRECTIVE_SOURCE);

    debug!(count = registry.len(), "Directive registry composed");
    registry
}
