//! Explicit manifest of resolver and directive modules.
//!
//! Executable modules cannot be discovered on disk at run time, so each
//! module registers itself under its source path (normally `file!()`). The
//! loader applies the configured resolver and directive globs to those keys
//! and rejects modules that do not follow the naming convention of their
//! kind, or that export something that is not a valid fragment.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::directives::{DirectiveFragment, DirectiveMap};
use crate::error::GraphQLError;
use crate::resolvers::{ResolverFragment, ResolverMap, TypeResolvers};

/// GraphQL name: `/[_A-Za-z][_0-9A-Za-z]*/`.
static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[_A-Za-z][_0-9A-Za-z]*$").expect("Invalid name regex"));

type ResolverModule = Arc<dyn Fn() -> ResolverMap + Send + Sync>;
type DirectiveModule = Arc<dyn Fn() -> DirectiveMap + Send + Sync>;

/// Kind of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Exports a [`ResolverMap`].
    Resolvers,
    /// Exports a [`DirectiveMap`].
    Directives,
}

impl ModuleKind {
    /// Human-readable name used in errors and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolvers => "resolver module",
            Self::Directives => "directive module",
        }
    }
}

#[derive(Clone)]
enum ModuleExport {
    Resolvers(ResolverModule),
    Directives(DirectiveModule),
}

#[derive(Clone)]
struct ModuleEntry {
    path: String,
    export: ModuleExport,
}

/// Registered resolver and directive modules.
///
/// # Example
///
/// ```ignore
/// let catalog = ModuleCatalog::new()
///     .resolvers(users_resolvers::PATH, users_resolvers::resolvers)
///     .directives(upper_directive::PATH, upper_directive::directives);
/// ```
#[derive(Clone, Default)]
pub struct ModuleCatalog {
    entries: Vec<ModuleEntry>,
}

impl ModuleCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resolver module.
    #[must_use]
    pub fn resolvers<F>(mut self, path: impl Into<String>, module: F) -> Self
    where
        F: Fn() -> ResolverMap + Send + Sync + 'static,
    {
        self.entries.push(ModuleEntry {
            path: normalize_key(path.into()),
            export: ModuleExport::Resolvers(Arc::new(module)),
        });
        self
    }

    /// Registers a directive implementation module.
    #[must_use]
    pub fn directives<F>(mut self, path: impl Into<String>, module: F) -> Self
    where
        F: Fn() -> DirectiveMap + Send + Sync + 'static,
    {
        self.entries.push(ModuleEntry {
            path: normalize_key(path.into()),
            export: ModuleExport::Directives(Arc::new(module)),
        });
        self
    }

    /// Number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no module is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys and kinds of the registered modules, in key order.
    #[must_use]
    pub fn modules(&self) -> Vec<(&str, ModuleKind)> {
        let mut modules: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (entry.path.as_str(), entry.kind()))
            .collect();
        modules.sort_by(|a, b| a.0.cmp(b.0));
        modules
    }

    /// Entries sorted by key. Entries with equal keys keep registration
    /// order.
    fn sorted(&self) -> Vec<&ModuleEntry> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    /// Instantiates every resolver module, in key order.
    ///
    /// `matches` decides whether a key follows the resolver naming
    /// convention.
    pub(crate) fn resolver_fragments(
        &self,
        matches: impl Fn(&str) -> bool,
        patterns: &[String],
    ) -> Result<Vec<ResolverFragment>, GraphQLError> {
        let mut fragments = Vec::new();
        for entry in self.sorted() {
            let ModuleExport::Resolvers(module) = &entry.export else {
                continue;
            };
            entry.check_key(&matches, patterns)?;
            let map = module();
            validate_resolver_map(&entry.path, &map)?;
            fragments.push(ResolverFragment::new(entry.path.clone(), map));
        }
        Ok(fragments)
    }

    /// Instantiates every directive module, in key order.
    pub(crate) fn directive_fragments(
        &self,
        matches: impl Fn(&str) -> bool,
        patterns: &[String],
    ) -> Result<Vec<DirectiveFragment>, GraphQLError> {
        let mut fragments = Vec::new();
        for entry in self.sorted() {
            let ModuleExport::Directives(module) = &entry.export else {
                continue;
            };
            entry.check_key(&matches, patterns)?;
            let map = module();
            for (name, _) in map.iter() {
                if !is_valid_name(name) {
                    return Err(invalid_shape(
                        &entry.path,
                        format!("`{name}` is not a valid directive name"),
                    ));
                }
            }
            fragments.push(DirectiveFragment::new(entry.path.clone(), map));
        }
        Ok(fragments)
    }
}

impl ModuleEntry {
    fn kind(&self) -> ModuleKind {
        match self.export {
            ModuleExport::Resolvers(_) => ModuleKind::Resolvers,
            ModuleExport::Directives(_) => ModuleKind::Directives,
        }
    }

    fn check_key(
        &self,
        matches: &impl Fn(&str) -> bool,
        patterns: &[String],
    ) -> Result<(), GraphQLError> {
        if matches(&self.path) {
            Ok(())
        } else {
            Err(GraphQLError::UnrecognizedModule {
                path: self.path.clone(),
                kind: self.kind().as_str(),
                patterns: patterns.to_vec(),
            })
        }
    }
}

impl fmt::Debug for ModuleCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.modules()).finish()
    }
}

/// Returns `true` for a valid GraphQL name.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    NAME_REGEX.is_match(name)
}

fn validate_resolver_map(path: &str, map: &ResolverMap) -> Result<(), GraphQLError> {
    if map.is_empty() {
        return Err(invalid_shape(path, "module exports no types".to_string()));
    }
    for (type_name, entry) in map.iter() {
        if !is_valid_name(type_name) {
            return Err(invalid_shape(
                path,
                format!("`{type_name}` is not a valid type name"),
            ));
        }
        if let TypeResolvers::Fields(fields) = entry {
            if fields.is_empty() {
                return Err(invalid_shape(
                    path,
                    format!("type `{type_name}` has no field resolvers"),
                ));
            }
            if let Some(field) = fields.keys().find(|field| !is_valid_name(field)) {
                return Err(invalid_shape(
                    path,
                    format!("`{type_name}.{field}` is not a valid field name"),
                ));
            }
        }
    }
    Ok(())
}

fn invalid_shape(path: &str, message: String) -> GraphQLError {
    GraphQLError::InvalidModuleShape {
        path: path.to_string(),
        message,
    }
}

/// Keys use `/` separators so the same globs work on every platform.
fn normalize_key(path: String) -> String {
    path.replace('\\', "/")
}
