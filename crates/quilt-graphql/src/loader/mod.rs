//! Fragment discovery.
//!
//! Four independent scans produce the inputs of composition:
//!
//! | scan                | source                       | default pattern          |
//! |---------------------|------------------------------|--------------------------|
//! | schema fragments    | files under `fragments_dir`  | `**/*.schema.graphql`    |
//! | directive schemas   | files under `fragments_dir`  | `**/*.directive.graphql` |
//! | resolver modules    | [`ModuleCatalog`] keys       | `**/*_resolvers.rs`      |
//! | directive modules   | [`ModuleCatalog`] keys       | `**/*_directive.rs`      |
//!
//! Every scan returns its fragments in lexicographic path order. Schema text
//! is not validated here; parsing happens in the schema merger.

mod catalog;

use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use ignore::overrides::{Override, OverrideBuilder};
use tracing::{debug, info};

use crate::config::{FragmentPatterns, GraphQLConfig};
use crate::directives::DirectiveFragment;
use crate::error::GraphQLError;
use crate::resolvers::ResolverFragment;

pub use catalog::{ModuleCatalog, ModuleKind, is_valid_name};

/// Schema text and the file it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaFragment {
    /// Path relative to the fragments directory, with `/` separators.
    pub source: String,
    /// SDL text.
    pub sdl: String,
}

impl SchemaFragment {
    /// Creates a fragment.
    pub fn new(source: impl Into<String>, sdl: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            sdl: sdl.into(),
        }
    }
}

/// Output of all four scans.
#[derive(Debug, Clone, Default)]
pub struct LoadedFragments {
    /// Type definition fragments.
    pub schemas: Vec<SchemaFragment>,
    /// Directive definition fragments.
    pub directive_schemas: Vec<SchemaFragment>,
    /// Resolver modules.
    pub resolvers: Vec<ResolverFragment>,
    /// Directive implementation modules.
    pub directives: Vec<DirectiveFragment>,
}

/// Scans a fragments directory and a module catalog.
#[derive(Debug, Clone)]
pub struct FragmentLoader {
    root: PathBuf,
    patterns: FragmentPatterns,
}

impl FragmentLoader {
    /// Creates a loader rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, patterns: FragmentPatterns) -> Self {
        Self {
            root: root.into(),
            patterns,
        }
    }

    /// Creates a loader from the GraphQL configuration.
    #[must_use]
    pub fn from_config(config: &GraphQLConfig) -> Self {
        Self::new(config.fragments_dir.clone(), config.patterns.clone())
    }

    /// Root of the fragments directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Runs all four scans.
    ///
    /// # Errors
    ///
    /// Returns an error if the fragments directory or a fragment file cannot
    /// be read, a pattern is invalid, or a catalog module is rejected.
    pub fn load(&self, catalog: &ModuleCatalog) -> Result<LoadedFragments, GraphQLError> {
        let loaded = LoadedFragments {
            schemas: self.load_schemas()?,
            directive_schemas: self.load_directive_schemas()?,
            resolvers: self.load_resolvers(catalog)?,
            directives: self.load_directives(catalog)?,
        };

        info!(
            root = %self.root.display(),
            schemas = loaded.schemas.len(),
            directive_schemas = loaded.directive_schemas.len(),
            resolvers = loaded.resolvers.len(),
            directives = loaded.directives.len(),
            "Fragments loaded"
        );
        Ok(loaded)
    }

    /// Loads schema fragments.
    ///
    /// # Errors
    ///
    /// See [`FragmentLoader::load`].
    pub fn load_schemas(&self) -> Result<Vec<SchemaFragment>, GraphQLError> {
        self.scan(&self.patterns.schemas)
    }

    /// Loads directive schema fragments.
    ///
    /// # Errors
    ///
    /// See [`FragmentLoader::load`].
    pub fn load_directive_schemas(&self) -> Result<Vec<SchemaFragment>, GraphQLError> {
        self.scan(&self.patterns.directive_schemas)
    }

    /// Instantiates resolver modules whose keys match the resolver patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if a resolver module's key does not match, or its
    /// export is not a valid resolver map.
    pub fn load_resolvers(
        &self,
        catalog: &ModuleCatalog,
    ) -> Result<Vec<ResolverFragment>, GraphQLError> {
        let matcher = build_matcher(Path::new("."), &self.patterns.resolvers)?;
        catalog.resolver_fragments(|key| is_match(&matcher, key), &self.patterns.resolvers)
    }

    /// Instantiates directive modules whose keys match the directive
    /// patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if a directive module's key does not match, or it
    /// exports an invalid directive name.
    pub fn load_directives(
        &self,
        catalog: &ModuleCatalog,
    ) -> Result<Vec<DirectiveFragment>, GraphQLError> {
        let matcher = build_matcher(Path::new("."), &self.patterns.directives)?;
        catalog.directive_fragments(|key| is_match(&matcher, key), &self.patterns.directives)
    }

    fn scan(&self, patterns: &[String]) -> Result<Vec<SchemaFragment>, GraphQLError> {
        let metadata =
            fs::metadata(&self.root).map_err(|source| GraphQLError::FragmentDirectory {
                path: self.root.clone(),
                source,
            })?;
        if !metadata.is_dir() {
            return Err(GraphQLError::FragmentDirectory {
                path: self.root.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
            });
        }

        let matcher = build_matcher(&self.root, patterns)?;
        let walker = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .follow_links(true)
            .sort_by_file_path(|a, b| a.cmp(b))
            .build();

        let mut fragments = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| GraphQLError::ReadFragment {
                path: self.root.clone(),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            if !matcher.matched(relative, false).is_whitelist() {
                continue;
            }

            let sdl = fs::read_to_string(path).map_err(|e| GraphQLError::ReadFragment {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            let source = relative.to_string_lossy().replace('\\', "/");
            debug!(source = %source, bytes = sdl.len(), "Schema fragment found");
            fragments.push(SchemaFragment { source, sdl });
        }

        fragments.sort_by(|a, b| a.source.cmp(&b.source));
        Ok(fragments)
    }
}

/// Builds a gitignore-style matcher; paths are matched relative to `root`.
fn build_matcher(root: &Path, patterns: &[String]) -> Result<Override, GraphQLError> {
    let mut builder = OverrideBuilder::new(root);
    for pattern in patterns {
        builder
            .add(pattern)
            .map_err(|e| GraphQLError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
    }
    builder.build().map_err(|e| GraphQLError::InvalidPattern {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })
}

fn is_match(matcher: &Override, key: &str) -> bool {
    matcher.matched(Path::new(key), false).is_whitelist()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolvers::{FieldResolver, ResolverMap};
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, contents: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "users/users.schema.graphql", "type User { id: ID! }");
        write(dir.path(), "a.schema.graphql", "type Query { a: String }");
        write(
            dir.path(),
            "auth/auth.directive.graphql",
            "directive @isAuthenticated on FIELD_DEFINITION",
        );
        write(dir.path(), "notes.md", "# not a fragment");
        write(dir.path(), "users/users.graphql", "type Ignored { x: Int }");
        dir
    }

    #[test]
    fn test_schema_scan_is_sorted_and_filtered() {
        let dir = tree();
        let loader = FragmentLoader::new(dir.path(), FragmentPatterns::default());

        let schemas = loader.load_schemas().unwrap();
        let sources: Vec<_> = schemas.iter().map(|f| f.source.as_str()).collect();
        assert_eq!(sources, vec!["a.schema.graphql", "users/users.schema.graphql"]);
        assert_eq!(schemas[0].sdl, "type Query { a: String }");

        let directives = loader.load_directive_schemas().unwrap();
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].source, "auth/auth.directive.graphql");
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let dir = TempDir::new().unwrap();
        let loader = FragmentLoader::new(dir.path().join("missing"), FragmentPatterns::default());
        let err = loader.load_schemas().unwrap_err();
        assert!(matches!(err, GraphQLError::FragmentDirectory { .. }));
    }

    #[test]
    fn test_file_as_root_is_fatal() {
        let dir = tree();
        let loader = FragmentLoader::new(dir.path().join("notes.md"), FragmentPatterns::default());
        assert!(matches!(
            loader.load_schemas().unwrap_err(),
            GraphQLError::FragmentDirectory { .. }
        ));
    }

    #[test]
    fn test_custom_patterns() {
        let dir = tree();
        let patterns = FragmentPatterns {
            schemas: vec!["users/*.graphql".into()],
            ..FragmentPatterns::default()
        };
        let loader = FragmentLoader::new(dir.path(), patterns);
        let sources: Vec<_> = loader
            .load_schemas()
            .unwrap()
            .into_iter()
            .map(|f| f.source)
            .collect();
        assert_eq!(sources, vec!["users/users.graphql", "users/users.schema.graphql"]);
    }

    #[test]
    fn test_invalid_pattern() {
        let dir = tree();
        let patterns = FragmentPatterns {
            schemas: vec!["a{b".into()],
            ..FragmentPatterns::default()
        };
        let loader = FragmentLoader::new(dir.path(), patterns);
        assert!(matches!(
            loader.load_schemas().unwrap_err(),
            GraphQLError::InvalidPattern { .. }
        ));
    }

    #[test]
    fn test_load_all() {
        let dir = tree();
        let catalog = ModuleCatalog::new().resolvers("src/graph/users_resolvers.rs", || {
            ResolverMap::new().field("Query", "a", FieldResolver::constant("a"))
        });
        let loaded = FragmentLoader::new(dir.path(), FragmentPatterns::default())
            .load(&catalog)
            .unwrap();
        assert_eq!(loaded.schemas.len(), 2);
        assert_eq!(loaded.directive_schemas.len(), 1);
        assert_eq!(loaded.resolvers.len(), 1);
        assert!(loaded.directives.is_empty());
    }

    #[test]
    fn test_catalog_key_checked_against_patterns() {
        let dir = tree();
        let catalog = ModuleCatalog::new().resolvers("src/graph/helpers.rs", || {
            ResolverMap::new().field("Query", "a", FieldResolver::constant("a"))
        });
        let err = FragmentLoader::new(dir.path(), FragmentPatterns::default())
            .load_resolvers(&catalog)
            .unwrap_err();
        assert!(matches!(err, GraphQLError::UnrecognizedModule { .. }));
    }
}
