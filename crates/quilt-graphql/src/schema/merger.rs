//! Merging of schema fragments into one logical schema.
//!
//! Named types may be defined by exactly one fragment. The exception is the
//! root operation types, which many fragments contribute fields to; a field
//! defined twice on a root type is still a conflict. `extend` definitions are
//! applied once every fragment has been read, so their position in the input
//! does not matter.

use std::collections::{HashMap, HashSet};
use std::mem;

use async_graphql_parser::types::{
    DirectiveDefinition, SchemaDefinition, TypeDefinition, TypeKind, TypeSystemDefinition,
};
use async_graphql_parser::{Positioned, parse_schema};
use async_graphql_value::Name;
use indexmap::IndexMap;
use tracing::debug;

use crate::error::GraphQLError;
use crate::loader::SchemaFragment;

const DEFAULT_QUERY: &str = "Query";
const DEFAULT_MUTATION: &str = "Mutation";
const DEFAULT_SUBSCRIPTION: &str = "Subscription";

/// A named type with its provenance.
#[derive(Debug, Clone)]
pub struct MergedType {
    /// The definition, with root contributions and extensions folded in.
    pub definition: TypeDefinition,
    /// Fragment that first defined the type.
    pub source: String,
    /// Fragments that extended the type, in application order.
    pub extended_by: Vec<String>,
}

/// Names of the root operation types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootTypes {
    /// Query root.
    pub query: String,
    /// Mutation root, if the schema has one.
    pub mutation: Option<String>,
    /// Subscription root, if the schema has one.
    pub subscription: Option<String>,
}

/// One logical schema assembled from fragments.
#[derive(Debug, Clone)]
pub struct MergedSchema {
    types: IndexMap<String, MergedType>,
    field_sources: HashMap<(String, String), String>,
    directives: IndexMap<String, (DirectiveDefinition, String)>,
    roots: RootTypes,
}

struct ParsedFragment<'a> {
    source: &'a str,
    definitions: Vec<TypeSystemDefinition>,
}

impl MergedSchema {
    /// Merges fragments in order.
    ///
    /// Callers pass type fragments first, then directive schema fragments,
    /// then the built-in scalars.
    ///
    /// # Errors
    ///
    /// Returns an error if a fragment fails to parse, a type, root field,
    /// directive or schema definition is defined twice, an extension targets
    /// an unknown type or a type of a different kind, or no query root type
    /// is defined.
    pub fn merge<'a>(
        fragments: impl IntoIterator<Item = &'a SchemaFragment>,
    ) -> Result<Self, GraphQLError> {
        let parsed = parse_all(fragments)?;
        let roots = root_names(&parsed)?;
        let root_set: HashSet<&str> = [
            Some(roots.query.as_str()),
            roots.mutation.as_deref(),
            roots.subscription.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect();

        let mut merged = Self {
            types: IndexMap::new(),
            field_sources: HashMap::new(),
            directives: IndexMap::new(),
            roots: roots.clone(),
        };

        let mut extensions = Vec::new();
        for fragment in &parsed {
            for definition in &fragment.definitions {
                match definition {
                    TypeSystemDefinition::Type(ty) if ty.node.extend => {
                        extensions.push((fragment.source, &ty.node));
                    }
                    TypeSystemDefinition::Type(ty) => {
                        merged.define(&ty.node, fragment.source, &root_set)?;
                    }
                    TypeSystemDefinition::Directive(directive) => {
                        merged.define_directive(&directive.node, fragment.source)?;
                    }
                    TypeSystemDefinition::Schema(_) => {}
                }
            }
        }

        for (source, extension) in extensions {
            merged.extend(extension, source)?;
        }

        merged.roots = RootTypes {
            query: roots.query,
            mutation: roots
                .mutation
                .filter(|name| merged.types.contains_key(name.as_str())),
            subscription: roots
                .subscription
                .filter(|name| merged.types.contains_key(name.as_str())),
        };
        match merged.types.get(&merged.roots.query) {
            Some(ty) if matches!(ty.definition.kind, TypeKind::Object(_)) => {}
            _ => return Err(GraphQLError::MissingQueryRoot(merged.roots.query.clone())),
        }

        debug!(
            types = merged.types.len(),
            directives = merged.directives.len(),
            query = %merged.roots.query,
            "Schema fragments merged"
        );
        Ok(merged)
    }

    fn define(
        &mut self,
        definition: &TypeDefinition,
        source: &str,
        roots: &HashSet<&str>,
    ) -> Result<(), GraphQLError> {
        let name = definition.name.node.to_string();

        let Some(existing) = self.types.get(&name) else {
            self.record_fields(&name, &definition.kind, source)?;
            self.types.insert(
                name,
                MergedType {
                    definition: definition.clone(),
                    source: source.to_string(),
                    extended_by: Vec::new(),
                },
            );
            return Ok(());
        };

        let both_objects = matches!(
            (&existing.definition.kind, &definition.kind),
            (TypeKind::Object(_), TypeKind::Object(_))
        );
        if !roots.contains(name.as_str()) || !both_objects {
            return Err(GraphQLError::DuplicateType {
                name,
                first: existing.source.clone(),
                second: source.to_string(),
            });
        }

        // Root contributions: fields are checked before anything is folded in.
        self.record_fields(&name, &definition.kind, source)?;
        if let Some(existing) = self.types.get_mut(&name) {
            fold_into(&mut existing.definition, definition);
            if existing.definition.description.is_none() {
                existing.definition.description = definition.description.clone();
            }
        }
        Ok(())
    }

    fn extend(&mut self, extension: &TypeDefinition, source: &str) -> Result<(), GraphQLError> {
        let name = extension.name.node.to_string();
        let Some(existing) = self.types.get(&name) else {
            return Err(GraphQLError::UnknownExtension {
                name,
                source_name: source.to_string(),
            });
        };
        if mem::discriminant(&existing.definition.kind) != mem::discriminant(&extension.kind) {
            return Err(GraphQLError::ExtensionKindMismatch {
                name,
                source_name: source.to_string(),
            });
        }

        self.record_fields(&name, &extension.kind, source)?;
        if let Some(existing) = self.types.get_mut(&name) {
            fold_into(&mut existing.definition, extension);
            existing.extended_by.push(source.to_string());
        }
        Ok(())
    }

    /// Records the source of every field (or enum value) of `kind`, failing
    /// on the first one already recorded.
    fn record_fields(
        &mut self,
        type_name: &str,
        kind: &TypeKind,
        source: &str,
    ) -> Result<(), GraphQLError> {
        let mut pending = Vec::new();
        for field in member_names(kind) {
            let key = (type_name.to_string(), field.clone());
            let first = self
                .field_sources
                .get(&key)
                .or_else(|| pending.iter().find(|(k, _)| *k == key).map(|(_, s)| s));
            if let Some(first) = first {
                return Err(GraphQLError::DuplicateField {
                    type_name: type_name.to_string(),
                    field,
                    first: first.clone(),
                    second: source.to_string(),
                });
            }
            pending.push((key, source.to_string()));
        }
        self.field_sources.extend(pending);
        Ok(())
    }

    fn define_directive(
        &mut self,
        directive: &DirectiveDefinition,
        source: &str,
    ) -> Result<(), GraphQLError> {
        let name = directive.name.node.to_string();
        if let Some((_, first)) = self.directives.get(&name) {
            return Err(GraphQLError::DuplicateDirective {
                name,
                first: first.clone(),
                second: source.to_string(),
            });
        }
        self.directives
            .insert(name, (directive.clone(), source.to_string()));
        Ok(())
    }

    /// Root operation type names.
    #[must_use]
    pub fn roots(&self) -> &RootTypes {
        &self.roots
    }

    /// Type names in definition order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// All types in definition order.
    pub fn types(&self) -> impl Iterator<Item = (&str, &MergedType)> {
        self.types.iter().map(|(name, ty)| (name.as_str(), ty))
    }

    /// Looks up a type definition.
    #[must_use]
    pub fn get_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name).map(|ty| &ty.definition)
    }

    /// Returns the fragment that defined a type.
    #[must_use]
    pub fn type_source(&self, name: &str) -> Option<&str> {
        self.types.get(name).map(|ty| ty.source.as_str())
    }

    /// Field names (enum values for enums) of a type, in definition order.
    #[must_use]
    pub fn field_names(&self, type_name: &str) -> Vec<String> {
        self.get_type(type_name)
            .map(|ty| member_names(&ty.kind))
            .unwrap_or_default()
    }

    /// Returns the fragment that defined `type_name.field_name`.
    #[must_use]
    pub fn field_source(&self, type_name: &str, field_name: &str) -> Option<&str> {
        self.field_sources
            .get(&(type_name.to_string(), field_name.to_string()))
            .map(String::as_str)
    }

    /// Looks up a directive definition.
    #[must_use]
    pub fn directive(&self, name: &str) -> Option<&DirectiveDefinition> {
        self.directives.get(name).map(|(definition, _)| definition)
    }

    /// Directive names in definition order.
    pub fn directive_names(&self) -> impl Iterator<Item = &str> {
        self.directives.keys().map(String::as_str)
    }

    /// Returns `true` for interfaces and unions.
    #[must_use]
    pub fn is_abstract(&self, name: &str) -> bool {
        matches!(
            self.get_type(name).map(|ty| &ty.kind),
            Some(TypeKind::Interface(_) | TypeKind::Union(_))
        )
    }
}

fn parse_all<'a>(
    fragments: impl IntoIterator<Item = &'a SchemaFragment>,
) -> Result<Vec<ParsedFragment<'a>>, GraphQLError> {
    let mut parsed = Vec::new();
    for fragment in fragments {
        if fragment.sdl.trim().is_empty() {
            debug!(source = %fragment.source, "Skipping empty schema fragment");
            continue;
        }
        let document = parse_schema(&fragment.sdl).map_err(|e| GraphQLError::Parse {
            source_name: fragment.source.clone(),
            message: e.to_string(),
        })?;
        parsed.push(ParsedFragment {
            source: &fragment.source,
            definitions: document.definitions,
        });
    }
    Ok(parsed)
}

/// Resolves root type names from `schema { ... }` definitions.
fn root_names(parsed: &[ParsedFragment<'_>]) -> Result<RootTypes, GraphQLError> {
    let mut definition: Option<(&SchemaDefinition, &str)> = None;
    let mut extensions = Vec::new();

    for fragment in parsed {
        for item in &fragment.definitions {
            let TypeSystemDefinition::Schema(schema) = item else {
                continue;
            };
            if schema.node.extend {
                extensions.push(&schema.node);
                continue;
            }
            if let Some((_, first)) = definition {
                return Err(GraphQLError::DuplicateSchemaDefinition {
                    first: first.to_string(),
                    second: fragment.source.to_string(),
                });
            }
            definition = Some((&schema.node, fragment.source));
        }
    }

    let name = |n: &Option<Positioned<Name>>| n.as_ref().map(|n| n.node.to_string());
    let (mut query, mut mutation, mut subscription) = match definition {
        Some((schema, _)) => (
            name(&schema.query),
            name(&schema.mutation),
            name(&schema.subscription),
        ),
        None => (None, None, None),
    };
    for extension in extensions {
        query = query.or_else(|| name(&extension.query));
        mutation = mutation.or_else(|| name(&extension.mutation));
        subscription = subscription.or_else(|| name(&extension.subscription));
    }

    let explicit = definition.is_some();
    Ok(RootTypes {
        query: query.unwrap_or_else(|| DEFAULT_QUERY.to_string()),
        mutation: mutation.or_else(|| (!explicit).then(|| DEFAULT_MUTATION.to_string())),
        subscription: subscription
            .or_else(|| (!explicit).then(|| DEFAULT_SUBSCRIPTION.to_string())),
    })
}

/// Names of the fields, input fields or enum values declared by `kind`.
fn member_names(kind: &TypeKind) -> Vec<String> {
    match kind {
        TypeKind::Object(object) => object
            .fields
            .iter()
            .map(|f| f.node.name.node.to_string())
            .collect(),
        TypeKind::Interface(interface) => interface
            .fields
            .iter()
            .map(|f| f.node.name.node.to_string())
            .collect(),
        TypeKind::InputObject(input) => input
            .fields
            .iter()
            .map(|f| f.node.name.node.to_string())
            .collect(),
        TypeKind::Enum(enum_type) => enum_type
            .values
            .iter()
            .map(|v| v.node.value.node.to_string())
            .collect(),
        TypeKind::Scalar | TypeKind::Union(_) => Vec::new(),
    }
}

/// Appends the members and directives of `addition` to `target`. Both must
/// be of the same kind.
fn fold_into(target: &mut TypeDefinition, addition: &TypeDefinition) {
    target.directives.extend(addition.directives.iter().cloned());
    match (&mut target.kind, &addition.kind) {
        (TypeKind::Object(target), TypeKind::Object(addition)) => {
            target.fields.extend(addition.fields.iter().cloned());
            for name in &addition.implements {
                if !target.implements.iter().any(|n| n.node == name.node) {
                    target.implements.push(name.clone());
                }
            }
        }
        (TypeKind::Interface(target), TypeKind::Interface(addition)) => {
            target.fields.extend(addition.fields.iter().cloned());
            for name in &addition.implements {
                if !target.implements.iter().any(|n| n.node == name.node) {
                    target.implements.push(name.clone());
                }
            }
        }
        (TypeKind::Union(target), TypeKind::Union(addition)) => {
            for member in &addition.members {
                if !target.members.iter().any(|m| m.node == member.node) {
                    target.members.push(member.clone());
                }
            }
        }
        (TypeKind::Enum(target), TypeKind::Enum(addition)) => {
            target.values.extend(addition.values.iter().cloned());
        }
        (TypeKind::InputObject(target), TypeKind::InputObject(addition)) => {
            target.fields.extend(addition.fields.iter().cloned());
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BUILTIN_SCALARS_SOURCE;

    fn fragment(source: &str, sdl: &str) -> SchemaFragment {
        SchemaFragment::new(source, sdl)
    }

    fn merge(fragments: &[SchemaFragment]) -> Result<MergedSchema, GraphQLError> {
        MergedSchema::merge(fragments)
    }

    #[test]
    fn test_root_types_merge_fieldwise() {
        let merged = merge(&[
            fragment("a.schema.graphql", "type Query { a: String }"),
            fragment("b.schema.graphql", "type Query { b: String }"),
        ])
        .unwrap();

        assert_eq!(merged.field_names("Query"), vec!["a", "b"]);
        assert_eq!(merged.field_source("Query", "a"), Some("a.schema.graphql"));
        assert_eq!(merged.field_source("Query", "b"), Some("b.schema.graphql"));
        assert_eq!(merged.roots().query, "Query");
        assert!(merged.roots().mutation.is_none());
    }

    #[test]
    fn test_root_field_redefinition_is_fatal() {
        let err = merge(&[
            fragment("a.schema.graphql", "type Query { a: String }"),
            fragment("b.schema.graphql", "type Query { b: String }"),
            fragment("c.schema.graphql", "type Query { a: Int }"),
        ])
        .unwrap_err();

        match err {
            GraphQLError::DuplicateField {
                type_name,
                field,
                first,
                second,
            } => {
                assert_eq!(type_name, "Query");
                assert_eq!(field, "a");
                assert_eq!(first, "a.schema.graphql");
                assert_eq!(second, "c.schema.graphql");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_type_names_both_sources() {
        let err = merge(&[
            fragment(
                "users.schema.graphql",
                "type User { id: ID }\ntype Query { u: User }",
            ),
            fragment("people.schema.graphql", "type User { name: String }"),
        ])
        .unwrap_err();

        let message = err.to_string();
        assert!(matches!(err, GraphQLError::DuplicateType { ref name, .. } if name == "User"));
        assert!(message.contains("users.schema.graphql"));
        assert!(message.contains("people.schema.graphql"));
    }

    #[test]
    fn test_disjoint_merge_is_order_independent() {
        let a = fragment("a", "type Query { a: String }\ntype A { x: Int }");
        let b = fragment("b", "type Query { b: String }\ntype B { y: Int }");

        let ab = merge(&[a.clone(), b.clone()]).unwrap();
        let ba = merge(&[b, a]).unwrap();

        let mut ab_types: Vec<_> = ab.type_names().collect();
        let mut ba_types: Vec<_> = ba.type_names().collect();
        ab_types.sort_unstable();
        ba_types.sort_unstable();
        assert_eq!(ab_types, ba_types);
        assert_eq!(ab_types, vec!["A", "B", "Query"]);

        let mut ab_fields = ab.field_names("Query");
        let mut ba_fields = ba.field_names("Query");
        ab_fields.sort();
        ba_fields.sort();
        assert_eq!(ab_fields, ba_fields);
    }

    #[test]
    fn test_builtin_scalar_cannot_be_overridden() {
        let err = merge(&[
            fragment("a.schema.graphql", "type Query { a: String }\nscalar DateTime"),
            fragment(BUILTIN_SCALARS_SOURCE, "scalar DateTime"),
        ])
        .unwrap_err();
        match err {
            GraphQLError::DuplicateType { second, .. } => {
                assert_eq!(second, BUILTIN_SCALARS_SOURCE);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_extensions_applied_regardless_of_position() {
        let merged = merge(&[
            fragment("a", "extend type User { email: String }"),
            fragment("b", "type Query { me: User }\ntype User { id: ID! }"),
        ])
        .unwrap();
        assert_eq!(merged.field_names("User"), vec!["id", "email"]);
        assert_eq!(merged.field_source("User", "email"), Some("a"));
    }

    #[test]
    fn test_extension_of_unknown_type_is_fatal() {
        let err = merge(&[
            fragment("a", "type Query { a: String }"),
            fragment("b", "extend type Ghost { x: Int }"),
        ])
        .unwrap_err();
        assert!(
            matches!(err, GraphQLError::UnknownExtension { ref name, .. } if name == "Ghost")
        );
    }

    #[test]
    fn test_extension_kind_mismatch() {
        let err = merge(&[
            fragment("a", "type Query { a: Color }\nenum Color { RED }"),
            fragment("b", "extend type Color { x: Int }"),
        ])
        .unwrap_err();
        assert!(matches!(err, GraphQLError::ExtensionKindMismatch { .. }));
    }

    #[test]
    fn test_extension_duplicate_field() {
        let err = merge(&[
            fragment("a", "type Query { a: String }\ntype User { id: ID }"),
            fragment("b", "extend type User { id: String }"),
        ])
        .unwrap_err();
        assert!(matches!(err, GraphQLError::DuplicateField { .. }));
    }

    #[test]
    fn test_enum_and_union_extensions() {
        let merged = merge(&[
            fragment(
                "a",
                "type Query { a: String }
                 enum Color { RED }
                 type A { x: Int }
                 type B { y: Int }
                 union AB = A",
            ),
            fragment("b", "extend enum Color { GREEN }\nextend union AB = B"),
        ])
        .unwrap();
        assert_eq!(merged.field_names("Color"), vec!["RED", "GREEN"]);
        match &merged.get_type("AB").unwrap().kind {
            TypeKind::Union(union) => assert_eq!(union.members.len(), 2),
            other => panic!("unexpected kind: {other:?}"),
        }
        assert!(merged.is_abstract("AB"));
        assert!(!merged.is_abstract("Color"));
    }

    #[test]
    fn test_missing_query_root() {
        let err = merge(&[fragment("a", "type User { id: ID }")]).unwrap_err();
        assert!(matches!(err, GraphQLError::MissingQueryRoot(ref name) if name == "Query"));
    }

    #[test]
    fn test_schema_definition_renames_roots() {
        let merged = merge(&[
            fragment(
                "schema.schema.graphql",
                "schema { query: RootQuery mutation: RootMutation }",
            ),
            fragment("q.schema.graphql", "type RootQuery { a: String }"),
            fragment("q2.schema.graphql", "type RootQuery { b: String }"),
            fragment("m.schema.graphql", "type RootMutation { c: String }"),
            fragment("s.schema.graphql", "type Subscription { d: String }"),
        ])
        .unwrap();

        assert_eq!(merged.roots().query, "RootQuery");
        assert_eq!(merged.roots().mutation.as_deref(), Some("RootMutation"));
        assert!(merged.roots().subscription.is_none());
        assert_eq!(merged.field_names("RootQuery"), vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_schema_definition() {
        let err = merge(&[
            fragment("a", "schema { query: Query }\ntype Query { a: String }"),
            fragment("b", "schema { query: Query }"),
        ])
        .unwrap_err();
        assert!(matches!(err, GraphQLError::DuplicateSchemaDefinition { .. }));
    }

    #[test]
    fn test_duplicate_directive_definition() {
        let err = merge(&[
            fragment("a", "type Query { a: String }"),
            fragment(
                "auth.directive.graphql",
                "directive @isAuthenticated on FIELD_DEFINITION",
            ),
            fragment("other.directive.graphql", "directive @isAuthenticated on OBJECT"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            GraphQLError::DuplicateDirective { ref name, .. } if name == "isAuthenticated"
        ));
    }

    #[test]
    fn test_parse_error_names_source() {
        let err = merge(&[fragment("broken.schema.graphql", "type Query {")]).unwrap_err();
        match err {
            GraphQLError::Parse { source_name, .. } => {
                assert_eq!(source_name, "broken.schema.graphql");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_fragment_skipped() {
        let merged = merge(&[
            fragment("empty.schema.graphql", "  \n"),
            fragment("a", "type Query { a: String }"),
        ])
        .unwrap();
        assert_eq!(merged.type_names().collect::<Vec<_>>(), vec!["Query"]);
    }

    #[test]
    fn test_field_repeated_in_one_definition() {
        let err = merge(&[fragment("a", "type Query { a: String a: Int }")]).unwrap_err();
        assert!(matches!(err, GraphQLError::DuplicateField { .. }));
    }

    #[test]
    fn test_non_root_object_redefinition_is_fatal_even_if_disjoint() {
        let err = merge(&[
            fragment("a", "type Query { a: String }\ntype User { id: ID }"),
            fragment("b", "type User { name: String }"),
        ])
        .unwrap_err();
        assert!(err.is_conflict());
    }
}
