//! Last-write-wins merging of resolver fragments.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use super::{
    FieldResolver, Resolver, ResolverFragment, ScalarResolver, SubscriptionResolver, TypeResolvers,
};

/// One logical mapping from type to field to resolver.
///
/// When two fragments provide the same `Type.field`, the one merged later
/// wins. The same holds for scalars and for a type that one fragment
/// declares as a scalar and another as an object: the later entry replaces
/// the earlier one as a whole.
#[derive(Debug, Clone, Default)]
pub struct MergedResolverMap {
    types: IndexMap<String, TypeResolvers>,
    sources: HashMap<String, String>,
}

impl MergedResolverMap {
    /// Merges fragments in order.
    #[must_use]
    pub fn merge<'a>(fragments: impl IntoIterator<Item = &'a ResolverFragment>) -> Self {
        let mut merged = Self::default();
        for fragment in fragments {
            merged.apply(fragment);
        }
        merged
    }

    fn apply(&mut self, fragment: &ResolverFragment) {
        for (type_name, entry) in fragment.map.iter() {
            match entry {
                TypeResolvers::Scalar(scalar) => {
                    self.replace_type(
                        type_name,
                        TypeResolvers::Scalar(scalar.clone()),
                        &fragment.source,
                    );
                }
                TypeResolvers::Fields(fields) => {
                    let is_object =
                        matches!(self.types.get(type_name), Some(TypeResolvers::Fields(_)));
                    if !is_object {
                        self.replace_type(
                            type_name,
                            TypeResolvers::Fields(IndexMap::new()),
                            &fragment.source,
                        );
                    }
                    for (field_name, resolver) in fields {
                        self.set_field(type_name, field_name, resolver.clone(), &fragment.source);
                    }
                }
            }
        }
    }

    fn replace_type(&mut self, type_name: &str, entry: TypeResolvers, source: &str) {
        if let Some(previous) = self.types.get(type_name) {
            let replaces_kind = matches!(
                (previous, &entry),
                (TypeResolvers::Scalar(_), TypeResolvers::Fields(_))
                    | (TypeResolvers::Fields(_), TypeResolvers::Scalar(_))
            );
            if replaces_kind || matches!(entry, TypeResolvers::Scalar(_)) {
                debug!(
                    type_name,
                    previous = self.sources.get(type_name).map(String::as_str).unwrap_or_default(),
                    source,
                    "Resolver entry overridden"
                );
            }
            if let TypeResolvers::Fields(fields) = previous {
                let stale: Vec<String> = fields
                    .keys()
                    .map(|field| field_key(type_name, field))
                    .collect();
                for key in stale {
                    self.sources.remove(&key);
                }
            }
        }
        self.types.insert(type_name.to_string(), entry);
        self.sources.insert(type_name.to_string(), source.to_string());
    }

    fn set_field(&mut self, type_name: &str, field_name: &str, resolver: Resolver, source: &str) {
        let key = field_key(type_name, field_name);
        if let Some(TypeResolvers::Fields(fields)) = self.types.get_mut(type_name) {
            if fields.insert(field_name.to_string(), resolver).is_some() {
                debug!(
                    type_name,
                    field_name,
                    previous = self.sources.get(&key).map(String::as_str).unwrap_or_default(),
                    source,
                    "Resolver overridden"
                );
            }
            self.sources.insert(key, source.to_string());
        }
    }

    /// Returns the entry for a type.
    #[must_use]
    pub fn get(&self, type_name: &str) -> Option<&TypeResolvers> {
        self.types.get(type_name)
    }

    /// Returns the field resolver for `type_name.field_name`.
    #[must_use]
    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldResolver> {
        match self.resolver(type_name, field_name)? {
            Resolver::Field(resolver) => Some(resolver),
            Resolver::Subscription(_) => None,
        }
    }

    /// Returns the subscription resolver for `type_name.field_name`.
    #[must_use]
    pub fn subscription(
        &self,
        type_name: &str,
        field_name: &str,
    ) -> Option<&SubscriptionResolver> {
        match self.resolver(type_name, field_name)? {
            Resolver::Subscription(resolver) => Some(resolver),
            Resolver::Field(_) => None,
        }
    }

    /// Returns the resolver entry for `type_name.field_name`.
    #[must_use]
    pub fn resolver(&self, type_name: &str, field_name: &str) -> Option<&Resolver> {
        match self.types.get(type_name)? {
            TypeResolvers::Fields(fields) => fields.get(field_name),
            TypeResolvers::Scalar(_) => None,
        }
    }

    /// Returns the scalar resolver for a type.
    #[must_use]
    pub fn scalar(&self, type_name: &str) -> Option<&ScalarResolver> {
        match self.types.get(type_name)? {
            TypeResolvers::Scalar(scalar) => Some(scalar),
            TypeResolvers::Fields(_) => None,
        }
    }

    /// Returns the fragment that provided `type_name.field_name`.
    #[must_use]
    pub fn source_of(&self, type_name: &str, field_name: &str) -> Option<&str> {
        self.sources
            .get(&field_key(type_name, field_name))
            .map(String::as_str)
    }

    /// Returns the fragment that provided a scalar (or the last one that
    /// redeclared an object type).
    #[must_use]
    pub fn type_source(&self, type_name: &str) -> Option<&str> {
        self.sources.get(type_name).map(String::as_str)
    }

    /// Type names in first-seen order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Number of field resolvers, across all types.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.types
            .values()
            .map(|entry| match entry {
                TypeResolvers::Fields(fields) => fields.len(),
                TypeResolvers::Scalar(_) => 0,
            })
            .sum()
    }
}

fn field_key(type_name: &str, field_name: &str) -> String {
    format!("{type_name}.{field_name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolvers::ResolverMap;
    use crate::resolvers::tests::input;
    use async_graphql::Value;

    fn fragment(source: &str, map: ResolverMap) -> ResolverFragment {
        ResolverFragment::new(source, map)
    }

    async fn resolve(map: &MergedResolverMap, type_name: &str, field: &str) -> Value {
        map.field(type_name, field)
            .expect("resolver present")
            .call(input(Value::Null))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_later_fragment_wins() {
        let a = fragment(
            "a_resolvers.rs",
            ResolverMap::new().field("Query", "a", FieldResolver::constant(1)),
        );
        let b = fragment(
            "b_resolvers.rs",
            ResolverMap::new().field("Query", "a", FieldResolver::constant(2)),
        );

        let merged = MergedResolverMap::merge([&a, &b]);
        assert_eq!(resolve(&merged, "Query", "a").await, Value::from(2));
        assert_eq!(merged.source_of("Query", "a"), Some("b_resolvers.rs"));

        let merged = MergedResolverMap::merge([&b, &a]);
        assert_eq!(resolve(&merged, "Query", "a").await, Value::from(1));
    }

    #[tokio::test]
    async fn test_interleaved_fragments_do_not_change_winner() {
        let first = fragment(
            "1_resolvers.rs",
            ResolverMap::new().field("Query", "a", FieldResolver::constant(1)),
        );
        let noise = fragment(
            "2_resolvers.rs",
            ResolverMap::new()
                .field("Query", "b", FieldResolver::constant("b"))
                .field("User", "name", FieldResolver::constant("n")),
        );
        let last = fragment(
            "3_resolvers.rs",
            ResolverMap::new().field("Query", "a", FieldResolver::constant(2)),
        );
        let more_noise = fragment(
            "4_resolvers.rs",
            ResolverMap::new().field("Mutation", "c", FieldResolver::constant(3)),
        );

        let merged = MergedResolverMap::merge([&first, &noise, &last, &more_noise]);
        assert_eq!(resolve(&merged, "Query", "a").await, Value::from(2));
        assert_eq!(resolve(&merged, "Query", "b").await, Value::from("b"));
        assert_eq!(merged.field_count(), 4);
        assert_eq!(
            merged.type_names().collect::<Vec<_>>(),
            vec!["Query", "User", "Mutation"]
        );
    }

    #[test]
    fn test_deep_merge_keeps_disjoint_fields() {
        let a = fragment("a", ResolverMap::new().field("Query", "a", FieldResolver::constant(1)));
        let b = fragment("b", ResolverMap::new().field("Query", "b", FieldResolver::constant(2)));
        let merged = MergedResolverMap::merge([&a, &b]);
        assert!(merged.field("Query", "a").is_some());
        assert!(merged.field("Query", "b").is_some());
        assert_eq!(merged.source_of("Query", "a"), Some("a"));
    }

    #[test]
    fn test_scalar_replaces_object_entry() {
        let a = fragment(
            "a",
            ResolverMap::new().field("Money", "amount", FieldResolver::constant(1)),
        );
        let b = fragment(
            "b",
            ResolverMap::new().scalar("Money", ScalarResolver::new().description("cents")),
        );
        let merged = MergedResolverMap::merge([&a, &b]);
        assert!(merged.field("Money", "amount").is_none());
        assert!(merged.source_of("Money", "amount").is_none());
        assert_eq!(
            merged.scalar("Money").and_then(|s| s.description.as_deref()),
            Some("cents")
        );
        assert_eq!(merged.type_source("Money"), Some("b"));
    }

    #[test]
    fn test_object_replaces_scalar_entry() {
        let a = fragment("a", ResolverMap::new().scalar("Money", ScalarResolver::new()));
        let b = fragment(
            "b",
            ResolverMap::new().field("Money", "amount", FieldResolver::constant(1)),
        );
        let merged = MergedResolverMap::merge([&a, &b]);
        assert!(merged.scalar("Money").is_none());
        assert!(merged.field("Money", "amount").is_some());
    }

    #[test]
    fn test_subscription_and_field_lookups_are_distinct() {
        let a = fragment(
            "a",
            ResolverMap::new().subscription(
                "Subscription",
                "ticks",
                SubscriptionResolver::new(|_| futures_util::stream::empty()),
            ),
        );
        let merged = MergedResolverMap::merge([&a]);
        assert!(merged.subscription("Subscription", "ticks").is_some());
        assert!(merged.field("Subscription", "ticks").is_none());
    }
}
