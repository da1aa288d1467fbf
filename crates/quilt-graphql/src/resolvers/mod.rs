//! Resolver fragments and the merged resolver map.
//!
//! A resolver fragment maps type names to either a set of field resolvers or
//! a scalar definition. Fragments are produced by resolver modules registered
//! in the [`ModuleCatalog`](crate::loader::ModuleCatalog) and merged with
//! last-write-wins semantics by [`MergedResolverMap::merge`].

mod merger;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_graphql::{Name, Value};
use futures_util::future::BoxFuture;
use futures_util::stream::{BoxStream, Stream, StreamExt};
use futures_util::FutureExt;
use indexmap::IndexMap;

use crate::context::RequestContext;

pub use merger::MergedResolverMap;

/// Future returned by a field resolver.
pub type ResolverFuture = BoxFuture<'static, async_graphql::Result<Value>>;

/// Stream returned by a subscription resolver.
pub type ResolverStream = BoxStream<'static, async_graphql::Result<Value>>;

/// Everything a resolver gets to see.
#[derive(Debug, Clone)]
pub struct ResolverInput {
    /// Value of the parent object (`Null` for root fields).
    pub parent: Value,

    /// Field arguments, after engine coercion.
    pub args: IndexMap<Name, Value>,

    /// Per-request context.
    pub context: RequestContext,

    /// Name of the type owning the field.
    pub type_name: String,

    /// Name of the field being resolved.
    pub field_name: String,
}

impl ResolverInput {
    /// Returns an argument by name.
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Returns a key of the parent object, if the parent is an object.
    #[must_use]
    pub fn parent_field(&self, name: &str) -> Option<&Value> {
        match &self.parent {
            Value::Object(map) => map.get(name),
            _ => None,
        }
    }
}

/// Resolver for a query or mutation field (or any non-root object field).
#[derive(Clone)]
pub struct FieldResolver(Arc<dyn Fn(ResolverInput) -> ResolverFuture + Send + Sync>);

impl FieldResolver {
    /// Wraps an async function.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(ResolverInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = async_graphql::Result<Value>> + Send + 'static,
    {
        Self(Arc::new(move |input| f(input).boxed()))
    }

    /// A resolver that always returns the same value.
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self::new(move |_| {
            let value = value.clone();
            async move { Ok(value) }
        })
    }

    /// The resolver used for fields nobody registered a resolver for: it
    /// reads the same-named key of the parent object.
    #[must_use]
    pub fn parent_key(field_name: &str) -> Self {
        let key = Name::new(field_name);
        Self::new(move |input| {
            let value = match input.parent {
                Value::Object(mut map) => map.swap_remove(&key).unwrap_or(Value::Null),
                _ => Value::Null,
            };
            async move { Ok(value) }
        })
    }

    /// Invokes the resolver.
    pub fn call(&self, input: ResolverInput) -> ResolverFuture {
        (self.0)(input)
    }

    /// Returns `true` if both handles point at the same function.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for FieldResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldResolver")
    }
}

/// Resolver for a subscription root field.
#[derive(Clone)]
pub struct SubscriptionResolver(Arc<dyn Fn(ResolverInput) -> ResolverStream + Send + Sync>);

impl SubscriptionResolver {
    /// Wraps a function returning a stream of values.
    pub fn new<F, S>(f: F) -> Self
    where
        F: Fn(ResolverInput) -> S + Send + Sync + 'static,
        S: Stream<Item = async_graphql::Result<Value>> + Send + 'static,
    {
        Self(Arc::new(move |input| f(input).boxed()))
    }

    /// Invokes the resolver.
    pub fn call(&self, input: ResolverInput) -> ResolverStream {
        (self.0)(input)
    }

    /// Returns `true` if both handles point at the same function.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for SubscriptionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SubscriptionResolver")
    }
}

/// Serialization and validation for a custom scalar.
#[derive(Clone, Default)]
pub struct ScalarResolver {
    /// Description shown by introspection.
    pub description: Option<String>,

    /// `specifiedBy` URL shown by introspection.
    pub specified_by_url: Option<String>,

    validator: Option<Arc<dyn Fn(&Value) -> bool + Send + Sync>>,
}

impl ScalarResolver {
    /// Creates a scalar that accepts any input.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the `specifiedBy` URL.
    #[must_use]
    pub fn specified_by_url(mut self, url: impl Into<String>) -> Self {
        self.specified_by_url = Some(url.into());
        self
    }

    /// Sets the input validator.
    #[must_use]
    pub fn validator(mut self, validator: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Checks an input value. Scalars without a validator accept anything.
    #[must_use]
    pub fn is_valid(&self, value: &Value) -> bool {
        self.validator.as_ref().is_none_or(|validate| validate(value))
    }

    pub(crate) fn validator_fn(&self) -> Option<Arc<dyn Fn(&Value) -> bool + Send + Sync>> {
        self.validator.clone()
    }
}

impl fmt::Debug for ScalarResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarResolver")
            .field("description", &self.description)
            .field("specified_by_url", &self.specified_by_url)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

/// A single field entry.
#[derive(Debug, Clone)]
pub enum Resolver {
    /// Query, mutation or object field.
    Field(FieldResolver),
    /// Subscription root field.
    Subscription(SubscriptionResolver),
}

/// Everything a fragment provides for one type.
#[derive(Debug, Clone)]
pub enum TypeResolvers {
    /// Field resolvers keyed by field name.
    Fields(IndexMap<String, Resolver>),
    /// Scalar serialization and validation.
    Scalar(ScalarResolver),
}

/// Mapping from type name to field resolvers, as exported by one resolver
/// module.
#[derive(Debug, Clone, Default)]
pub struct ResolverMap {
    types: IndexMap<String, TypeResolvers>,
}

impl ResolverMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a field resolver.
    #[must_use]
    pub fn field(self, type_name: &str, field_name: &str, resolver: FieldResolver) -> Self {
        self.entry(type_name, field_name, Resolver::Field(resolver))
    }

    /// Registers a subscription resolver.
    #[must_use]
    pub fn subscription(
        self,
        type_name: &str,
        field_name: &str,
        resolver: SubscriptionResolver,
    ) -> Self {
        self.entry(type_name, field_name, Resolver::Subscription(resolver))
    }

    /// Registers a scalar. Replaces any field resolvers of the same type.
    #[must_use]
    pub fn scalar(mut self, type_name: &str, scalar: ScalarResolver) -> Self {
        self.types
            .insert(type_name.to_string(), TypeResolvers::Scalar(scalar));
        self
    }

    /// Declares a type, possibly with no fields.
    ///
    /// Module loading rejects types left empty; this exists so a module can
    /// be assembled incrementally.
    #[must_use]
    pub fn object(mut self, type_name: &str) -> Self {
        self.types
            .entry(type_name.to_string())
            .or_insert_with(|| TypeResolvers::Fields(IndexMap::new()));
        self
    }

    fn entry(mut self, type_name: &str, field_name: &str, resolver: Resolver) -> Self {
        let entry = self
            .types
            .entry(type_name.to_string())
            .or_insert_with(|| TypeResolvers::Fields(IndexMap::new()));
        match entry {
            TypeResolvers::Fields(fields) => {
                fields.insert(field_name.to_string(), resolver);
            }
            TypeResolvers::Scalar(_) => {
                let mut fields = IndexMap::new();
                fields.insert(field_name.to_string(), resolver);
                *entry = TypeResolvers::Fields(fields);
            }
        }
        self
    }

    /// Iterates over types in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeResolvers)> {
        self.types.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Looks up one type.
    #[must_use]
    pub fn get(&self, type_name: &str) -> Option<&TypeResolvers> {
        self.types.get(type_name)
    }

    /// Number of types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no type is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// A resolver map tagged with the module it came from.
#[derive(Debug, Clone)]
pub struct ResolverFragment {
    /// Catalog key of the module.
    pub source: String,
    /// The module's resolvers.
    pub map: ResolverMap,
}

impl ResolverFragment {
    /// Creates a fragment.
    pub fn new(source: impl Into<String>, map: ResolverMap) -> Self {
        Self {
            source: source.into(),
            map,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextFactory, RequestInfo, ResponseHandle};

    pub(crate) fn input(parent: Value) -> ResolverInput {
        ResolverInput {
            parent,
            args: IndexMap::new(),
            context: ContextFactory::default()
                .create(RequestInfo::anonymous(), ResponseHandle::new()),
            type_name: "Query".into(),
            field_name: "a".into(),
        }
    }

    #[tokio::test]
    async fn test_parent_key_reads_parent_object() {
        let parent = async_graphql::value!({ "name": "Ada", "age": 36 });
        let value = FieldResolver::parent_key("name")
            .call(input(parent))
            .await
            .unwrap();
        assert_eq!(value, Value::from("Ada"));
    }

    #[tokio::test]
    async fn test_parent_key_without_object_is_null() {
        let value = FieldResolver::parent_key("name")
            .call(input(Value::Null))
            .await
            .unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_constant() {
        let value = FieldResolver::constant(7).call(input(Value::Null)).await.unwrap();
        assert_eq!(value, Value::from(7));
    }

    #[test]
    fn test_scalar_then_field_replaces_entry() {
        let map = ResolverMap::new()
            .scalar("Money", ScalarResolver::new())
            .field("Money", "amount", FieldResolver::constant(1));
        assert!(matches!(map.get("Money"), Some(TypeResolvers::Fields(f)) if f.len() == 1));
    }

    #[test]
    fn test_scalar_validator() {
        let scalar = ScalarResolver::new().validator(|v| matches!(v, Value::String(_)));
        assert!(scalar.is_valid(&Value::from("x")));
        assert!(!scalar.is_valid(&Value::from(1)));
        assert!(ScalarResolver::new().is_valid(&Value::from(1)));
    }

    #[tokio::test]
    async fn test_subscription_resolver_stream() {
        let resolver = SubscriptionResolver::new(|_| {
            futures_util::stream::iter(vec![Ok(Value::from(1)), Ok(Value::from(2))])
        });
        let values: Vec<_> = resolver
            .call(input(Value::Null))
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(values, vec![Value::from(1), Value::from(2)]);
    }
}
