//! Executable schema builder.
//!
//! This module provides `ExecutableSchemaBuilder`, which binds a merged
//! schema, the merged resolver map and the directive registry into an
//! executable schema. The builder uses async-graphql's dynamic schema API:
//! every merged type definition is translated into its dynamic counterpart
//! and every field is bound to the (directive-wrapped) resolver for
//! `Type.field`.

use async_graphql::dynamic::{
    Enum, EnumItem, Field, FieldFuture, FieldValue, InputObject, InputValue, Interface,
    InterfaceField, Object, ResolverContext, Scalar, Schema, SchemaBuilder, Subscription,
    SubscriptionField, SubscriptionFieldFuture, TypeRef, Union,
};
use async_graphql::{Name, Value};
use async_graphql_parser::Positioned;
use async_graphql_parser::types::{
    BaseType, ConstDirective, FieldDefinition, InputValueDefinition, Type, TypeDefinition,
    TypeKind,
};
use futures_util::stream::{self, StreamExt};
use indexmap::IndexMap;
use tracing::{debug, trace};

use super::MergedSchema;
use crate::config::GraphQLConfig;
use crate::context::{ContextFactory, RequestContext, RequestInfo, ResponseHandle};
use crate::directives::{DirectiveLocation, DirectiveRegistry, DirectiveSite};
use crate::error::GraphQLError;
use crate::normalizer::ErrorNormalizerExtension;
use crate::resolvers::{
    FieldResolver, MergedResolverMap, Resolver, ResolverInput, SubscriptionResolver,
};

/// Scalars every GraphQL schema has; the engine registers them itself.
const STANDARD_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

const DEFAULT_DEPRECATION_REASON: &str = "No longer supported";

/// How a resolved value must be presented to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputShape {
    /// Passed through as is.
    Plain,
    /// Interface or union: objects carry their concrete type in `__typename`.
    Abstract,
    /// Enum: strings are turned into enum values.
    Enum,
}

/// Builds the executable schema from composed parts.
///
/// # Example
///
/// ```ignore
/// let schema = ExecutableSchemaBuilder::new(&merged, &resolvers, &directives, &config)
///     .context_factory(factory)
///     .build()?;
/// ```
pub struct ExecutableSchemaBuilder<'a> {
    merged: &'a MergedSchema,
    resolvers: &'a MergedResolverMap,
    directives: &'a DirectiveRegistry,
    config: &'a GraphQLConfig,
    context_factory: ContextFactory,
}

impl<'a> ExecutableSchemaBuilder<'a> {
    /// Creates a new builder.
    #[must_use]
    pub fn new(
        merged: &'a MergedSchema,
        resolvers: &'a MergedResolverMap,
        directives: &'a DirectiveRegistry,
        config: &'a GraphQLConfig,
    ) -> Self {
        Self {
            merged,
            resolvers,
            directives,
            config,
            context_factory: ContextFactory::default(),
        }
    }

    /// Sets the factory used when the schema is executed without a
    /// per-request context (e.g. directly, outside the HTTP handlers).
    #[must_use]
    pub fn context_factory(mut self, context_factory: ContextFactory) -> Self {
        self.context_factory = context_factory;
        self
    }

    /// Builds the executable schema.
    ///
    /// # Errors
    ///
    /// Returns [`GraphQLError::SchemaBuildFailed`] if the engine rejects the
    /// schema, e.g. because a field references an undefined type.
    pub fn build(&self) -> Result<Schema, GraphQLError> {
        let roots = self.merged.roots();
        debug!(
            query = %roots.query,
            mutation = ?roots.mutation,
            subscription = ?roots.subscription,
            "Building executable schema"
        );

        let mut schema_builder = Schema::build(
            &roots.query,
            roots.mutation.as_deref(),
            roots.subscription.as_deref(),
        );
        schema_builder = self.register_types(schema_builder);

        schema_builder = schema_builder.limit_depth(self.config.max_depth);
        schema_builder = schema_builder.limit_complexity(self.config.max_complexity);
        if !self.config.introspection_enabled() {
            schema_builder = schema_builder.disable_introspection();
        }

        let schema = schema_builder
            .extension(ErrorNormalizerExtension::new(self.config.mode))
            .data(self.context_factory.clone())
            .finish()
            .map_err(|e| GraphQLError::SchemaBuildFailed(e.to_string()))?;

        debug!(
            types = self.merged.type_names().count(),
            resolvers = self.resolvers.field_count(),
            directives = self.directives.len(),
            "Executable schema built"
        );
        Ok(schema)
    }

    fn register_types(&self, mut builder: SchemaBuilder) -> SchemaBuilder {
        let subscription_root = self.merged.roots().subscription.as_deref();

        for (name, ty) in self.merged.types() {
            let definition = &ty.definition;
            builder = match &definition.kind {
                TypeKind::Scalar if STANDARD_SCALARS.contains(&name) => continue,
                TypeKind::Scalar => builder.register(self.scalar(name, definition)),
                TypeKind::Object(object) if Some(name) == subscription_root => {
                    let mut subscription = Subscription::new(name);
                    if let Some(description) = &definition.description {
                        subscription = subscription.description(description.node.clone());
                    }
                    for field in &object.fields {
                        subscription =
                            subscription.field(self.subscription_field(definition, &field.node));
                    }
                    builder.register(subscription)
                }
                TypeKind::Object(object) => {
                    let mut obj = Object::new(name);
                    if let Some(description) = &definition.description {
                        obj = obj.description(description.node.clone());
                    }
                    for interface in &object.implements {
                        obj = obj.implement(interface.node.as_str());
                    }
                    for field in &object.fields {
                        obj = obj.field(self.field(definition, &field.node));
                    }
                    builder.register(obj)
                }
                TypeKind::Interface(interface) => {
                    let mut iface = Interface::new(name);
                    if let Some(description) = &definition.description {
                        iface = iface.description(description.node.clone());
                    }
                    for parent in &interface.implements {
                        iface = iface.implement(parent.node.as_str());
                    }
                    for field in &interface.fields {
                        iface = iface.field(interface_field(&field.node));
                    }
                    builder.register(iface)
                }
                TypeKind::Union(union) => {
                    let mut u = Union::new(name);
                    if let Some(description) = &definition.description {
                        u = u.description(description.node.clone());
                    }
                    for member in &union.members {
                        u = u.possible_type(member.node.as_str());
                    }
                    builder.register(u)
                }
                TypeKind::Enum(enum_type) => {
                    let mut e = Enum::new(name);
                    if let Some(description) = &definition.description {
                        e = e.description(description.node.clone());
                    }
                    for value in &enum_type.values {
                        let value = &value.node;
                        let mut item = EnumItem::new(value.value.node.as_str());
                        if let Some(description) = &value.description {
                            item = item.description(description.node.clone());
                        }
                        if let Some(reason) = deprecation(&value.directives) {
                            item = item.deprecation(Some(reason.as_str()));
                        }
                        e = e.item(item);
                    }
                    builder.register(e)
                }
                TypeKind::InputObject(input) => {
                    let mut obj = InputObject::new(name);
                    if let Some(description) = &definition.description {
                        obj = obj.description(description.node.clone());
                    }
                    for field in &input.fields {
                        obj = obj.field(input_value(&field.node));
                    }
                    builder.register(obj)
                }
            };
            trace!(type_name = name, "Type registered");
        }

        builder
    }

    fn scalar(&self, name: &str, definition: &TypeDefinition) -> Scalar {
        let resolver = self.resolvers.scalar(name);
        let mut scalar = Scalar::new(name);

        let description = resolver
            .and_then(|r| r.description.clone())
            .or_else(|| definition.description.as_ref().map(|d| d.node.clone()));
        if let Some(description) = description {
            scalar = scalar.description(description);
        }

        let specified_by = resolver
            .and_then(|r| r.specified_by_url.clone())
            .or_else(|| specified_by_url(&definition.directives));
        if let Some(url) = specified_by {
            scalar = scalar.specified_by_url(url);
        }

        if let Some(validate) = resolver.and_then(|r| r.validator_fn()) {
            scalar = scalar.validator(move |value| validate(value));
        }
        scalar
    }

    fn field(&self, owner: &TypeDefinition, definition: &FieldDefinition) -> Field {
        let type_name = owner.name.node.to_string();
        let field_name = definition.name.node.to_string();
        let shape = self.output_shape(&definition.ty.node);
        let resolver = self.field_resolver(owner, definition);

        let mut field = Field::new(
            field_name.clone(),
            type_ref(&definition.ty.node),
            move |ctx| {
                let input = resolver_input(&ctx, &type_name, &field_name);
                let resolver = resolver.clone();
                FieldFuture::new(async move {
                    let value = resolver.call(input).await?;
                    Ok(to_field_value(value, shape))
                })
            },
        );

        if let Some(description) = &definition.description {
            field = field.description(description.node.clone());
        }
        for argument in &definition.arguments {
            field = field.argument(input_value(&argument.node));
        }
        if let Some(reason) = deprecation(&definition.directives) {
            field = field.deprecation(Some(reason.as_str()));
        }
        field
    }

    fn subscription_field(
        &self,
        owner: &TypeDefinition,
        definition: &FieldDefinition,
    ) -> SubscriptionField {
        let type_name = owner.name.node.to_string();
        let field_name = definition.name.node.to_string();
        let shape = self.output_shape(&definition.ty.node);
        let resolver = self.subscription_resolver(owner, definition);

        let mut field = SubscriptionField::new(
            field_name.clone(),
            type_ref(&definition.ty.node),
            move |ctx| {
                let input = resolver_input(&ctx, &type_name, &field_name);
                let resolver = resolver.clone();
                SubscriptionFieldFuture::new(async move {
                    Ok(resolver.call(input).map(move |item| {
                        item.map(|value| to_field_value(value, shape).unwrap_or(FieldValue::NULL))
                    }))
                })
            },
        );

        if let Some(description) = &definition.description {
            field = field.description(description.node.clone());
        }
        for argument in &definition.arguments {
            field = field.argument(input_value(&argument.node));
        }
        if let Some(reason) = deprecation(&definition.directives) {
            field = field.deprecation(Some(reason.as_str()));
        }
        field
    }

    /// The merged resolver for a field (or the parent-key default), wrapped
    /// by every registered directive applied to the type or the field.
    fn field_resolver(
        &self,
        owner: &TypeDefinition,
        definition: &FieldDefinition,
    ) -> FieldResolver {
        let type_name = owner.name.node.as_str();
        let field_name = definition.name.node.as_str();

        let mut resolver = match self.resolvers.resolver(type_name, field_name) {
            Some(Resolver::Field(resolver)) => resolver.clone(),
            Some(Resolver::Subscription(_)) => {
                debug!(
                    type_name,
                    field_name, "Subscription resolver on a non-subscription field ignored"
                );
                FieldResolver::parent_key(field_name)
            }
            None => FieldResolver::parent_key(field_name),
        };

        for site in self.directive_sites(owner, definition) {
            if let Some(directive) = self.directives.get(&site.directive) {
                resolver = directive.wrap_field(resolver, &site);
            }
        }
        resolver
    }

    fn subscription_resolver(
        &self,
        owner: &TypeDefinition,
        definition: &FieldDefinition,
    ) -> SubscriptionResolver {
        let type_name = owner.name.node.as_str();
        let field_name = definition.name.node.as_str();

        let mut resolver = match self.resolvers.resolver(type_name, field_name) {
            Some(Resolver::Subscription(resolver)) => resolver.clone(),
            Some(Resolver::Field(resolver)) => {
                let resolver = resolver.clone();
                SubscriptionResolver::new(move |input| stream::once(resolver.call(input)))
            }
            None => {
                let message =
                    format!("no resolver for subscription field {type_name}.{field_name}");
                SubscriptionResolver::new(move |_| {
                    stream::iter([Err(async_graphql::Error::new(message.clone()))])
                })
            }
        };

        for site in self.directive_sites(owner, definition) {
            if let Some(directive) = self.directives.get(&site.directive) {
                resolver = directive.wrap_subscription(resolver, &site);
            }
        }
        resolver
    }

    /// Registered directives applied to a field: the type's first, then the
    /// field's, each in declaration order.
    fn directive_sites(
        &self,
        owner: &TypeDefinition,
        definition: &FieldDefinition,
    ) -> Vec<DirectiveSite> {
        let type_level = owner
            .directives
            .iter()
            .map(|d| (&d.node, DirectiveLocation::Object));
        let field_level = definition
            .directives
            .iter()
            .map(|d| (&d.node, DirectiveLocation::FieldDefinition));

        type_level
            .chain(field_level)
            .filter(|(directive, _)| self.directives.contains(directive.name.node.as_str()))
            .map(|(directive, location)| DirectiveSite {
                directive: directive.name.node.to_string(),
                type_name: owner.name.node.to_string(),
                field_name: definition.name.node.to_string(),
                location,
                arguments: self.directive_arguments(directive),
            })
            .collect()
    }

    /// Arguments as written, on top of the defaults of the directive
    /// definition.
    fn directive_arguments(&self, directive: &ConstDirective) -> IndexMap<Name, Value> {
        let mut arguments = IndexMap::new();
        if let Some(definition) = self.merged.directive(directive.name.node.as_str()) {
            for argument in &definition.arguments {
                if let Some(default) = &argument.node.default_value {
                    arguments.insert(argument.node.name.node.clone(), default.node.clone());
                }
            }
        }
        for (name, value) in &directive.arguments {
            arguments.insert(name.node.clone(), value.node.clone());
        }
        arguments
    }

    fn output_shape(&self, ty: &Type) -> OutputShape {
        let name = base_name(ty);
        if self.merged.is_abstract(name) {
            OutputShape::Abstract
        } else if matches!(
            self.merged.get_type(name).map(|t| &t.kind),
            Some(TypeKind::Enum(_))
        ) {
            OutputShape::Enum
        } else {
            OutputShape::Plain
        }
    }
}

fn interface_field(definition: &FieldDefinition) -> InterfaceField {
    let mut field = InterfaceField::new(
        definition.name.node.as_str(),
        type_ref(&definition.ty.node),
    );
    if let Some(description) = &definition.description {
        field = field.description(description.node.clone());
    }
    for argument in &definition.arguments {
        field = field.argument(input_value(&argument.node));
    }
    field
}

fn input_value(definition: &InputValueDefinition) -> InputValue {
    let mut value = InputValue::new(definition.name.node.as_str(), type_ref(&definition.ty.node));
    if let Some(description) = &definition.description {
        value = value.description(description.node.clone());
    }
    if let Some(default) = &definition.default_value {
        value = value.default_value(default.node.clone());
    }
    value
}

/// Converts a parsed type into an engine type reference.
fn type_ref(ty: &Type) -> TypeRef {
    let base = match &ty.base {
        BaseType::Named(name) => TypeRef::named(name.as_str()),
        BaseType::List(inner) => TypeRef::List(Box::new(type_ref(inner))),
    };
    if ty.nullable {
        base
    } else {
        TypeRef::NonNull(Box::new(base))
    }
}

fn base_name(ty: &Type) -> &str {
    match &ty.base {
        BaseType::Named(name) => name.as_str(),
        BaseType::List(inner) => base_name(inner),
    }
}

fn deprecation(directives: &[Positioned<ConstDirective>]) -> Option<String> {
    let directive = directives
        .iter()
        .find(|d| d.node.name.node.as_str() == "deprecated")?;
    let reason = match directive.node.get_argument("reason").map(|v| &v.node) {
        Some(Value::String(reason)) => reason.clone(),
        _ => DEFAULT_DEPRECATION_REASON.to_string(),
    };
    Some(reason)
}

fn specified_by_url(directives: &[Positioned<ConstDirective>]) -> Option<String> {
    let directive = directives
        .iter()
        .find(|d| d.node.name.node.as_str() == "specifiedBy")?;
    match directive.node.get_argument("url").map(|v| &v.node) {
        Some(Value::String(url)) => Some(url.clone()),
        _ => None,
    }
}

/// Collects everything a resolver gets to see.
///
/// The per-request context is the one the HTTP handlers attached to the
/// request; direct executions get a fresh anonymous context.
fn resolver_input(ctx: &ResolverContext<'_>, type_name: &str, field_name: &str) -> ResolverInput {
    let context = match ctx.ctx.data_opt::<RequestContext>() {
        Some(context) => context.clone(),
        None => ctx
            .ctx
            .data_opt::<ContextFactory>()
            .cloned()
            .unwrap_or_default()
            .create(RequestInfo::anonymous(), ResponseHandle::new()),
    };

    ResolverInput {
        parent: ctx.parent_value.as_value().cloned().unwrap_or(Value::Null),
        args: ctx
            .args
            .iter()
            .map(|(name, value)| (name.clone(), value.as_value().clone()))
            .collect(),
        context,
        type_name: type_name.to_string(),
        field_name: field_name.to_string(),
    }
}

/// Converts a resolved value into what the engine expects for a field.
fn to_field_value<'a>(value: Value, shape: OutputShape) -> Option<FieldValue<'a>> {
    let concrete_type = match (&value, shape) {
        (Value::Object(map), OutputShape::Abstract) => match map.get("__typename") {
            Some(Value::String(name)) => Some(name.clone()),
            _ => None,
        },
        _ => None,
    };

    match value {
        Value::Null => None,
        Value::List(items) => Some(FieldValue::list(
            items
                .into_iter()
                .map(|item| to_field_value(item, shape).unwrap_or(FieldValue::NULL)),
        )),
        Value::String(name) if shape == OutputShape::Enum => {
            Some(FieldValue::value(Value::Enum(Name::new(name))))
        }
        value => match concrete_type {
            Some(name) => Some(FieldValue::value(value).with_type(name)),
            None => Some(FieldValue::value(value)),
        },
    }
}
