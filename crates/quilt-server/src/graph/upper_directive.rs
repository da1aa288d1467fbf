use async_graphql::Value;
use futures_util::StreamExt;
use quilt_graphql::{
    DirectiveMap, DirectiveSite, FieldResolver, SchemaDirective, SubscriptionResolver,
};

pub const PATH: &str = file!();

/// Uppercases string results.
pub struct UpperDirective;

fn upper(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_uppercase()),
        other => other,
    }
}

impl SchemaDirective for UpperDirective {
    fn wrap_field(&self, resolver: FieldResolver, _site: &DirectiveSite) -> FieldResolver {
        FieldResolver::new(move |input| {
            let resolver = resolver.clone();
            async move { resolver.call(input).await.map(upper) }
        })
    }

    fn wrap_subscription(
        &self,
        resolver: SubscriptionResolver,
        _site: &DirectiveSite,
    ) -> SubscriptionResolver {
        SubscriptionResolver::new(move |input| resolver.call(input).map(|r| r.map(upper)))
    }
}

pub fn directives() -> DirectiveMap {
    DirectiveMap::new().directive("upper", UpperDirective)
}
