use async_graphql::Value;
use quilt_graphql::{FieldResolver, ResolverMap};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const PATH: &str = file!();

pub fn resolvers() -> ResolverMap {
    ResolverMap::new()
        .field(
            "Query",
            "hello",
            FieldResolver::new(|input| async move {
                let name = match input.arg("name") {
                    Some(Value::String(name)) => name.clone(),
                    _ => "world".to_string(),
                };
                Ok(Value::from(format!("hello, {name}")))
            }),
        )
        .field(
            "Query",
            "now",
            FieldResolver::new(|_| async {
                OffsetDateTime::now_utc()
                    .format(&Rfc3339)
                    .map(Value::from)
                    .map_err(|e| async_graphql::Error::new(e.to_string()))
            }),
        )
}
