use async_graphql::{Value, value};
use quilt_graphql::{ApiError, FieldResolver, ResolverMap};

pub const PATH: &str = file!();

fn directory() -> Vec<Value> {
    vec![
        value!({
            "id": "ada",
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "homepage": "https://example.com/ada",
        }),
        value!({
            "id": "grace",
            "name": "Grace Hopper",
            "email": "grace@example.com",
            "homepage": null,
        }),
    ]
}

fn find(id: &str) -> Option<Value> {
    directory()
        .into_iter()
        .find(|user| matches!(user, Value::Object(u) if u.get("id") == Some(&Value::from(id))))
}

/// Users unknown to the directory still get a minimal record.
fn user_or_stub(id: &str) -> Value {
    find(id).unwrap_or_else(|| value!({ "id": id, "name": id }))
}

pub fn resolvers() -> ResolverMap {
    ResolverMap::new()
        .field(
            "Query",
            "users",
            FieldResolver::new(|_| async { Ok(Value::List(directory())) }),
        )
        .field(
            "Query",
            "me",
            FieldResolver::new(|input| async move {
                Ok(input.context.user_id().map_or(Value::Null, user_or_stub))
            }),
        )
        .field(
            "Mutation",
            "rename",
            FieldResolver::new(|input| async move {
                let name = match input.arg("name") {
                    Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
                    _ => {
                        return Err(ApiError::user_input("name must not be blank").into_error());
                    }
                };
                let id = input.context.user_id().unwrap_or_default();
                let mut user = user_or_stub(id);
                if let Value::Object(fields) = &mut user {
                    fields.insert(async_graphql::Name::new("name"), Value::from(name));
                }
                tracing::info!(user = %id, "User renamed");
                Ok(user)
            }),
        )
}
