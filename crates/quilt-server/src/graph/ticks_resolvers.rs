use std::time::Duration;

use async_graphql::Value;
use quilt_graphql::{ApiError, ResolverMap, SubscriptionResolver};

pub const PATH: &str = file!();

fn int_arg(value: Option<&Value>, default: i64) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(default),
        _ => default,
    }
}

pub fn resolvers() -> ResolverMap {
    ResolverMap::new().subscription(
        "Subscription",
        "ticks",
        SubscriptionResolver::new(|input| {
            let count = int_arg(input.arg("count"), 3);
            let interval = int_arg(input.arg("intervalMs"), 1000);
            async_stream::stream! {
                // tokio::time::interval panics on a zero period.
                if interval < 1 {
                    yield Err(ApiError::user_input("intervalMs must be at least 1").into_error());
                    return;
                }
                let mut timer = tokio::time::interval(Duration::from_millis(interval as u64));
                for tick in 1..=count {
                    timer.tick().await;
                    yield Ok(Value::from(tick));
                }
            }
        }),
    )
}
