//! Quilt server: configuration, tracing, authentication and the demo
//! fragment tree around a composed GraphQL API.

pub mod auth;
pub mod config;
pub mod graph;
pub mod observability;

pub use auth::{AuthState, authentication_middleware};
pub use config::AppConfig;
pub use config::loader::load_config;
