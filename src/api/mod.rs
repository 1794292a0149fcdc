//! HTTP API
//!
//! All routes live under `/api/v1`:
//!
//! - [`health`]: dependency health aggregation
//! - [`orders`]: create, fetch, status updates (rate limited)
//! - [`products`]: create and list
//! - [`customers`]: create
//!
//! Requests and responses are JSON. Service errors map onto status codes via
//! [`crate::core::error::ServiceError`].

pub mod customers;
pub mod health;
pub mod middleware;
pub mod orders;
pub mod products;

use axum::Router;

use crate::core::ServerState;

pub fn router(state: ServerState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(orders::router(state.clone()))
        .merge(products::router())
        .merge(customers::router())
        .layer(axum::middleware::from_fn(middleware::logging::log_request))
        .with_state(state)
}
