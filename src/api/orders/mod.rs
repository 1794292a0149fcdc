//! Order API module

mod handler;

use std::time::Duration;

use axum::routing::{get, patch, post};
use axum::{Router, middleware};

use super::middleware::rate_limit::{self, RateLimitPolicy};
use crate::core::ServerState;

const CREATE_ORDER_LIMIT: RateLimitPolicy = RateLimitPolicy {
    limit: 15,
    window: Duration::from_secs(60),
};

const UPDATE_STATUS_LIMIT: RateLimitPolicy = RateLimitPolicy {
    limit: 20,
    window: Duration::from_secs(60),
};

pub fn router(state: ServerState) -> Router<ServerState> {
    let create = Router::new()
        .route("/api/v1/orders", post(handler::create))
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), CREATE_ORDER_LIMIT),
            rate_limit::enforce,
        ));

    let update_status = Router::new()
        .route("/api/v1/orders/{id}/status", patch(handler::update_status))
        .route_layer(middleware::from_fn_with_state(
            (state, UPDATE_STATUS_LIMIT),
            rate_limit::enforce,
        ));

    Router::new()
        .route("/api/v1/orders/{id}", get(handler::get_by_id))
        .merge(create)
        .merge(update_status)
}
