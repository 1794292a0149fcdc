//! Product API module

mod handler;

use axum::Router;
use axum::routing::get;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route(
        "/api/v1/products",
        get(handler::list).post(handler::create),
    )
}
