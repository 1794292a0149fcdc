//! Rate limiting middleware
//!
//! Counts requests per `METHOD:route:client_ip` against the Redis window.
//! Fails open: when the limiter backend errors the request proceeds, since
//! admission control must never take the write path down with it.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Json,
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::core::ServerState;

/// Per-route admission policy.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window: Duration,
}

pub async fn enforce(
    State((state, policy)): State<(ServerState, RateLimitPolicy)>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let key = format!("{}:{}:{}", request.method(), route, addr.ip());

    match state
        .rate_limiter
        .allow(&key, policy.limit, policy.window)
        .await
    {
        Ok(true) => next.run(request).await,
        Ok(false) => {
            tracing::warn!(key = %key, limit = policy.limit, "rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "rate limit exceeded" })),
            )
                .into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, key = %key, "rate limiter unavailable, allowing request");
            next.run(request).await
        }
    }
}
