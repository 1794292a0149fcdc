//! Health check route
//!
//! Pings every dependency and reports one line per service. Any failure
//! degrades the whole response to 503 so orchestrators stop routing here.

use std::collections::BTreeMap;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/v1/health", get(health))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub services: BTreeMap<&'static str, String>,
}

async fn health(State(state): State<ServerState>) -> (StatusCode, Json<HealthResponse>) {
    let mut services = BTreeMap::new();
    let mut degraded = false;

    match crate::db::ping(&state.mongo).await {
        Ok(()) => {
            services.insert("mongodb", "ok".to_string());
        }
        Err(err) => {
            services.insert("mongodb", err.to_string());
            degraded = true;
        }
    }

    let mut redis_conn = state.redis.clone();
    let redis_ping: Result<String, redis::RedisError> =
        redis::cmd("PING").query_async(&mut redis_conn).await;
    match redis_ping {
        Ok(_) => {
            services.insert("redis", "ok".to_string());
        }
        Err(err) => {
            services.insert("redis", err.to_string());
            degraded = true;
        }
    }

    match state.broker.health_check().await {
        Ok(()) => {
            services.insert("rabbitmq", "ok".to_string());
        }
        Err(err) => {
            services.insert("rabbitmq", err.to_string());
            degraded = true;
        }
    }

    let (status, code) = if degraded {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    } else {
        ("ok", StatusCode::OK)
    };

    (code, Json(HealthResponse { status, services }))
}
