//! Customer API handlers

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::core::ServerState;
use crate::core::error::ServiceResult;

#[derive(Serialize)]
pub struct CustomerResponse {
    pub id: String,
}

/// POST /api/v1/customers
pub async fn create(
    State(state): State<ServerState>,
) -> ServiceResult<(StatusCode, Json<CustomerResponse>)> {
    let id = state.customers.create().await?;
    Ok((StatusCode::CREATED, Json(CustomerResponse { id })))
}
