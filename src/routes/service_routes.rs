// src/routes/service_routes.rs

use axum::{Json, Router, extract::State, routing::get};

use crate::{
    error::ApiError,
    models::{ApiOk, AppState, Service},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_services))
}

/// Public catalog: only active services are offered to bookers.
pub async fn list_services(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<Vec<Service>>>, ApiError> {
    let rows = state.store.list_services(true).await?;
    Ok(Json(ApiOk { data: rows }))
}
