use axum::{extract::State, routing::get, Router};
use ssvpl_core::SystemStatus;

use crate::{response::ApiResponse, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/admin/debug/status", get(system_status))
}

/// Always 200; an unreachable store is reported in `dbStatus`.
async fn system_status(State(state): State<AppState>) -> ApiResponse<SystemStatus> {
    let status = state.status.check().await;
    ApiResponse::ok(status, "System status")
}
