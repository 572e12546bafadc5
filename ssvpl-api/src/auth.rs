use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ssvpl_core::AdminPrincipal;
use ssvpl_shared::Masked;

use crate::{error::AppError, response::ApiResponse, state::AppState};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: Masked<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub admin: AdminPrincipal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeResponse {
    pub revoked_at: DateTime<Utc>,
}

/// Routes reachable without a token.
pub fn routes() -> Router<AppState> {
    Router::new().route("/auth/admin/login", post(login_admin))
}

/// Session routes; mounted behind `require_admin`.
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/auth/me", get(current_admin))
        .route("/admin/auth/revoke", post(revoke_sessions))
}

async fn login_admin(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<ApiResponse<LoginResponse>, AppError> {
    let issued = state.auth.login(&req.email, &req.password).await?;

    Ok(ApiResponse::ok(
        LoginResponse { token: issued.token, expires_at: issued.expires_at, admin: issued.admin },
        "Login successful",
    ))
}

async fn current_admin(Extension(principal): Extension<AdminPrincipal>) -> ApiResponse<AdminPrincipal> {
    ApiResponse::ok(principal, "Authenticated admin")
}

async fn revoke_sessions(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
) -> Result<ApiResponse<RevokeResponse>, AppError> {
    state.auth.revoke(principal.id).await?;
    tracing::info!("Revoked all sessions for admin {}", principal.id);

    Ok(ApiResponse::ok(RevokeResponse { revoked_at: state.clock.now() }, "All sessions revoked"))
}
