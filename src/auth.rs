use crate::error::LoginError;
use crate::identity::AccountInfo;
use crate::startup::AppState;
use axum::{
    extract::{Extension, Json, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: AccountInfo,
}

pub async fn login(
    Extension(app_state): Extension<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, LoginError> {
    let Json(payload) = payload.map_err(|rejection| match rejection {
        JsonRejection::MissingJsonContentType(_) => LoginError::NotJson,
        _ => LoginError::InvalidBody,
    })?;

    info!("Login attempt for {}", payload.username);

    let grant = app_state
        .accounts
        .login(&payload.username, &payload.password)
        .inspect_err(|e| warn!("Login failed for {}: {e}", payload.username))?;

    Ok((
        StatusCode::OK,
        Json(LoginResponse {
            success: true,
            message: "Login exitoso".to_string(),
            token: grant.token,
            user: grant.user,
        }),
    ))
}

pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "OK",
            "message": "Servidor funcionando"
        })),
    )
}

/// Connectivity check for clients: echoes whatever JSON it receives.
pub async fn echo(Json(data): Json<Value>) -> impl IntoResponse {
    info!("Test endpoint received: {data}");

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Endpoint de prueba funcionando",
            "received_data": data
        })),
    )
}
