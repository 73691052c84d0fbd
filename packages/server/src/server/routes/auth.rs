//! Cookie hand-off to the upstream credential sidecar.

use axum::{extract::Extension, http::StatusCode, Json};
use douyin_client::ClientError;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::server::app::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub cookie: String,
}

/// Forward a fresh cookie to the scraper's credential sidecar, which
/// rewrites the scraper config and restarts the scraper process. Calls
/// made during the restart window fail as ordinary transport errors and
/// succeed on the next task admission.
pub async fn login_handler(
    Extension(state): Extension<AppState>,
    Json(request): Json<LoginRequest>,
) -> (StatusCode, Json<Value>) {
    match state.client.update_cookie(request.cookie).await {
        Ok(body) => (StatusCode::OK, Json(body)),
        Err(e @ ClientError::Transport(_)) | Err(e @ ClientError::Http { .. }) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": e.to_string()})),
        ),
        Err(e @ ClientError::Protocol(_)) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": e.to_string()})),
        ),
    }
}
