use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::api::state::AppState;
use crate::services::ModelInfo;

/// GET /model
///
/// Describes the held model. 503 until startup has loaded one.
pub async fn get_model_info(
    State(state): State<AppState>,
) -> std::result::Result<Json<ModelInfo>, (StatusCode, Json<Value>)> {
    match state.holder.info() {
        Some(info) => Ok(Json(info.clone())),
        None => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": "model_unavailable",
                "message": "no model has been loaded",
            })),
        )),
    }
}
