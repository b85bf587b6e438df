use axum::{
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::api::{handlers, state::AppState};
use crate::error::ServeError;
use crate::services::HealthState;

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let health = Arc::new(HealthState::new(
        state.holder.clone(),
        Arc::clone(&state.metrics),
    ));

    Router::new()
        // Inference
        .route("/predict", post(handlers::predict))
        .route("/model", get(handlers::get_model_info))
        .with_state(state)
        // Probes and metrics
        .merge(health.router())
        // A panicking model must not take the connection task down with it
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Render a caught panic with the same JSON shape as any other inference failure.
fn panic_response(payload: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    ServeError::Inference(format!("model panicked: {detail}")).into_response()
}
