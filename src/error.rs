use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::validation::ValidationError;

/// Main error type for the inference server
#[derive(Error, Debug)]
pub enum ServeError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Model artifact errors
    #[error("Model artifact not found: {path}")]
    ArtifactMissing { path: String },

    #[error("Model artifact is corrupt ({path}): {reason}")]
    ArtifactCorrupt { path: String, reason: String },

    #[error("Unsupported model format version {found} (supported: {supported})")]
    UnsupportedFormat { found: u32, supported: u32 },

    // Model holder lifecycle errors
    #[error("Model holder already initialized")]
    AlreadyInitialized,

    #[error("Model unavailable: holder has not been initialized")]
    ModelUnavailable,

    // Request errors
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Inference failed: {0}")]
    Inference(String),

    // Training errors
    #[error("Invalid dataset: {0}")]
    Dataset(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for ServeError
pub type Result<T> = std::result::Result<T, ServeError>;

impl ServeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine readable code used in error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::ModelUnavailable => "model_unavailable",
            Self::Inference(_) => "inference_failed",
            _ => "internal_error",
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Validation(v) => json!({
                "error": self.code(),
                "detail": v.issues(),
            }),
            other => {
                error!(error = %other, "request failed");
                json!({
                    "error": other.code(),
                    "message": other.to_string(),
                })
            }
        };
        (status, Json(body)).into_response()
    }
}
