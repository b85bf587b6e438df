//! Health endpoints for process supervision and container platforms
//!
//! Provides liveness and readiness probes plus a Prometheus metrics endpoint.
//! Readiness follows the model holder: the service is only ready once a model
//! has been loaded.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::services::metrics::{Metrics, MetricsSnapshot};
use crate::services::model_holder::{ModelHolder, ModelInfo};

/// Health status for a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Component health check result
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Overall service health response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub components: Vec<ComponentHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelInfo>,
    pub requests: MetricsSnapshot,
}

/// Shared state for the health routes
pub struct HealthState {
    /// When the server started
    pub started_at: DateTime<Utc>,
    pub holder: ModelHolder,
    pub metrics: Arc<Metrics>,
}

impl HealthState {
    pub fn new(holder: ModelHolder, metrics: Arc<Metrics>) -> Self {
        Self {
            started_at: Utc::now(),
            holder,
            metrics,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }

    /// Get overall health status
    pub fn get_health(&self) -> HealthResponse {
        let model_ready = self.holder.is_ready();
        let model_status = if model_ready {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };

        let components = vec![ComponentHealth {
            name: "model".to_string(),
            status: model_status,
            message: if model_ready {
                None
            } else {
                Some("Model not loaded".to_string())
            },
        }];

        HealthResponse {
            status: model_status,
            timestamp: Utc::now(),
            uptime_seconds: self.uptime_seconds(),
            components,
            model: self.holder.info().cloned(),
            requests: self.metrics.snapshot(),
        }
    }

    /// Routes served from this state, ready to merge into the API router
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/healthz", get(liveness_handler))
            .route("/readyz", get(readiness_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self)
    }
}

/// Full health check endpoint
async fn health_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let health = state.get_health();
    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

/// Liveness probe - is the process alive?
async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe - is a model loaded?
async fn readiness_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    if state.holder.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Prometheus metrics endpoint
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state
        .metrics
        .prometheus(state.holder.is_ready(), state.uptime_seconds());
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; charset=utf-8",
        )],
        body,
    )
}
