use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{Metrics, ModelHolder};

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    /// Model slot, filled before the listener starts
    pub holder: ModelHolder,

    /// Request counters
    pub metrics: Arc<Metrics>,

    /// Maximum records accepted per request
    pub max_batch_size: usize,
}

impl AppState {
    pub fn new(holder: ModelHolder, max_batch_size: usize) -> Self {
        Self {
            holder,
            metrics: Arc::new(Metrics::new()),
            max_batch_size,
        }
    }

    pub fn from_config(holder: ModelHolder, config: &AppConfig) -> Self {
        Self::new(holder, config.limits.max_batch_size)
    }
}
