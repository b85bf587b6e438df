//! Process-wide slot for the served model.
//!
//! The holder is written exactly once during startup and read by every
//! request afterwards. It is a cheap clonable handle: clones share the same
//! slot, so the router state and the bootstrap code observe one model.
//! Reads are lock-free once the slot is filled.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{error, info};

use crate::error::{Result, ServeError};
use crate::ml::{Classifier, IrisPipeline, FORMAT_VERSION};
use crate::validation::FEATURE_COUNT;

/// Description of the held model, exposed on `GET /model`.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub format_version: u32,
    pub n_features: usize,
    pub classes: Vec<i64>,
    pub target_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
    pub loaded_at: DateTime<Utc>,
}

struct LoadedModel {
    model: Arc<dyn Classifier>,
    info: ModelInfo,
}

#[derive(Clone, Default)]
pub struct ModelHolder {
    slot: Arc<OnceLock<LoadedModel>>,
}

impl std::fmt::Debug for ModelHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHolder")
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl ModelHolder {
    /// An empty holder. Requests against it fail with `ModelUnavailable`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the artifact at `path` and fill the slot.
    ///
    /// Any load failure is returned unchanged; the caller treats it as fatal.
    pub fn initialize<P: AsRef<Path>>(&self, path: P) -> Result<ModelInfo> {
        let path = path.as_ref();
        if self.is_ready() {
            return Err(ServeError::AlreadyInitialized);
        }

        let started = Instant::now();
        let pipeline = IrisPipeline::from_file(path).map_err(|e| {
            error!(path = %path.display(), error = %e, "model artifact failed to load");
            e
        })?;
        let info = self.store(Arc::new(pipeline), Some(path.display().to_string()))?;

        info!(
            path = %path.display(),
            classes = ?info.classes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model loaded"
        );
        Ok(info)
    }

    /// Fill the slot with an already constructed model.
    pub fn install(&self, model: Arc<dyn Classifier>) -> Result<ModelInfo> {
        self.store(model, None)
    }

    fn store(&self, model: Arc<dyn Classifier>, artifact_path: Option<String>) -> Result<ModelInfo> {
        let info = ModelInfo {
            format_version: FORMAT_VERSION,
            n_features: FEATURE_COUNT,
            classes: model.classes().to_vec(),
            target_names: model.target_names().to_vec(),
            artifact_path,
            loaded_at: Utc::now(),
        };
        self.slot
            .set(LoadedModel {
                model,
                info: info.clone(),
            })
            .map_err(|_| ServeError::AlreadyInitialized)?;
        Ok(info)
    }

    pub fn is_ready(&self) -> bool {
        self.slot.get().is_some()
    }

    /// The held model, or `ModelUnavailable` if startup never completed.
    pub fn get(&self) -> Result<Arc<dyn Classifier>> {
        self.slot
            .get()
            .map(|loaded| Arc::clone(&loaded.model))
            .ok_or(ServeError::ModelUnavailable)
    }

    pub fn info(&self) -> Option<&ModelInfo> {
        self.slot.get().map(|loaded| &loaded.info)
    }
}
