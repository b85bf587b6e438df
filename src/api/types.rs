use serde::{Deserialize, Serialize};

use crate::validation::FeatureRecord;

// ============================================================================
// Prediction Types
// ============================================================================

/// Typed form of a valid `/predict` body. The handler validates raw JSON
/// instead of deserializing this, so malformed input still gets a 422 with
/// every issue listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub data: Vec<FeatureRecord>,
}

/// Predictions aligned by index with the submitted records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: Vec<i64>,
    pub probability: Vec<Vec<f64>>,
}

impl PredictResponse {
    pub fn len(&self) -> usize {
        self.prediction.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prediction.is_empty()
    }
}
