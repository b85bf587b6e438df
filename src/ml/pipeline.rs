//! Scaler + multinomial logistic regression inference (CPU-only).
//!
//! The model artifact is a JSON document produced by the offline trainer
//! (`iris-serve train`). Loading is strict: any shape inconsistency,
//! non-finite parameter or unknown format version is rejected so the server
//! never starts with a half-usable model.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, ServeError};
use crate::validation::{FeatureRecord, FEATURE_COUNT};

/// Artifact format version written and accepted by this build.
pub const FORMAT_VERSION: u32 = 1;

/// Anything the inference endpoint can serve.
///
/// Implementations must be pure with respect to their inputs: the same batch
/// always yields the same output, and calls never mutate model state.
pub trait Classifier: Send + Sync {
    /// Class labels, in probability-vector order.
    fn classes(&self) -> &[i64];

    /// Human readable class names, if known.
    fn target_names(&self) -> &[String] {
        &[]
    }

    /// Predicted label per record, in input order.
    fn predict(&self, batch: &[FeatureRecord]) -> Result<Vec<i64>>;

    /// Probability vector over `classes()` per record, in input order.
    fn predict_proba(&self, batch: &[FeatureRecord]) -> Result<Vec<Vec<f64>>>;
}

/// Z-score normalization fitted on training data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn transform(&self, x: &FeatureRecord) -> FeatureRecord {
        let mut out = *x;
        for (i, v) in out.iter_mut().enumerate() {
            *v = (*v - self.mean[i]) / self.scale[i];
        }
        out
    }
}

/// Linear multinomial classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Shape: [n_classes][n_features]
    pub coef: Vec<Vec<f64>>,
    /// Shape: [n_classes]
    pub intercept: Vec<f64>,
}

impl LogisticRegression {
    pub fn n_classes(&self) -> usize {
        self.coef.len()
    }

    /// Raw per-class scores for an already scaled record.
    pub fn decision_function(&self, x: &[f64]) -> Vec<f64> {
        self.coef
            .iter()
            .zip(&self.intercept)
            .map(|(row, b)| row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + b)
            .collect()
    }
}

/// Softmax with max-subtraction for numerical stability.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest value; first one wins on ties.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[derive(Deserialize)]
struct ArtifactHeader {
    format_version: u32,
}

/// Serialized `StandardScaler -> LogisticRegression` pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrisPipeline {
    pub format_version: u32,
    pub n_features: usize,
    pub classes: Vec<i64>,
    #[serde(default)]
    pub target_names: Vec<String>,
    pub scaler: StandardScaler,
    pub classifier: LogisticRegression,

    /// Optional free-form metadata (training info, dataset, etc).
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl IrisPipeline {
    /// Load and validate an artifact from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let content = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ServeError::ArtifactMissing {
                    path: display.clone(),
                }
            } else {
                ServeError::Io(e)
            }
        })?;
        Self::from_json_slice(&content, &display)
    }

    /// Parse and validate an artifact. `origin` is only used in error messages.
    pub fn from_json_str(content: &str, origin: &str) -> Result<Self> {
        Self::from_json_slice(content.as_bytes(), origin)
    }

    /// Same as [`IrisPipeline::from_json_str`] for raw bytes, which need not be UTF-8.
    pub fn from_json_slice(content: &[u8], origin: &str) -> Result<Self> {
        let corrupt = |reason: String| ServeError::ArtifactCorrupt {
            path: origin.to_string(),
            reason,
        };

        let header: ArtifactHeader =
            serde_json::from_slice(content).map_err(|e| corrupt(e.to_string()))?;
        if header.format_version != FORMAT_VERSION {
            return Err(ServeError::UnsupportedFormat {
                found: header.format_version,
                supported: FORMAT_VERSION,
            });
        }

        let model: Self = serde_json::from_slice(content).map_err(|e| corrupt(e.to_string()))?;
        model.validate().map_err(corrupt)?;
        Ok(model)
    }

    /// Write the artifact as pretty JSON, creating parent directories.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.n_features != FEATURE_COUNT {
            return Err(format!(
                "n_features {} != {}",
                self.n_features, FEATURE_COUNT
            ));
        }
        if self.classes.len() < 2 {
            return Err("at least 2 classes are required".to_string());
        }
        let mut seen = self.classes.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != self.classes.len() {
            return Err("classes must be unique".to_string());
        }
        if !self.target_names.is_empty() && self.target_names.len() != self.classes.len() {
            return Err(format!(
                "target_names length {} != classes {}",
                self.target_names.len(),
                self.classes.len()
            ));
        }

        if self.scaler.mean.len() != self.n_features {
            return Err(format!(
                "scaler.mean length {} != n_features {}",
                self.scaler.mean.len(),
                self.n_features
            ));
        }
        if self.scaler.scale.len() != self.n_features {
            return Err(format!(
                "scaler.scale length {} != n_features {}",
                self.scaler.scale.len(),
                self.n_features
            ));
        }
        if self.scaler.mean.iter().any(|v| !v.is_finite()) {
            return Err("scaler.mean must be finite".to_string());
        }
        if self.scaler.scale.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err("scaler.scale must be finite and > 0".to_string());
        }

        let clf = &self.classifier;
        if clf.n_classes() != self.classes.len() {
            return Err(format!(
                "classifier.coef rows {} != classes {}",
                clf.n_classes(),
                self.classes.len()
            ));
        }
        if clf.intercept.len() != self.classes.len() {
            return Err(format!(
                "classifier.intercept length {} != classes {}",
                clf.intercept.len(),
                self.classes.len()
            ));
        }
        for (r, row) in clf.coef.iter().enumerate() {
            if row.len() != self.n_features {
                return Err(format!(
                    "classifier.coef row {r} len {} != n_features {}",
                    row.len(),
                    self.n_features
                ));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(format!("classifier.coef row {r} contains non-finite values"));
            }
        }
        if clf.intercept.iter().any(|v| !v.is_finite()) {
            return Err("classifier.intercept contains non-finite values".to_string());
        }
        Ok(())
    }

    fn proba_one(&self, idx: usize, x: &FeatureRecord) -> Result<Vec<f64>> {
        let scaled = self.scaler.transform(x);
        let proba = softmax(&self.classifier.decision_function(&scaled));
        if proba.iter().any(|p| !p.is_finite()) {
            return Err(ServeError::Inference(format!(
                "non-finite probabilities for record {idx}"
            )));
        }
        Ok(proba)
    }
}

impl Classifier for IrisPipeline {
    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn target_names(&self) -> &[String] {
        &self.target_names
    }

    fn predict(&self, batch: &[FeatureRecord]) -> Result<Vec<i64>> {
        self.predict_proba(batch)?
            .iter()
            .map(|p| Ok(self.classes[argmax(p)]))
            .collect()
    }

    fn predict_proba(&self, batch: &[FeatureRecord]) -> Result<Vec<Vec<f64>>> {
        batch
            .iter()
            .enumerate()
            .map(|(i, x)| self.proba_one(i, x))
            .collect()
    }
}
