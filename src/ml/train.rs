//! Offline trainer producing the served model artifact.
//!
//! Fits a standard scaler followed by an L2-regularized multinomial logistic
//! regression using full-batch gradient descent. Training is deterministic:
//! the same dataset and config always produce the same artifact.

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{Result, ServeError};
use crate::ml::dataset::Dataset;
use crate::ml::pipeline::{
    softmax, Classifier, IrisPipeline, LogisticRegression, StandardScaler, FORMAT_VERSION,
};
use crate::validation::{FeatureRecord, FEATURE_COUNT};

#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Inverse regularization strength (larger = weaker penalty).
    pub c: f64,
    pub learning_rate: f64,
    pub max_iter: usize,
    /// Stop once the largest absolute gradient component drops below this.
    pub tol: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            learning_rate: 0.5,
            max_iter: 5000,
            tol: 1e-6,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if !(self.c.is_finite() && self.c > 0.0) {
            errors.push("c must be finite and > 0".to_string());
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            errors.push("learning_rate must be finite and > 0".to_string());
        }
        if self.max_iter == 0 {
            errors.push("max_iter must be > 0".to_string());
        }
        if !(self.tol.is_finite() && self.tol >= 0.0) {
            errors.push("tol must be finite and >= 0".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainReport {
    pub n_samples: usize,
    pub iterations: usize,
    pub converged: bool,
    pub final_loss: f64,
    pub train_accuracy: f64,
}

/// Fit per-feature mean and population standard deviation.
pub fn fit_scaler(features: &[FeatureRecord]) -> StandardScaler {
    let n = features.len().max(1) as f64;
    let mut mean = vec![0.0; FEATURE_COUNT];
    for row in features {
        for (m, v) in mean.iter_mut().zip(row) {
            *m += v / n;
        }
    }
    let mut scale = vec![0.0; FEATURE_COUNT];
    for row in features {
        for (i, v) in row.iter().enumerate() {
            scale[i] += (v - mean[i]).powi(2) / n;
        }
    }
    for s in scale.iter_mut() {
        *s = s.sqrt();
        // Constant features would divide by zero.
        if *s == 0.0 {
            *s = 1.0;
        }
    }
    StandardScaler { mean, scale }
}

/// Train a pipeline on `dataset`.
pub fn train(dataset: &Dataset, config: &TrainConfig) -> Result<(IrisPipeline, TrainReport)> {
    dataset.validate()?;
    config.validate().map_err(ServeError::InvalidConfig)?;

    let classes = dataset.classes();
    let k = classes.len();
    let n = dataset.len();
    let nf = n as f64;

    let scaler = fit_scaler(&dataset.features);
    let x: Vec<FeatureRecord> = dataset.features.iter().map(|r| scaler.transform(r)).collect();
    let y: Vec<usize> = dataset
        .targets
        .iter()
        .map(|t| {
            classes
                .binary_search(t)
                .map_err(|_| ServeError::Internal(format!("unknown target {t}")))
        })
        .collect::<Result<_>>()?;

    info!(
        samples = n,
        classes = k,
        c = config.c,
        max_iter = config.max_iter,
        "training logistic regression"
    );

    let mut clf = LogisticRegression {
        coef: vec![vec![0.0; FEATURE_COUNT]; k],
        intercept: vec![0.0; k],
    };
    let penalty = 1.0 / (config.c * nf);

    let mut iterations = 0;
    let mut converged = false;
    let mut loss = f64::INFINITY;
    while iterations < config.max_iter {
        iterations += 1;

        let mut grad_w = vec![vec![0.0; FEATURE_COUNT]; k];
        let mut grad_b = vec![0.0; k];
        let mut data_loss = 0.0;
        for (row, &label) in x.iter().zip(&y) {
            let p = softmax(&clf.decision_function(row));
            data_loss -= p[label].max(f64::MIN_POSITIVE).ln();
            for c in 0..k {
                let err = p[c] - if c == label { 1.0 } else { 0.0 };
                grad_b[c] += err / nf;
                for (g, v) in grad_w[c].iter_mut().zip(row) {
                    *g += err * v / nf;
                }
            }
        }

        let mut weight_norm = 0.0;
        let mut max_grad: f64 = 0.0;
        for c in 0..k {
            for (g, w) in grad_w[c].iter_mut().zip(&clf.coef[c]) {
                *g += penalty * w;
                weight_norm += w * w;
                max_grad = max_grad.max(g.abs());
            }
            max_grad = max_grad.max(grad_b[c].abs());
        }
        loss = data_loss / nf + 0.5 * penalty * weight_norm;

        if max_grad < config.tol {
            converged = true;
            break;
        }

        for c in 0..k {
            for (w, g) in clf.coef[c].iter_mut().zip(&grad_w[c]) {
                *w -= config.learning_rate * g;
            }
            clf.intercept[c] -= config.learning_rate * grad_b[c];
        }

        if iterations % 1000 == 0 {
            debug!(iteration = iterations, loss, max_grad, "training progress");
        }
    }

    let mut model = IrisPipeline {
        format_version: FORMAT_VERSION,
        n_features: FEATURE_COUNT,
        classes,
        target_names: dataset.target_names.clone(),
        scaler,
        classifier: clf,
        metadata: serde_json::Value::Null,
    };
    model
        .validate()
        .map_err(|reason| ServeError::Internal(format!("trained model is invalid: {reason}")))?;

    let train_accuracy = accuracy(&model, dataset)?;
    let report = TrainReport {
        n_samples: n,
        iterations,
        converged,
        final_loss: loss,
        train_accuracy,
    };
    model.metadata = json!({
        "estimator": "standard_scaler+logistic_regression",
        "solver": "gradient_descent",
        "c": config.c,
        "learning_rate": config.learning_rate,
        "report": report,
    });

    info!(
        iterations,
        converged,
        loss,
        accuracy = train_accuracy,
        "training finished"
    );
    Ok((model, report))
}

/// Fraction of rows in `dataset` the model labels correctly.
pub fn accuracy(model: &dyn Classifier, dataset: &Dataset) -> Result<f64> {
    if dataset.is_empty() {
        return Ok(0.0);
    }
    let predicted = model.predict(&dataset.features)?;
    let correct = predicted
        .iter()
        .zip(&dataset.targets)
        .filter(|(p, t)| p == t)
        .count();
    Ok(correct as f64 / dataset.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaler_uses_population_std_and_guards_constants() {
        let rows = [[1.0, 5.0, 0.0, 2.0], [3.0, 5.0, 0.0, 4.0]];
        let s = fit_scaler(&rows);
        assert_eq!(s.mean, vec![2.0, 5.0, 0.0, 3.0]);
        assert_eq!(s.scale, vec![1.0, 1.0, 1.0, 1.0]);

        let rows = [[0.0; 4], [4.0, 0.0, 0.0, 0.0]];
        assert_eq!(fit_scaler(&rows).scale[0], 2.0);
    }

    #[test]
    fn trains_accurate_iris_model() {
        let (model, report) = train(&Dataset::iris(), &TrainConfig::default()).unwrap();
        assert_eq!(model.classes, vec![0, 1, 2]);
        assert_eq!(model.target_names.len(), 3);
        assert!(report.train_accuracy >= 0.9, "accuracy {}", report.train_accuracy);

        // Well separated setosa sample.
        assert_eq!(model.predict(&[[5.1, 3.5, 1.4, 0.2]]).unwrap(), vec![0]);
        // Typical virginica sample.
        assert_eq!(model.predict(&[[7.7, 3.0, 6.1, 2.3]]).unwrap(), vec![2]);
    }

    #[test]
    fn training_is_deterministic() {
        let config = TrainConfig {
            max_iter: 200,
            ..TrainConfig::default()
        };
        let (a, _) = train(&Dataset::iris(), &config).unwrap();
        let (b, _) = train(&Dataset::iris(), &config).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn rejects_bad_config() {
        let config = TrainConfig {
            c: 0.0,
            max_iter: 0,
            ..TrainConfig::default()
        };
        match train(&Dataset::iris(), &config) {
            Err(ServeError::InvalidConfig(errs)) => assert_eq!(errs.len(), 2),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn maps_sparse_labels_to_positions() {
        let ds = Dataset {
            features: vec![
                [0.0, 0.0, 0.0, 0.0],
                [0.1, 0.0, 0.0, 0.0],
                [5.0, 5.0, 5.0, 5.0],
                [5.1, 5.0, 5.0, 5.0],
            ],
            targets: vec![10, 10, 42, 42],
            target_names: vec![],
        };
        let (model, report) = train(&ds, &TrainConfig::default()).unwrap();
        assert_eq!(model.classes, vec![10, 42]);
        assert_eq!(report.train_accuracy, 1.0);
    }
}
