use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Request counters for the inference endpoint
#[derive(Debug, Default)]
pub struct Metrics {
    /// Total /predict calls received
    pub predict_requests: AtomicU64,
    /// Total records scored
    pub records_scored: AtomicU64,
    /// Requests rejected by schema validation
    pub validation_failures: AtomicU64,
    /// Requests that failed inside the model or hit an empty holder
    pub inference_failures: AtomicU64,
}

/// Point-in-time copy of [`Metrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub predict_requests: u64,
    pub records_scored: u64,
    pub validation_failures: u64,
    pub inference_failures: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_predict_requests(&self) {
        self.predict_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_records_scored(&self, n: u64) {
        self.records_scored.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_validation_failures(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_inference_failures(&self) {
        self.inference_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            predict_requests: self.predict_requests.load(Ordering::Relaxed),
            records_scored: self.records_scored.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            inference_failures: self.inference_failures.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format
    pub fn prometheus(&self, model_ready: bool, uptime_seconds: u64) -> String {
        let s = self.snapshot();
        format!(
            r#"# HELP iris_model_ready Whether a model is loaded (1) or not (0)
# TYPE iris_model_ready gauge
iris_model_ready {}

# HELP iris_uptime_seconds Uptime in seconds
# TYPE iris_uptime_seconds counter
iris_uptime_seconds {}

# HELP iris_predict_requests_total Total /predict requests received
# TYPE iris_predict_requests_total counter
iris_predict_requests_total {}

# HELP iris_records_scored_total Total records scored
# TYPE iris_records_scored_total counter
iris_records_scored_total {}

# HELP iris_validation_failures_total Requests rejected by schema validation
# TYPE iris_validation_failures_total counter
iris_validation_failures_total {}

# HELP iris_inference_failures_total Requests that failed during inference
# TYPE iris_inference_failures_total counter
iris_inference_failures_total {}
"#,
            u8::from(model_ready),
            uptime_seconds,
            s.predict_requests,
            s.records_scored,
            s.validation_failures,
            s.inference_failures,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let m = Metrics::new();
        m.inc_predict_requests();
        m.inc_predict_requests();
        m.add_records_scored(5);
        m.inc_validation_failures();
        assert_eq!(
            m.snapshot(),
            MetricsSnapshot {
                predict_requests: 2,
                records_scored: 5,
                validation_failures: 1,
                inference_failures: 0,
            }
        );
    }

    #[test]
    fn prometheus_exposes_every_counter() {
        let m = Metrics::new();
        m.inc_inference_failures();
        let text = m.prometheus(true, 12);
        assert!(text.contains("iris_model_ready 1"));
        assert!(text.contains("iris_uptime_seconds 12"));
        assert!(text.contains("iris_inference_failures_total 1"));
        assert!(text.contains("iris_predict_requests_total 0"));
    }
}
