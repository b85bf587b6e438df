pub mod health;
pub mod metrics;
pub mod model_holder;

pub use health::{ComponentHealth, HealthResponse, HealthState, HealthStatus};
pub use metrics::{Metrics, MetricsSnapshot};
pub use model_holder::{ModelHolder, ModelInfo};
