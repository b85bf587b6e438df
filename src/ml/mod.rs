//! Model artifact, inference and offline training.
//!
//! Everything here is plain `f64` math on the CPU; the artifact is JSON.

pub mod dataset;
pub mod pipeline;
pub mod train;

pub use dataset::Dataset;
pub use pipeline::{Classifier, IrisPipeline, LogisticRegression, StandardScaler, FORMAT_VERSION};
pub use train::{train, TrainConfig, TrainReport};
