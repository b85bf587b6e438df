pub mod adapters;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod ml;
pub mod services;
pub mod validation;

pub use adapters::{bootstrap, bootstrap_with_model, start_api_server};
pub use api::{create_router, AppState};
pub use config::AppConfig;
pub use error::{Result, ServeError};
pub use ml::{Classifier, IrisPipeline};
pub use services::{ModelHolder, ModelInfo};
pub use validation::{validate_predict_request, FeatureRecord, ValidationError};
