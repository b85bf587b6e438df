use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::api::{handlers::run_inference, types::PredictResponse};
use crate::error::Result;
use crate::ml::{train, Dataset, IrisPipeline, TrainConfig, TrainReport};
use crate::validation::validate_predict_request;

#[derive(Parser)]
#[command(name = "iris-serve")]
#[command(version)]
#[command(about = "HTTP inference server for a pre-trained iris classifier", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config directory (default.toml, <IRIS_ENV>.toml)
    #[arg(short, long, default_value = "config", env = "IRIS_CONFIG_DIR")]
    pub config: String,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Load the model and serve the HTTP API (default)
    Serve {
        /// Model artifact path (overrides server.model_path)
        #[arg(short, long)]
        model: Option<String>,
        /// Listening port (overrides PORT and server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Train a model artifact offline
    Train {
        /// Where to write the artifact
        #[arg(short, long, default_value = "models/iris_v1.json")]
        output: PathBuf,
        /// JSON dataset file; the built-in iris data when omitted
        #[arg(long)]
        dataset: Option<PathBuf>,
        /// Inverse regularization strength
        #[arg(long, default_value = "1.0")]
        c: f64,
        /// Gradient descent step size
        #[arg(long, default_value = "0.5")]
        learning_rate: f64,
        /// Maximum gradient descent iterations
        #[arg(long, default_value = "5000")]
        max_iter: usize,
        /// Convergence tolerance on the gradient
        #[arg(long, default_value = "1e-6")]
        tol: f64,
    },
    /// Score records with an artifact without starting a server
    Predict {
        /// Model artifact path (overrides server.model_path)
        #[arg(short, long)]
        model: Option<String>,
        /// Records as comma separated values, e.g. 5.1,3.5,1.4,0.2
        #[arg(required = true)]
        records: Vec<String>,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Serve {
            model: None,
            port: None,
        }
    }
}

/// Train and write an artifact to `output`.
pub fn run_train(
    output: &Path,
    dataset: Option<&Path>,
    config: &TrainConfig,
) -> Result<TrainReport> {
    let dataset = match dataset {
        Some(path) => {
            info!(path = %path.display(), "loading dataset");
            Dataset::from_file(path)?
        }
        None => Dataset::iris(),
    };

    let (model, report) = train(&dataset, config)?;
    model.to_file(output)?;
    info!(
        path = %output.display(),
        accuracy = report.train_accuracy,
        "model artifact written"
    );
    Ok(report)
}

/// Turn `"5.1,3.5,1.4,0.2"` style arguments into a `/predict` body.
///
/// Fields that do not parse as numbers are kept as strings so the schema
/// validator reports them the same way the HTTP endpoint would.
pub fn records_to_body(records: &[String]) -> Value {
    let rows: Vec<Value> = records
        .iter()
        .map(|record| {
            Value::Array(
                record
                    .split(',')
                    .map(str::trim)
                    .map(|field| match field.parse::<f64>() {
                        Ok(v) if v.is_finite() => json!(v),
                        _ => Value::String(field.to_string()),
                    })
                    .collect(),
            )
        })
        .collect();
    json!({ "data": rows })
}

/// Offline equivalent of `POST /predict`.
pub fn run_predict(
    model_path: &str,
    records: &[String],
    max_batch_size: usize,
) -> Result<PredictResponse> {
    let records = validate_predict_request(&records_to_body(records), max_batch_size)?;
    let model = IrisPipeline::from_file(model_path)?;
    run_inference(&model, &records)
}
