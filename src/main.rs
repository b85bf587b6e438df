use clap::Parser;
use iris_serve::adapters::{bootstrap, start_api_server};
use iris_serve::cli::{self, Cli, Commands};
use iris_serve::config::{AppConfig, LoggingConfig};
use iris_serve::error::Result;
use iris_serve::ml::TrainConfig;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.clone().unwrap_or_default() {
        Commands::Serve { model, port } => {
            run_serve(&cli, model, port).await?;
        }
        Commands::Train {
            output,
            dataset,
            c,
            learning_rate,
            max_iter,
            tol,
        } => {
            init_logging(&LoggingConfig::default());
            let config = TrainConfig {
                c,
                learning_rate,
                max_iter,
                tol,
            };
            let report = cli::run_train(&output, dataset.as_deref(), &config)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Predict { model, records } => {
            init_logging_simple();
            let config = AppConfig::load_from(&cli.config)?;
            let model_path = model.unwrap_or(config.server.model_path);
            let response =
                cli::run_predict(&model_path, &records, config.limits.max_batch_size)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

/// Load config, load the model, then bind. Any failure before bind is fatal.
async fn run_serve(cli: &Cli, model: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = match AppConfig::load_from(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging(&LoggingConfig::default());
            error!(error = %e, "failed to load configuration");
            return Err(e.into());
        }
    };
    if let Some(model) = model {
        config.server.model_path = model;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    init_logging(&config.logging);
    info!(
        model_path = %config.server.model_path,
        port = config.server.port,
        max_batch_size = config.limits.max_batch_size,
        "starting iris-serve"
    );

    let holder = bootstrap(&config).inspect_err(|e| {
        error!(error = %e, "startup failed; refusing to serve without a model");
    })?;

    start_api_server(&config, holder)
        .await
        .inspect_err(|e| error!(error = %e, "API server exited with error"))
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if logging.json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

fn init_logging_simple() {
    // Minimal logging for offline commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
