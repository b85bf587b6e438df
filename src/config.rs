use config::{Config, ConfigError, Environment, File, Map};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

/// Platform-assigned port variable (Heroku, Cloud Run, ...). Wins over
/// every other source when set.
pub const PORT_ENV: &str = "PORT";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind (IP literal)
    pub host: String,
    /// Listening port
    pub port: u16,
    /// Model artifact produced by `iris-serve train`
    pub model_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum records accepted in one /predict call
    pub max_batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        Self::build(config_dir.as_ref(), None)
    }

    /// Same as [`AppConfig::load_from`] but reads variables from `vars`
    /// instead of the process environment.
    pub fn load_with_env<P: AsRef<Path>>(
        config_dir: P,
        vars: Map<String, String>,
    ) -> Result<Self, ConfigError> {
        Self::build(config_dir.as_ref(), Some(vars))
    }

    fn build(config_dir: &Path, vars: Option<Map<String, String>>) -> Result<Self, ConfigError> {
        let lookup = |key: &str| match &vars {
            Some(map) => map.get(key).cloned(),
            None => std::env::var(key).ok(),
        };

        let profile = lookup("IRIS_ENV").unwrap_or_else(|| "development".to_string());
        let platform_port = lookup(PORT_ENV).filter(|p| !p.trim().is_empty());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("server.model_path", "models/iris_v1.json")?
            .set_default("limits.max_batch_size", 1024)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(File::from(config_dir.join(profile)).required(false))
            // Override with environment variables (IRIS_SERVER__PORT, etc.)
            .add_source(
                Environment::with_prefix("IRIS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(vars.clone()),
            )
            .set_override_option("server.port", platform_port)?;

        builder.build()?.try_deserialize()
    }

    /// Create a default configuration, used by tests and offline commands
    pub fn default_config(model_path: &str) -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                model_path: model_path.to_string(),
            },
            limits: LimitsConfig {
                max_batch_size: 1024,
            },
            logging: LoggingConfig::default(),
        }
    }

    /// Address the listener binds to
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        let ip: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| format!("server.host '{}' is not an IP address", self.server.host))?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.socket_addr() {
            errors.push(e);
        }

        if self.server.model_path.trim().is_empty() {
            errors.push("server.model_path must not be empty".to_string());
        }

        if self.limits.max_batch_size == 0 {
            errors.push("limits.max_batch_size must be > 0".to_string());
        }

        if self
            .logging
            .level
            .parse::<tracing::Level>()
            .is_err()
        {
            errors.push(format!("logging.level '{}' is not a level", self.logging.level));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
