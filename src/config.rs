use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct StagehandConfig {
    #[serde(default)]
    pub container: ContainerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ContainerConfig {
    /// Name shown in logs and spans
    #[serde(default = "default_container_name")]
    pub name: String,

    /// Lifecycle event channel capacity
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Log every planned milestone before startup
    #[serde(default)]
    pub log_schedule: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Also write daily-rotated log files here
    pub directory: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DemoConfig {
    /// Application name reported by the demo settings component
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Address the demo server pretends to bind
    #[serde(default = "default_bind_ip")]
    pub bind_ip: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Register the optional metrics component
    #[serde(default)]
    pub metrics: bool,
}

impl StagehandConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("stagehand.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("container.name", default_container_name())?
            .set_default("container.event_capacity", default_event_capacity() as i64)?
            .set_default("container.log_schedule", false)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", LogFormat::default().as_str())?
            .set_default("demo.app_name", default_app_name())?
            .set_default("demo.bind_ip", default_bind_ip())?
            .set_default("demo.port", default_port())?
            .set_default("demo.metrics", false)?
            .add_source(File::with_name(&path_str).required(false))
            // STAGEHAND_DEMO__PORT=9000
            .add_source(
                Environment::with_prefix("STAGEHAND")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: StagehandConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.container.name.trim().is_empty() {
            return Err(ConfigError::Message(
                "Container name must not be empty".to_string(),
            ));
        }

        if self.container.event_capacity == 0 {
            return Err(ConfigError::Message(
                "Event capacity must be greater than 0".to_string(),
            ));
        }

        if self.demo.app_name.trim().is_empty() {
            return Err(ConfigError::Message(
                "Demo app_name must not be empty".to_string(),
            ));
        }

        if self.demo.port == 0 {
            return Err(ConfigError::Message(
                "Demo port must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            name: default_container_name(),
            event_capacity: default_event_capacity(),
            log_schedule: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            directory: None,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            bind_ip: default_bind_ip(),
            port: default_port(),
            metrics: false,
        }
    }
}

// Default value functions
fn default_container_name() -> String {
    "stagehand".to_string()
}
fn default_event_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_app_name() -> String {
    "stagehand-demo".to_string()
}
fn default_bind_ip() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
