use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub matching: MatchingSettings,
    pub database: DatabaseSettings,
    pub notification: NotificationSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Knobs of the matching algorithm itself.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    /// Maximum absolute rating difference accepted between intents.
    #[serde(default = "default_rating_tolerance")]
    pub rating_tolerance: i32,
    /// Maximum great-circle distance between intents, in kilometers.
    #[serde(default = "default_max_distance_km")]
    pub max_distance_km: f64,
    /// Capacity of the attempt job queue.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            rating_tolerance: default_rating_tolerance(),
            max_distance_km: default_max_distance_km(),
            queue_depth: default_queue_depth(),
        }
    }
}

fn default_rating_tolerance() -> i32 {
    3
}
fn default_max_distance_km() -> f64 {
    10.0
}
fn default_queue_depth() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationSettings {
    pub endpoint: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Environment variables (prefixed with SQUADMATCH_)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            // Local overrides for development
            .add_source(File::with_name("config/local").required(false))
            // e.g., SQUADMATCH_MATCHING__MAX_DISTANCE_KM -> matching.max_distance_km
            .add_source(
                Environment::with_prefix("SQUADMATCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("SQUADMATCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}
