//! Daemon configuration.
//!
//! Loaded from a YAML file, with defaults matching the original deployment
//! (Cologne coordinates, 30-minute interval, `csv/` storage directory).
//! The S3 section is optional; without it the mirror is disabled.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
}

/// Location to poll, fixed for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        // Cologne city centre
        Self {
            latitude: 50.93,
            longitude: 6.95,
        }
    }
}

/// Open-Meteo request parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_hourly_fields")]
    pub hourly_fields: Vec<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u8,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            hourly_fields: default_hourly_fields(),
            timezone: default_timezone(),
            forecast_days: default_forecast_days(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}

fn default_hourly_fields() -> Vec<String> {
    ["rain", "showers", "visibility", "temperature_2m"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_timezone() -> String {
    "Europe/Berlin".to_string()
}

fn default_forecast_days() -> u8 {
    1
}

/// Snapshot storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_dir")]
    pub dir: String,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            file_prefix: default_file_prefix(),
        }
    }
}

fn default_storage_dir() -> String {
    "csv".to_string()
}

fn default_file_prefix() -> String {
    "cologne_current_weather".to_string()
}

/// S3 mirror credentials and target bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Endpoint override for S3-compatible stores (MinIO etc.).
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Root daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub location: LocationConfig,
    pub fetch: FetchConfig,
    pub storage: StorageConfig,
    /// Poll interval in seconds. Zero means poll continuously.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    pub s3: Option<S3Config>,
}

fn default_interval_secs() -> u64 {
    30 * 60
}

fn default_http_port() -> u16 {
    5000
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            location: LocationConfig::default(),
            fetch: FetchConfig::default(),
            storage: StorageConfig::default(),
            interval_secs: default_interval_secs(),
            http_port: default_http_port(),
            s3: None,
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
