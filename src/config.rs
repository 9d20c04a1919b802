use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const CONFIG_PATH_ENV: &str = "ARGUS_CONFIG";
const MAX_FPS: u32 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("fps must be between 1 and 1000, got {0}")]
    InvalidFps(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MailConfig {
    pub from: String,
    pub to: String,
    pub server_host: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default)]
    pub server_user: String,
    #[serde(default)]
    pub server_password: String,
}

fn default_server_port() -> u16 {
    587
}

fn default_fps() -> u32 {
    10
}

fn default_device_id() -> String {
    "0".to_string()
}

fn default_min_interval() -> u64 {
    5
}

fn default_min_area() -> f64 {
    10_000.0
}

fn default_show_video() -> bool {
    true
}

fn default_annotate_snapshots() -> bool {
    true
}

fn default_handlers() -> Vec<String> {
    vec!["console".to_string(), "archive".to_string()]
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_device_id")]
    pub device_id: String,
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: u64,
    #[serde(default = "default_min_area")]
    pub min_area: f64,
    #[serde(default = "default_show_video")]
    pub show_video: bool,
    #[serde(default = "default_annotate_snapshots")]
    pub annotate_snapshots: bool,
    #[serde(default = "default_handlers")]
    pub handlers: Vec<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub mail: Option<MailConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            device_id: default_device_id(),
            min_interval_secs: default_min_interval(),
            min_area: default_min_area(),
            show_video: default_show_video(),
            annotate_snapshots: default_annotate_snapshots(),
            handlers: default_handlers(),
            data_dir: default_data_dir(),
            mail: None,
        }
    }
}

impl Config {
    /// Loads `config.toml` (or `$ARGUS_CONFIG`), falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        match Self::load_from(&path) {
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;

        if config.fps == 0 || config.fps > MAX_FPS {
            return Err(ConfigError::InvalidFps(config.fps));
        }

        Ok(config)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis((1000 / self.fps.max(1) as u64).max(1))
    }
}
