use anyhow::{Context, Result};
use config::{Config, File};
use log::{debug, info, LevelFilter};
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::{EngineSettings, WaitSettings};
use crate::models::{default_channels, Channel};

fn default_url() -> String {
    "http://127.0.0.1:8000/api/sensors/latest".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn deserialize_channel_list<'de, D>(deserializer: D) -> Result<Vec<Channel>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    let channels: Vec<Channel> = value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(Channel::from)
        .collect();

    if channels.is_empty() {
        return Err(serde::de::Error::custom("channel list is empty"));
    }
    Ok(channels)
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EndpointConfig {
    pub url: String,
    pub request_timeout_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            request_timeout_ms: 4000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub start_visible: bool,
    #[serde(deserialize_with = "deserialize_channel_list")]
    pub channels: Vec<Channel>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 3000,
            start_visible: true,
            channels: default_channels(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WaitConfig {
    pub max_wait_ms: u64,
    pub interval_ms: u64,
    pub probe_timeout_ms: u64,
    pub error_threshold: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            max_wait_ms: 30_000,
            interval_ms: 2000,
            probe_timeout_ms: 5000,
            error_threshold: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: String,
    pub key: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: "cache".to_string(),
            key: "latest_sensor_snapshot".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub wait: WaitConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self> {
        Self::from_file("config.ini")
    }

    pub fn get_log_level(&self) -> LevelFilter {
        match self.logging.level.to_lowercase().as_str() {
            "trace" => LevelFilter::Trace,
            "debug" => LevelFilter::Debug,
            "info" => LevelFilter::Info,
            "warn" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            "off" => LevelFilter::Off,
            _ => LevelFilter::Info, // Default to Info if invalid
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.endpoint.request_timeout_ms)
    }

    pub fn cache_dir(&self) -> PathBuf {
        PathBuf::from(&self.cache.dir)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            channels: self.polling.channels.clone(),
            poll_interval: Duration::from_millis(self.polling.interval_ms.max(1)),
            start_visible: self.polling.start_visible,
            wait: WaitSettings {
                max_wait: Duration::from_millis(self.wait.max_wait_ms),
                interval: Duration::from_millis(self.wait.interval_ms.max(1)),
                probe_timeout: Duration::from_millis(self.wait.probe_timeout_ms),
                error_threshold: self.wait.error_threshold.max(1),
            },
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();
        debug!("Loading configuration from {}", config_path.display());

        let config = Config::builder()
            .add_source(File::from(config_path).format(config::FileFormat::Ini))
            .build()
            .context(format!("Failed to load config from {}", config_path.display()))?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize config")?;

        Ok(app_config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config_path = path.as_ref();
        let channels: Vec<&str> = self.polling.channels.iter().map(Channel::as_str).collect();

        let mut config_str = String::new();

        config_str.push_str(&format!(
            "[endpoint]\nurl = {}\nrequest_timeout_ms = {}\n\n",
            self.endpoint.url, self.endpoint.request_timeout_ms
        ));

        config_str.push_str(&format!(
            "[polling]\ninterval_ms = {}\nstart_visible = {}\nchannels = {}\n\n",
            self.polling.interval_ms,
            self.polling.start_visible,
            channels.join(",")
        ));

        config_str.push_str(&format!(
            "[wait]\nmax_wait_ms = {}\ninterval_ms = {}\nprobe_timeout_ms = {}\nerror_threshold = {}\n\n",
            self.wait.max_wait_ms,
            self.wait.interval_ms,
            self.wait.probe_timeout_ms,
            self.wait.error_threshold
        ));

        config_str.push_str(&format!(
            "[cache]\nenabled = {}\ndir = {}\nkey = {}\n\n",
            self.cache.enabled, self.cache.dir, self.cache.key
        ));

        config_str.push_str(&format!("[logging]\nlevel = {}\n", self.logging.level));

        fs::write(config_path, config_str)
            .context(format!("Failed to save config to {}", config_path.display()))?;

        info!("Configuration saved to {}", config_path.display());
        Ok(())
    }
}
