use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub listen: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub sampler: SamplerOptions,
    #[serde(default)]
    pub tracking: TrackingOptions,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SamplerOptions {
    #[serde(default = "default_top_processes")]
    pub top_processes: usize,
    #[serde(default = "default_gpu_timeout_ms")]
    pub gpu_timeout_ms: u64,
    #[serde(default = "default_degrade_after_failures")]
    pub degrade_after_failures: u32,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackingOptions {
    #[serde(default = "default_tracking_duration_secs")]
    pub duration_secs: u64,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            top_processes: default_top_processes(),
            gpu_timeout_ms: default_gpu_timeout_ms(),
            degrade_after_failures: default_degrade_after_failures(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            duration_secs: default_tracking_duration_secs(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.trim().is_empty() {
            return Err(ConfigError::Validation("listen is required".to_string()));
        }
        if SocketAddr::from_str(&self.listen).is_err() {
            return Err(ConfigError::Validation(
                "listen must be a valid host:port address".to_string(),
            ));
        }
        if self.interval_secs < 1 {
            return Err(ConfigError::Validation(
                "interval_secs must be >= 1".to_string(),
            ));
        }
        if self.tracking.duration_secs < self.interval_secs {
            return Err(ConfigError::Validation(
                "tracking.duration_secs must be >= interval_secs".to_string(),
            ));
        }
        if self.sampler.top_processes < 1 {
            return Err(ConfigError::Validation(
                "sampler.top_processes must be >= 1".to_string(),
            ));
        }
        if self.sampler.gpu_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "sampler.gpu_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.sampler.degrade_after_failures < 1 {
            return Err(ConfigError::Validation(
                "sampler.degrade_after_failures must be >= 1".to_string(),
            ));
        }
        if self.sampler.event_buffer < 1 {
            return Err(ConfigError::Validation(
                "sampler.event_buffer must be >= 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

const fn default_interval_secs() -> u64 {
    1
}

const fn default_top_processes() -> usize {
    5
}

const fn default_gpu_timeout_ms() -> u64 {
    800
}

const fn default_degrade_after_failures() -> u32 {
    3
}

const fn default_event_buffer() -> usize {
    64
}

const fn default_tracking_duration_secs() -> u64 {
    300
}
