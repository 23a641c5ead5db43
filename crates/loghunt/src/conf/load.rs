//! Load: config loading from file and environment variables.

use std::path::Path;

use thiserror::Error;

use super::model::HuntConfig;
use crate::parser::model::SeverityLevel;
use crate::parser::safe::MAX_REGEX_LINE_LENGTH;

const DEFAULT_CONFIG_FILE: &str = "loghunt.toml";

/// Shortest accepted `max_line_length`; room for the `...` marker plus content.
const MIN_LINE_LENGTH: usize = 16;

#[derive(Debug, Error)]
pub enum ConfError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl HuntConfig {
    /// Load configuration from file and environment variables
    /// Priority: Environment Variables > Config File > Defaults
    pub fn load() -> Result<Self, ConfError> {
        let config_path =
            std::env::var("LOGHUNT_CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&config_path)
    }

    /// Same as [`HuntConfig::load`] with an explicit file path. A missing
    /// file falls back to defaults.
    pub fn load_from(config_path: &str) -> Result<Self, ConfError> {
        let mut config = if Path::new(config_path).exists() {
            tracing::info!("Loading configuration from: {}", config_path);
            Self::from_file(config_path)?
        } else {
            tracing::debug!("Config file not found at {}, using defaults", config_path);
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate().map_err(ConfError::Invalid)?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfError::Read {
            path: path.to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Apply `LOGHUNT_*` overrides. Unparseable values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(format) = lookup("LOGHUNT_DEFAULT_FORMAT") {
            self.default_format = format;
        }
        if let Some(len) = lookup("LOGHUNT_MAX_LINE_LENGTH").and_then(|s| s.parse().ok()) {
            self.max_line_length = len;
        }
        if let Some(strip) = lookup("LOGHUNT_STRIP_ANSI").and_then(|s| s.parse().ok()) {
            self.strip_ansi = strip;
        }
        if let Some(threshold) = lookup("LOGHUNT_SEVERITY_THRESHOLD") {
            self.severity_threshold = threshold;
        }
        if let Some(dirs) = lookup("LOGHUNT_CONFIG_DIRS") {
            self.config_dirs = dirs.split(':').filter(|d| !d.is_empty()).map(str::to_string).collect();
        }
    }

    /// Validate that configuration values are sane
    pub fn validate(&self) -> Result<(), String> {
        if self.default_format.trim().is_empty() {
            return Err("default_format must not be empty".to_string());
        }
        if !(MIN_LINE_LENGTH..=MAX_REGEX_LINE_LENGTH).contains(&self.max_line_length) {
            return Err(format!(
                "max_line_length must be between {} and {}",
                MIN_LINE_LENGTH, MAX_REGEX_LINE_LENGTH
            ));
        }
        if SeverityLevel::from_token(&self.severity_threshold).is_none() {
            return Err(format!(
                "severity_threshold '{}' is not one of debug, info, warning, error, critical",
                self.severity_threshold
            ));
        }
        if self.content_limit == 0 {
            return Err("content_limit must be > 0".to_string());
        }
        for dir in &self.config_dirs {
            if !Path::new(dir).is_dir() {
                return Err(format!("config directory not found: {}", dir));
            }
        }
        Ok(())
    }
}
