//! Scan pipeline configuration.
//!
//! Every knob the scan flow needs is a named field of `ScanConfig`.
//! Sources, lowest precedence first: built-in defaults, a JSON file,
//! then `PADDYPADI_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::preprocess::{Normalization, ResizeMode};

/// Application-level constants
pub const APP_NAME: &str = "PaddyPadi";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix shared by every environment override.
const ENV_PREFIX: &str = "PADDYPADI_";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "paddypadi_lib=info,warn"
}

/// Application data directory (`<platform data dir>/PaddyPadi`).
///
/// Falls back to the working directory on platforms without a data dir.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Directory holding the on-device screening model.
pub fn models_dir() -> PathBuf {
    app_data_dir().join("models")
}

/// Default location of the screening model artifact.
pub fn screening_model_path() -> PathBuf {
    models_dir().join("screening").join("model.onnx")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Everything the scan pipeline reads at construction time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanConfig {
    /// Screening model artifact (`model.onnx`).
    pub model_path: PathBuf,
    /// Optional `labels.txt`; the built-in paddy label set is used when absent.
    pub labels_path: Option<PathBuf>,
    /// Name of the model's input node.
    pub input_name: String,
    /// Square input side the model was trained on.
    pub target_size: u32,
    pub resize_mode: ResizeMode,
    /// Must match what the deployed model was trained with.
    pub normalization: Normalization,
    /// Label that skips expert escalation.
    pub healthy_label: String,
    pub expert_url: String,
    pub expert_timeout_secs: u64,
    /// Multipart field carrying the image bytes.
    pub expert_field_name: String,
    pub poll_interval_ms: u64,
    /// Whether captures are escalated to the expert model at all.
    pub escalation_enabled: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            model_path: screening_model_path(),
            labels_path: None,
            input_name: "input_1".into(),
            target_size: 224,
            resize_mode: ResizeMode::CenterCrop,
            normalization: Normalization::Unit,
            healthy_label: "normal".into(),
            expert_url: "http://127.0.0.1:8000/predict".into(),
            expert_timeout_secs: 30,
            expert_field_name: "image".into(),
            poll_interval_ms: 500,
            escalation_enabled: true,
        }
    }
}

impl ScanConfig {
    /// Defaults overlaid with a JSON file. Missing keys keep their default.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Full resolution: defaults, optional file, process environment, validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        tracing::debug!(?config, "Scan configuration resolved");
        Ok(config)
    }

    /// Apply `PADDYPADI_*` overrides read through `lookup`.
    ///
    /// Takes a lookup function so tests never touch the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));

        if let Some(v) = get("MODEL_PATH") {
            self.model_path = PathBuf::from(v);
        }
        if let Some(v) = get("LABELS_PATH") {
            self.labels_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("INPUT_NAME") {
            self.input_name = v;
        }
        if let Some(v) = get("TARGET_SIZE") {
            self.target_size = parse_number("PADDYPADI_TARGET_SIZE", &v)?;
        }
        if let Some(v) = get("RESIZE_MODE") {
            self.resize_mode = parse_enum("PADDYPADI_RESIZE_MODE", &v)?;
        }
        if let Some(v) = get("NORMALIZATION") {
            self.normalization = parse_enum("PADDYPADI_NORMALIZATION", &v)?;
        }
        if let Some(v) = get("HEALTHY_LABEL") {
            self.healthy_label = v;
        }
        if let Some(v) = get("EXPERT_URL") {
            self.expert_url = v;
        }
        if let Some(v) = get("EXPERT_TIMEOUT_SECS") {
            self.expert_timeout_secs = parse_number("PADDYPADI_EXPERT_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("POLL_INTERVAL_MS") {
            self.poll_interval_ms = parse_number("PADDYPADI_POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = get("ESCALATION_ENABLED") {
            self.escalation_enabled = match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: "PADDYPADI_ESCALATION_ENABLED",
                        reason: format!("expected a boolean, got {other:?}"),
                    })
                }
            };
        }
        Ok(())
    }

    /// Reject values that would only fail later, deep inside a scan.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_size == 0 {
            return Err(invalid("target_size", "must be greater than zero"));
        }
        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms", "must be greater than zero"));
        }
        if self.expert_timeout_secs == 0 {
            return Err(invalid("expert_timeout_secs", "must be greater than zero"));
        }
        if self.input_name.trim().is_empty() {
            return Err(invalid("input_name", "must not be empty"));
        }
        if self.healthy_label.trim().is_empty() {
            return Err(invalid("healthy_label", "must not be empty"));
        }
        if self.expert_field_name.trim().is_empty() {
            return Err(invalid("expert_field_name", "must not be empty"));
        }
        let url = reqwest::Url::parse(&self.expert_url)
            .map_err(|e| invalid("expert_url", &e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("expert_url", "scheme must be http or https"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn expert_timeout(&self) -> Duration {
        Duration::from_secs(self.expert_timeout_secs)
    }
}

fn invalid(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        reason: reason.to_string(),
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        reason: e.to_string(),
    })
}

/// Parse a snake_case enum value the same way the JSON file spells it.
fn parse_enum<T: serde::de::DeserializeOwned>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_string())).map_err(|e| {
        ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
        }
    })
}
