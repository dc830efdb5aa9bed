//! Service configuration
//!
//! Three-tier resolution, most specific wins:
//! 1. Environment variables (`LECTERN_*`) for deployment overrides
//! 2. TOML configuration file
//! 3. Built-in defaults (code constants)
//!
//! Everything has a default: a missing file is not an error, and scoring
//! parameters (weights, pacing band) are validated once at load so the
//! request path never revalidates them.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::services::aggregator::Weights;
use crate::services::normalizer::PacingBand;

/// Default per-call deadline for the content pipeline. Transcription
/// plus judging is the slowest leg, so it gets the longest budget.
const DEFAULT_CONTENT_DEADLINE_MS: u64 = 150_000;
/// Default per-call deadline for the acoustic and visual pipelines.
const DEFAULT_MEDIA_DEADLINE_MS: u64 = 90_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EvalConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted upload, in bytes
    #[serde(default = "default_upload_max_bytes")]
    pub upload_max_bytes: usize,

    /// Topic used when the form does not provide one
    #[serde(default = "default_topic")]
    pub default_topic: String,

    /// Wall-clock budget for one whole evaluation
    #[serde(default = "default_overall_deadline_ms")]
    pub overall_deadline_ms: u64,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Content analyzer endpoint. `base_url` is required when the
    /// section is present in the file.
    #[serde(default = "default_content_endpoint")]
    pub content: PipelineEndpoint,

    #[serde(default = "default_acoustic_endpoint")]
    pub acoustic: PipelineEndpoint,

    #[serde(default = "default_visual_endpoint")]
    pub visual: PipelineEndpoint,

    /// Pipeline weights for aggregation
    #[serde(default)]
    pub weights: Weights,

    /// Pacing score band edges
    #[serde(default)]
    pub pacing: PacingBand,
}

/// One analyzer endpoint plus its per-call budget.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineEndpoint {
    pub base_url: String,

    /// Total budget for one supervised call, covering every retry
    /// attempt. Unset means the built-in per-pipeline default.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

/// Retry policy for transient analyzer failures.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetryConfig {
    /// Additional attempts after the first. Transient failures only;
    /// rejections and timeouts are never retried.
    #[serde(default = "default_retry_limit")]
    pub limit: u32,

    /// Pause between attempts
    #[serde(default = "default_retry_backoff_ms")]
    pub backoff_ms: u64,
}

impl RetryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            limit: default_retry_limit(),
            backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_port() -> u16 {
    5730
}

fn default_upload_max_bytes() -> usize {
    256 * 1024 * 1024 // 256 MiB, enough for an hour of compressed lecture video
}

fn default_topic() -> String {
    "General Teaching".to_string()
}

fn default_overall_deadline_ms() -> u64 {
    240_000
}

fn default_retry_limit() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    2_000
}

fn default_content_endpoint() -> PipelineEndpoint {
    PipelineEndpoint {
        base_url: "http://127.0.0.1:5731".to_string(),
        deadline_ms: None,
    }
}

fn default_acoustic_endpoint() -> PipelineEndpoint {
    PipelineEndpoint {
        base_url: "http://127.0.0.1:5732".to_string(),
        deadline_ms: None,
    }
}

fn default_visual_endpoint() -> PipelineEndpoint {
    PipelineEndpoint {
        base_url: "http://127.0.0.1:5733".to_string(),
        deadline_ms: None,
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            upload_max_bytes: default_upload_max_bytes(),
            default_topic: default_topic(),
            overall_deadline_ms: default_overall_deadline_ms(),
            retry: RetryConfig::default(),
            content: default_content_endpoint(),
            acoustic: default_acoustic_endpoint(),
            visual: default_visual_endpoint(),
            weights: Weights::default(),
            pacing: PacingBand::default(),
        }
    }
}

impl EvalConfig {
    /// Load configuration: built-in defaults, then the TOML file if one
    /// was given and exists, then environment overrides. Validates the
    /// final result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                debug!("No config file given, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Deployment-level overrides. Scoring parameters deliberately have
    /// no environment knobs; they belong in the reviewed config file.
    fn apply_env_overrides(&mut self) {
        if let Some(port) = env_parse::<u16>("LECTERN_PORT") {
            self.port = port;
        }
        if let Some(deadline) = env_parse::<u64>("LECTERN_OVERALL_DEADLINE_MS") {
            self.overall_deadline_ms = deadline;
        }
        if let Some(url) = env_parse::<String>("LECTERN_CONTENT_URL") {
            self.content.base_url = url;
        }
        if let Some(url) = env_parse::<String>("LECTERN_ACOUSTIC_URL") {
            self.acoustic.base_url = url;
        }
        if let Some(url) = env_parse::<String>("LECTERN_VISUAL_URL") {
            self.visual.base_url = url;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.weights
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.pacing.validate().map_err(ConfigError::Invalid)?;

        if self.overall_deadline_ms == 0 {
            return Err(ConfigError::Invalid(
                "overall_deadline_ms must be positive".to_string(),
            ));
        }
        if self.upload_max_bytes == 0 {
            return Err(ConfigError::Invalid(
                "upload_max_bytes must be positive".to_string(),
            ));
        }

        for (name, endpoint) in [
            ("content", &self.content),
            ("acoustic", &self.acoustic),
            ("visual", &self.visual),
        ] {
            if endpoint.base_url.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{} base_url must not be empty",
                    name
                )));
            }
            if endpoint.deadline_ms == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "{} deadline_ms must be positive",
                    name
                )));
            }
        }

        Ok(())
    }

    pub fn overall_deadline(&self) -> Duration {
        Duration::from_millis(self.overall_deadline_ms)
    }

    pub fn content_deadline(&self) -> Duration {
        Duration::from_millis(self.content.deadline_ms.unwrap_or(DEFAULT_CONTENT_DEADLINE_MS))
    }

    pub fn acoustic_deadline(&self) -> Duration {
        Duration::from_millis(self.acoustic.deadline_ms.unwrap_or(DEFAULT_MEDIA_DEADLINE_MS))
    }

    pub fn visual_deadline(&self) -> Duration {
        Duration::from_millis(self.visual.deadline_ms.unwrap_or(DEFAULT_MEDIA_DEADLINE_MS))
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<T>() {
        Ok(value) => {
            debug!(var = name, value = %raw, "Applying environment override");
            Some(value)
        }
        Err(_) => {
            warn!(var = name, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}
