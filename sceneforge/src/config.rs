//! Pipeline configuration and credential sourcing.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for one pipeline instance.
///
/// Every field has a conservative default; construct with
/// [`PipelineConfig::default`] and override through the `with_*` builders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on concurrently in-flight generation calls for one run.
    /// `None` leaves the fan-out unbounded.
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: Option<usize>,

    /// Per-call deadline in seconds applied to each remote generation call.
    /// `None` disables the deadline.
    #[serde(default = "default_call_timeout_seconds")]
    pub call_timeout_seconds: Option<f64>,

    /// When set, any per-object image failure fails the composite stage
    /// instead of producing a composite from the surviving images.
    #[serde(default = "default_require_all_images")]
    pub require_all_images: bool,
}

fn default_max_concurrent_calls() -> Option<usize> {
    // Unbounded fan-out
    None
}

fn default_call_timeout_seconds() -> Option<f64> {
    // No deadline
    None
}

fn default_require_all_images() -> bool {
    false
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: default_max_concurrent_calls(),
            call_timeout_seconds: default_call_timeout_seconds(),
            require_all_images: default_require_all_images(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds the number of in-flight generation calls.
    #[must_use]
    pub fn with_max_concurrent_calls(mut self, max: usize) -> Self {
        self.max_concurrent_calls = Some(max);
        self
    }

    /// Sets the per-call deadline in seconds.
    #[must_use]
    pub fn with_call_timeout(mut self, seconds: f64) -> Self {
        self.call_timeout_seconds = Some(seconds);
        self
    }

    /// Requires every object image before the composite runs.
    #[must_use]
    pub fn require_all_images(mut self) -> Self {
        self.require_all_images = true;
        self
    }

    /// The per-call deadline as a [`Duration`], if configured.
    #[must_use]
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_seconds.map(Duration::from_secs_f64)
    }
}

/// API credentials for the hosted generation services.
///
/// Credentials are sourced at the process boundary and handed to the
/// adapter constructors explicitly; no client is ever built from ambient
/// global state.
#[derive(Debug, Clone)]
pub struct ServiceCredentials {
    /// Key for the Gemini analysis/image/composite backend.
    pub gemini_api_key: String,
    /// Key for the hosted mesh-generation backend.
    pub fal_api_key: String,
}

impl ServiceCredentials {
    /// Environment variable holding the Gemini key.
    pub const GEMINI_ENV: &'static str = "GEMINI_API_KEY";
    /// Environment variable holding the mesh-service key.
    pub const FAL_ENV: &'static str = "FAL_API_KEY";

    /// Creates credentials from explicit values. Blank keys are rejected.
    pub fn new(
        gemini_api_key: impl Into<String>,
        fal_api_key: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            gemini_api_key: checked_key("gemini_api_key", gemini_api_key.into())?,
            fal_api_key: checked_key("fal_api_key", fal_api_key.into())?,
        })
    }

    /// Reads both keys from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(read_env(Self::GEMINI_ENV)?, read_env(Self::FAL_ENV)?)
    }
}

fn checked_key(name: &'static str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid {
            name,
            message: "API key must not be blank".to_string(),
        });
    }
    Ok(value)
}

fn read_env(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnv(name)),
    }
}
