//! Configuration types for runs, the controller and the HTTP transport.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::core::{EnabledSteps, StepId};
use crate::errors::ConfigError;

/// Generator settings passed through to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Generator provider name.
    pub provider: String,
    /// Generator model name.
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_temperature() -> f64 {
    0.7
}

impl GeneratorConfig {
    /// Creates a generator config with the default temperature.
    #[must_use]
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            temperature: default_temperature(),
        }
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Options for one run.
///
/// Only `enabled_steps` is interpreted by the orchestrator; everything else is
/// forwarded to the backend as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Steps taking part in the run.
    #[serde(default)]
    pub enabled_steps: EnabledSteps,
    /// Generator settings.
    pub generator_config: GeneratorConfig,
    /// Maximum number of hits to retrieve.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// System prompt override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Number of follow-up questions to request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followup_count: Option<u32>,
}

fn default_limit() -> usize {
    10
}

impl RunConfig {
    /// Creates a config with only the mandatory steps.
    #[must_use]
    pub fn new(generator_config: GeneratorConfig) -> Self {
        Self {
            enabled_steps: EnabledSteps::required(),
            generator_config,
            limit: default_limit(),
            system_prompt: None,
            followup_count: None,
        }
    }

    /// Parses a config from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and any error from
    /// [`RunConfig::validate`].
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the enabled steps. Search and generation are always added.
    #[must_use]
    pub fn with_steps(mut self, steps: impl IntoIterator<Item = StepId>) -> Self {
        self.enabled_steps = EnabledSteps::new(steps);
        self
    }

    /// Sets the hit limit.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the follow-up question count.
    #[must_use]
    pub fn with_followup_count(mut self, count: u32) -> Self {
        self.followup_count = Some(count);
        self
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let generator = &self.generator_config;
        if generator.provider.trim().is_empty() {
            return Err(ConfigError::invalid("generator_config.provider", "must not be empty"));
        }
        if generator.model.trim().is_empty() {
            return Err(ConfigError::invalid("generator_config.model", "must not be empty"));
        }
        if !(0.0..=2.0).contains(&generator.temperature) {
            return Err(ConfigError::invalid(
                "generator_config.temperature",
                format!("{} is outside [0, 2]", generator.temperature),
            ));
        }
        if self.limit == 0 {
            return Err(ConfigError::invalid("limit", "must be at least 1"));
        }
        if self.followup_count == Some(0) && self.enabled_steps.contains(StepId::Followup) {
            return Err(ConfigError::invalid(
                "followup_count",
                "must be at least 1 when the followup step is enabled",
            ));
        }
        Ok(())
    }
}

/// Settings for the run controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Longest wait between two backend events before the run fails.
    /// `None` waits forever.
    #[serde(default = "default_idle_timeout")]
    pub event_idle_timeout_seconds: Option<f64>,
    /// Message shown to the user when the transport fails.
    #[serde(default = "default_transport_error_message")]
    pub transport_error_message: String,
    /// Number of rejected transitions kept for inspection.
    #[serde(default = "default_max_diagnostics")]
    pub max_diagnostics: usize,
}

fn default_idle_timeout() -> Option<f64> {
    Some(60.0)
}

fn default_transport_error_message() -> String {
    "Connection to the search service was lost. Please try again.".to_string()
}

fn default_max_diagnostics() -> usize {
    crate::reducer::DEFAULT_MAX_DIAGNOSTICS
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            event_idle_timeout_seconds: default_idle_timeout(),
            transport_error_message: default_transport_error_message(),
            max_diagnostics: default_max_diagnostics(),
        }
    }
}

impl ControllerConfig {
    /// Creates a controller configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the idle timeout.
    #[must_use]
    pub fn with_idle_timeout(mut self, seconds: f64) -> Self {
        self.event_idle_timeout_seconds = Some(seconds);
        self
    }

    /// Disables the idle timeout.
    #[must_use]
    pub fn without_idle_timeout(mut self) -> Self {
        self.event_idle_timeout_seconds = None;
        self
    }

    /// Sets the message used for transport failures.
    #[must_use]
    pub fn with_transport_error_message(mut self, message: impl Into<String>) -> Self {
        self.transport_error_message = message.into();
        self
    }

    /// Gets the idle timeout as a Duration. Non-positive values disable it,
    /// and so do values that are not representable as a Duration.
    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.event_idle_timeout_seconds
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an idle timeout that is NaN,
    /// infinite or too large for a Duration, or an empty transport error
    /// message.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(secs) = self.event_idle_timeout_seconds {
            if secs > 0.0 && Duration::try_from_secs_f64(secs).is_err() {
                return Err(ConfigError::invalid(
                    "event_idle_timeout_seconds",
                    format!("{secs} is not a valid duration"),
                ));
            }
            if secs.is_nan() {
                return Err(ConfigError::invalid("event_idle_timeout_seconds", "must be a number"));
            }
        }
        if self.transport_error_message.trim().is_empty() {
            return Err(ConfigError::invalid("transport_error_message", "must not be empty"));
        }
        Ok(())
    }
}

/// Settings for the HTTP Server-Sent-Events transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseTransportConfig {
    /// Backend base URL, e.g. `http://localhost:8080`.
    pub base_url: String,
    /// Path of the streaming endpoint.
    #[serde(default = "default_path")]
    pub path: String,
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Additional headers, e.g. authorization.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_path() -> String {
    "/rag/stream".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

impl SseTransportConfig {
    /// Creates a config for the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: default_path(),
            connect_timeout_seconds: default_connect_timeout(),
            headers: HashMap::new(),
        }
    }

    /// Sets the endpoint path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Full endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }

    /// Gets the connect timeout as a Duration.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}
