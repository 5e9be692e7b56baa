//! Configuration for the SmartCAPTCHA host.

use crate::challenge::ChallengeSettings;
use crate::core::{StepBounds, Thresholds, DEFAULT_NOISE_LEN};
use crate::verifier::{VerifierConfig, DEFAULT_VERIFY_ENDPOINT};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// URL of the remote verify endpoint
    pub verifier_endpoint: String,

    /// Timeout for one verification request
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,

    /// Delay between press and the start of recording (in milliseconds)
    pub interaction_delay_ms: u64,

    /// Delay before a failed attempt resets (in milliseconds)
    pub reset_delay_ms: u64,

    /// Step bounds of the jittered session clock
    pub clock: StepBounds,

    /// Length of the timing noise sequence (rounded up to a power of two)
    pub noise_len: usize,

    /// Fixed classifier cut-offs
    pub thresholds: Thresholds,

    /// Port for the HTTP host
    pub server_port: u16,

    /// Live challenges the HTTP host keeps at once
    pub max_challenges: usize,

    /// Idle time after which the HTTP host drops a challenge
    #[serde(with = "duration_serde")]
    pub challenge_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verifier_endpoint: DEFAULT_VERIFY_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(10),
            interaction_delay_ms: 0,
            reset_delay_ms: 250,
            clock: StepBounds::default(),
            noise_len: DEFAULT_NOISE_LEN,
            thresholds: Thresholds::default(),
            server_port: 8787,
            max_challenges: 10_000,
            challenge_ttl: Duration::from_secs(300),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when absent.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("smartcaptcha")
            .join("config.json")
    }

    /// Settings for new challenges.
    pub fn challenge_settings(&self) -> ChallengeSettings {
        ChallengeSettings {
            interaction_delay_ms: self.interaction_delay_ms as f64,
            reset_delay_ms: self.reset_delay_ms as f64,
            step_bounds: self.clock,
            thresholds: self.thresholds,
            noise_len: self.noise_len,
        }
    }

    /// Verifier client configuration.
    pub fn verifier(&self) -> VerifierConfig {
        VerifierConfig::new(self.verifier_endpoint.clone(), self.request_timeout)
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
