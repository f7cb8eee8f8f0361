//! Configuration types for Understudy

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::fingerprint::FingerprintPolicy;
use crate::storage::REDACTED;
use crate::{Result, UnderstudyError};

/// Operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Record mode: perform real calls and store them
    Record,
    /// Replay mode: serve from recordings only
    Replay,
    /// Replay when a recording exists, record otherwise
    Auto,
}

impl Mode {
    /// Whether this mode may touch the network
    #[must_use]
    pub fn uses_network(self) -> bool {
        matches!(self, Self::Record | Self::Auto)
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Operating mode
    pub mode: Mode,
    /// Directory for storing/loading recordings
    pub recording_dir: PathBuf,
    /// Request matching rules
    #[serde(default)]
    pub fingerprint: FingerprintPolicy,
    /// Redaction configuration
    #[serde(default)]
    pub redaction: RedactionConfig,
    /// Resource limits
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Redaction applied to stored requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    /// Request headers whose values are never written to disk
    pub request_headers: Vec<String>,
    /// Literal secrets scrubbed from stored URLs and header values
    pub secrets: Vec<String>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            request_headers: vec![
                "authorization".to_string(),
                "cookie".to_string(),
                "proxy-authorization".to_string(),
            ],
            secrets: Vec::new(),
        }
    }
}

impl RedactionConfig {
    /// Whether the value of header `name` is redacted
    #[must_use]
    pub fn redacts_header(&self, name: &str) -> bool {
        self.request_headers
            .iter()
            .any(|h| h.eq_ignore_ascii_case(name))
    }

    /// Replace every configured secret in `value`
    #[must_use]
    pub fn scrub(&self, value: &str) -> String {
        self.secrets
            .iter()
            .filter(|s| !s.is_empty())
            .fold(value.to_string(), |acc, secret| acc.replace(secret.as_str(), REDACTED))
    }
}

/// Resource limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum response body size in bytes
    pub max_body_size: usize,
    /// Maximum headers per response
    pub max_headers: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 16 * 1024 * 1024, // 16 MB
            max_headers: 128,
        }
    }
}

impl Config {
    /// Configuration with default policy, redaction and limits
    pub fn new(mode: Mode, recording_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            recording_dir: recording_dir.into(),
            fingerprint: FingerprintPolicy::default(),
            redaction: RedactionConfig::default(),
            limits: LimitsConfig::default(),
        }
    }

    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| UnderstudyError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| UnderstudyError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        // Replay never creates the directory
        if self.mode == Mode::Replay && !self.recording_dir.is_dir() {
            return Err(UnderstudyError::ConfigError(format!(
                "Recording directory does not exist: {}",
                self.recording_dir.display()
            )));
        }

        if self.recording_dir.as_os_str().is_empty() {
            return Err(UnderstudyError::ConfigError(
                "recording_dir cannot be empty".to_string(),
            ));
        }

        for (i, name) in self.fingerprint.match_headers.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(UnderstudyError::ConfigError(format!(
                    "fingerprint.match_headers[{i}] cannot be empty"
                )));
            }
        }

        if self.limits.max_body_size == 0 {
            return Err(UnderstudyError::ConfigError(
                "limits.max_body_size must be > 0".to_string(),
            ));
        }
        if self.limits.max_headers == 0 {
            return Err(UnderstudyError::ConfigError(
                "limits.max_headers must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
