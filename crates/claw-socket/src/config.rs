//! Connection configuration.
//!
//! Hooks are supplied in code; everything else can be loaded from a JSON
//! file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SocketError};
use crate::reconnect::ReconnectConfig;
use crate::store::DEFAULT_MAX_STORED_REQUESTS;

const fn default_max_stored_requests() -> usize {
    DEFAULT_MAX_STORED_REQUESTS
}

/// Configuration for one managed connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SocketConfig {
    /// Name used in notifications and logs.
    pub connection_name: String,
    /// Endpoint URL.
    pub url: String,
    /// Log lifecycle transitions.
    #[serde(default)]
    pub debug_logging: bool,
    /// Log every payload sent and received.
    #[serde(default)]
    pub debug_message_logging: bool,
    /// Bound on remembered subscriptions.
    #[serde(default = "default_max_stored_requests")]
    pub max_stored_requests: usize,
    /// Reconnect backoff.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl SocketConfig {
    /// Configuration with defaults for everything but name and URL.
    #[must_use]
    pub fn new(connection_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            connection_name: connection_name.into(),
            url: url.into(),
            debug_logging: false,
            debug_message_logging: false,
            max_stored_requests: DEFAULT_MAX_STORED_REQUESTS,
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Enable or disable lifecycle logging.
    #[must_use]
    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    /// Enable or disable payload logging.
    #[must_use]
    pub fn with_debug_message_logging(mut self, enabled: bool) -> Self {
        self.debug_message_logging = enabled;
        self
    }

    /// Set the subscription store bound.
    #[must_use]
    pub fn with_max_stored_requests(mut self, max: usize) -> Self {
        self.max_stored_requests = max;
        self
    }

    /// Set the reconnect backoff.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Set the reconnect backoff bounds.
    #[must_use]
    pub fn with_reconnect_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect = ReconnectConfig {
            initial_delay: initial,
            max_delay: max,
        };
        self
    }

    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SocketError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or fails validation.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| SocketError::Config(format!("invalid JSON: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.connection_name.trim().is_empty() {
            return Err(SocketError::Config(
                "connection_name cannot be empty".to_string(),
            ));
        }

        if self.url.trim().is_empty() {
            return Err(SocketError::Config("url cannot be empty".to_string()));
        }

        if self.max_stored_requests == 0 {
            return Err(SocketError::Config(
                "max_stored_requests must be at least 1".to_string(),
            ));
        }

        if self.reconnect.initial_delay.is_zero() {
            return Err(SocketError::Config(
                "reconnect.initial_delay_ms must be greater than 0".to_string(),
            ));
        }

        if self.reconnect.initial_delay > self.reconnect.max_delay {
            return Err(SocketError::Config(format!(
                "reconnect.initial_delay_ms ({}) exceeds reconnect.max_delay_ms ({})",
                self.reconnect.initial_delay.as_millis(),
                self.reconnect.max_delay.as_millis()
            )));
        }

        Ok(())
    }
}
