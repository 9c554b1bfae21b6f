//! Streamer configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StreamerError, StreamerResult};

/// How the default subscription set is computed when none is given explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPolicy {
    /// The device's declared default list, verbatim.
    #[default]
    DeviceDefaults,
    /// Every stream with a positive nominal sample rate.
    PositiveRate,
}

/// Runtime settings shared by every streamer flavour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamerConfig {
    #[serde(default)]
    pub subscription_policy: SubscriptionPolicy,
    /// Upper bound on how long `stop()` waits for worker threads.
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
    /// Invalid answers tolerated by the session prompt before giving up.
    #[serde(default = "default_prompt_attempts")]
    pub prompt_attempts: u32,
    /// Row period for streams without a nominal rate.
    #[serde(default = "default_irregular_period_ms")]
    pub irregular_period_ms: u64,
    /// Scan duration when the device address has to be discovered.
    #[serde(default = "default_scan_timeout_ms")]
    pub scan_timeout_ms: u64,
}

fn default_stop_timeout_ms() -> u64 {
    1000
}

fn default_prompt_attempts() -> u32 {
    3
}

fn default_irregular_period_ms() -> u64 {
    1000
}

fn default_scan_timeout_ms() -> u64 {
    10_500
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            subscription_policy: SubscriptionPolicy::default(),
            stop_timeout_ms: default_stop_timeout_ms(),
            prompt_attempts: default_prompt_attempts(),
            irregular_period_ms: default_irregular_period_ms(),
            scan_timeout_ms: default_scan_timeout_ms(),
        }
    }
}

impl StreamerConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> StreamerResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: StreamerConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> StreamerResult<()> {
        if self.prompt_attempts == 0 {
            return Err(StreamerError::InvalidConfiguration(
                "prompt_attempts must be at least 1".into(),
            ));
        }
        if self.irregular_period_ms == 0 {
            return Err(StreamerError::InvalidConfiguration(
                "irregular_period_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn irregular_period(&self) -> Duration {
        Duration::from_millis(self.irregular_period_ms)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: StreamerConfig =
            serde_json::from_str(r#"{ "subscription_policy": "positive_rate" }"#).unwrap();
        assert_eq!(config.subscription_policy, SubscriptionPolicy::PositiveRate);
        assert_eq!(config.stop_timeout_ms, 1000);
        assert_eq!(config.prompt_attempts, 3);
        assert_eq!(config.scan_timeout(), Duration::from_millis(10_500));
    }

    #[test]
    fn test_from_file_rejects_zero_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streamer.json");
        std::fs::write(&path, r#"{ "prompt_attempts": 0 }"#).unwrap();
        assert!(matches!(
            StreamerConfig::from_file(&path),
            Err(StreamerError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_from_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streamer.json");
        let config = StreamerConfig { stop_timeout_ms: 250, ..Default::default() };
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();
        assert_eq!(StreamerConfig::from_file(&path).unwrap(), config);
    }
}
