use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use streamer::StreamerConfig;

/// Configuration for the bridge
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Registered profile name of the device to stream
    #[serde(default = "default_device")]
    pub device: String,
    /// Extra device profile (JSON or TOML) registered before lookup
    #[serde(default)]
    pub profile_file: Option<PathBuf>,
    /// Explicit stream types; the subscription policy decides when absent
    #[serde(default)]
    pub subscriptions: Option<Vec<String>>,
    /// Chunks buffered per stream before the outlet drops new ones
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Log a summary line every this many chunks per stream
    #[serde(default = "default_summary_every")]
    pub summary_every: u64,
    #[serde(default)]
    pub streamer: StreamerConfig,
}

fn default_device() -> String {
    devices::muse2016::NAME.to_string()
}

fn default_channel_capacity() -> usize {
    256
}

fn default_summary_every() -> u64 {
    50
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            profile_file: None,
            subscriptions: None,
            channel_capacity: default_channel_capacity(),
            summary_every: default_summary_every(),
            streamer: StreamerConfig::default(),
        }
    }
}

impl DaemonConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.channel_capacity == 0 {
            bail!("channel_capacity must be at least 1");
        }
        if self.summary_every == 0 {
            bail!("summary_every must be at least 1");
        }
        self.streamer.validate()?;
        Ok(())
    }
}

/// Load the bridge configuration from a `.toml` or `.json` file.
pub fn load_config(path: &Path) -> anyhow::Result<DaemonConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read configuration file at '{}'", path.display()))?;

    let config: DaemonConfig = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&contents)
            .with_context(|| format!("Could not parse configuration file at '{}'", path.display()))?,
        Some("json") => serde_json::from_str(&contents)
            .with_context(|| format!("Could not parse configuration file at '{}'", path.display()))?,
        _ => bail!("Unsupported configuration format: {}", path.display()),
    };
    config.validate()?;

    tracing::info!("Loaded configuration from {}", path.display());
    Ok(config)
}
