//! Builds and drives the streamer selected on the command line.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::ValueEnum;
use devices::DeviceRegistry;
use stream_types::DeviceProfile;
use streamer::replay::SessionPrompt;
use streamer::{
    ChannelOutletFactory, Dummy, DummySource, Replay, ReplaySource, StreamerResult, SubscriptionResolver,
};

use crate::config::DaemonConfig;

/// Where samples come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Synthetic signals shaped like the device's streams
    Dummy,
    /// A recorded session read from `--data-dir`
    Replay,
}

/// Built-in profiles plus the configured profile file, if any.
pub fn load_registry(config: &DaemonConfig) -> anyhow::Result<DeviceRegistry> {
    let mut registry = DeviceRegistry::builtin();
    if let Some(path) = &config.profile_file {
        let profile = registry
            .load_file(path)
            .with_context(|| format!("Could not load device profile {}", path.display()))?;
        tracing::info!("Registered device profile '{}' from {}", profile.name, path.display());
    }
    Ok(registry)
}

fn lookup(registry: &DeviceRegistry, name: &str) -> anyhow::Result<Arc<DeviceProfile>> {
    registry.get(name).ok_or_else(|| {
        anyhow!(
            "Unknown device '{}', known devices: {}",
            name,
            registry.names().join(", ")
        )
    })
}

/// A running streamer of either flavour.
pub enum Bridge {
    Dummy(Dummy),
    Replay(Replay),
}

impl Bridge {
    /// Construct, connect and start the streamer for `mode`.
    pub fn launch(
        config: &DaemonConfig,
        registry: &DeviceRegistry,
        mode: Mode,
        data_dir: Option<&Path>,
        outlets: &ChannelOutletFactory,
        prompt: &mut dyn SessionPrompt,
    ) -> anyhow::Result<Self> {
        let profile = lookup(registry, &config.device)?;
        let bridge = match mode {
            Mode::Dummy => Bridge::Dummy(Dummy::launch(
                profile,
                DummySource::new(),
                config.subscriptions.as_deref(),
                outlets,
                config.streamer.clone(),
            )?),
            Mode::Replay => {
                let dir = data_dir.ok_or_else(|| anyhow!("--data-dir is required in replay mode"))?;
                let source = ReplaySource::open(dir, prompt, &config.streamer)?;
                let subscriptions = match &config.subscriptions {
                    Some(explicit) => explicit.clone(),
                    None => recorded_defaults(&profile, config, &source.streams())?,
                };
                Bridge::Replay(Replay::launch(
                    profile,
                    source,
                    Some(&subscriptions),
                    outlets,
                    config.streamer.clone(),
                )?)
            }
        };
        tracing::info!("Streaming {:?} for [{}]", mode, bridge.subscriptions().join(", "));
        Ok(bridge)
    }

    pub fn subscriptions(&self) -> &[String] {
        match self {
            Bridge::Dummy(s) => s.subscriptions(),
            Bridge::Replay(s) => s.subscriptions(),
        }
    }

    pub fn active_workers(&self) -> Vec<String> {
        match self {
            Bridge::Dummy(s) => s.active_workers(),
            Bridge::Replay(s) => s.active_workers(),
        }
    }

    pub fn stop(&mut self) -> StreamerResult<()> {
        match self {
            Bridge::Dummy(s) => s.stop(),
            Bridge::Replay(s) => s.stop(),
        }
    }
}

/// Default subscriptions restricted to the streams the session recorded.
fn recorded_defaults(
    profile: &DeviceProfile,
    config: &DaemonConfig,
    recorded: &[String],
) -> anyhow::Result<Vec<String>> {
    let defaults = SubscriptionResolver::defaults(profile, config.streamer.subscription_policy);
    let (kept, skipped): (Vec<String>, Vec<String>) =
        defaults.into_iter().partition(|stream| recorded.contains(stream));
    if !skipped.is_empty() {
        tracing::info!("Session has no recording for [{}], not subscribing", skipped.join(", "));
    }
    if kept.is_empty() {
        bail!("Session records none of {}'s default streams", profile.name);
    }
    Ok(kept)
}
