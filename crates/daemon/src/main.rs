use std::path::PathBuf;
use std::time::Duration;

use ble2lsl::bridge::{load_registry, Bridge, Mode};
use ble2lsl::config::{load_config, DaemonConfig};
use ble2lsl::monitor::spawn_watchers;
use clap::Parser;
use streamer::{ChannelOutletFactory, ConsolePrompt};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Stream a wearable biosensor's data as chunked, timestamped streams
#[derive(Parser, Debug)]
#[command(name = "ble2lsl", version)]
struct Args {
    /// Data source
    #[arg(long, value_enum, default_value = "dummy")]
    mode: Mode,

    /// Device profile name (overrides the configuration file)
    #[arg(long)]
    device: Option<String>,

    /// Extra device profile file (JSON or TOML)
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Configuration file (TOML or JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stream types to subscribe to, comma separated
    #[arg(long, value_delimiter = ',')]
    subscribe: Option<Vec<String>>,

    /// Directory searched for recorded sessions in replay mode
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    duration_secs: Option<u64>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<(DaemonConfig, Mode, Option<PathBuf>, Option<u64>)> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => DaemonConfig::default(),
        };
        if let Some(device) = self.device {
            config.device = device;
        }
        if let Some(profile) = self.profile {
            config.profile_file = Some(profile);
        }
        if let Some(subscribe) = self.subscribe {
            config.subscriptions = Some(subscribe);
        }
        config.validate()?;
        Ok((config, self.mode, self.data_dir, self.duration_secs))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ble2lsl=info,streamer=info,devices=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (config, mode, data_dir, duration_secs) = Args::parse().into_config()?;
    tracing::info!("ble2lsl starting for device '{}'", config.device);

    let registry = load_registry(&config)?;
    let outlets = ChannelOutletFactory::bounded(config.channel_capacity);

    // Session selection may read stdin, so keep it off the async workers.
    let mut bridge = {
        let config = config.clone();
        let outlets = outlets.clone();
        tokio::task::spawn_blocking(move || {
            let mut prompt = ConsolePrompt::stdio();
            Bridge::launch(&config, &registry, mode, data_dir.as_deref(), &outlets, &mut prompt)
        })
        .await??
    };
    let watchers = spawn_watchers(&outlets, config.summary_every);

    // --- Graceful Shutdown ---
    match duration_secs {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    tracing::info!("Ran for {}s, stopping", secs);
                }
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    tracing::info!("Shutdown signal received");
                }
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
            tracing::info!("Shutdown signal received");
        }
    }

    if let Err(e) = bridge.stop() {
        tracing::warn!("Streamer did not stop cleanly: {}", e);
    }
    // Dropping the streamer closes its outlets, which ends the watchers.
    drop(bridge);
    drop(outlets);

    for watcher in watchers {
        let summary = watcher.await?;
        tracing::info!(
            "{}: {} chunk(s), {} row(s), {} discontinuit(ies)",
            summary.stream,
            summary.chunks,
            summary.rows,
            summary.discontinuities
        );
    }
    tracing::info!("ble2lsl stopped");
    Ok(())
}
