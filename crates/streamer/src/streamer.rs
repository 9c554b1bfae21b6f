//! The streamer: one type, composed with a pluggable data source.

use std::fmt;
use std::sync::{Arc, Mutex};

use log::{info, warn};

use stream_types::{DeviceProfile, StreamInfo};

use crate::clock::{system_clock, Clock};
use crate::config::StreamerConfig;
use crate::error::{StreamerError, StreamerResult};
use crate::outlet::{OutletFactory, SharedOutlet};
use crate::sources::{DummySource, LiveSource, ReplaySource};
use crate::subscription::SubscriptionResolver;
use crate::worker::StreamWorker;

/// Lifecycle of a streamer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamerState {
    Constructed,
    Connected,
    Running,
    Stopped,
}

impl StreamerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamerState::Constructed => "constructed",
            StreamerState::Connected => "connected",
            StreamerState::Running => "running",
            StreamerState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for StreamerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of a streamer handed to its data source.
pub struct SourceContext<'a> {
    pub profile: &'a Arc<DeviceProfile>,
    pub subscriptions: &'a [String],
    pub config: &'a StreamerConfig,
}

/// Where samples come from. Every source feeds the same `StreamWorker`s, so
/// what reaches the outlets is identical in shape and timing whichever
/// source is used.
pub trait DataSource: Send {
    /// Short name used in thread names and source ids.
    fn kind(&self) -> &'static str;

    fn connect(&mut self, ctx: &SourceContext<'_>) -> StreamerResult<()>;

    /// Take ownership of one worker per subscribed stream and begin feeding
    /// them.
    fn start(&mut self, workers: Vec<StreamWorker>, ctx: &SourceContext<'_>) -> StreamerResult<()>;

    fn stop(&mut self, ctx: &SourceContext<'_>) -> StreamerResult<()>;

    fn disconnect(&mut self) -> StreamerResult<()>;

    /// Streams whose producer is currently alive.
    fn active_workers(&self) -> Vec<String>;
}

/// Streams from a device over the wireless transport.
pub type LiveStreamer<T> = Streamer<LiveSource<T>>;
/// Streams synthetic data.
pub type Dummy = Streamer<DummySource>;
/// Streams a recorded session.
pub type Replay = Streamer<ReplaySource>;

/// Drives one device: resolves subscriptions, owns one outlet per subscribed
/// stream and moves through `constructed → connected → running → stopped`.
pub struct Streamer<S: DataSource> {
    profile: Arc<DeviceProfile>,
    subscriptions: Vec<String>,
    outlets: Vec<(String, SharedOutlet)>,
    config: StreamerConfig,
    source: S,
    clock: Clock,
    state: StreamerState,
    start_time: Option<f64>,
}

impl<S: DataSource> Streamer<S> {
    /// Resolve subscriptions and create one outlet per subscribed stream.
    ///
    /// `subscriptions` overrides the defaults chosen by
    /// `config.subscription_policy`; every name must be a profile stream.
    pub fn new(
        profile: Arc<DeviceProfile>,
        source: S,
        subscriptions: Option<&[String]>,
        outlets: &dyn OutletFactory,
        config: StreamerConfig,
    ) -> StreamerResult<Self> {
        config.validate()?;
        let subscriptions =
            SubscriptionResolver::resolve(&profile, subscriptions, config.subscription_policy)?;

        let source_id = format!("{}-{}", profile.name, source.kind());
        let mut created = Vec::with_capacity(subscriptions.len());
        for stream in &subscriptions {
            let info = profile
                .stream_info(stream, &source_id)
                .ok_or_else(|| StreamerError::UnknownStream(stream.clone()))?;
            let outlet = outlets.create_outlet(&info)?;
            created.push((stream.clone(), Arc::new(Mutex::new(outlet))));
        }

        info!(
            "{} streamer for {} subscribed to [{}]",
            source.kind(),
            profile.name,
            subscriptions.join(", ")
        );

        Ok(Self {
            profile,
            subscriptions,
            outlets: created,
            config,
            source,
            clock: system_clock(),
            state: StreamerState::Constructed,
            start_time: None,
        })
    }

    /// Construct, connect and start in one call.
    pub fn launch(
        profile: Arc<DeviceProfile>,
        source: S,
        subscriptions: Option<&[String]>,
        outlets: &dyn OutletFactory,
        config: StreamerConfig,
    ) -> StreamerResult<Self> {
        let mut streamer = Self::new(profile, source, subscriptions, outlets, config)?;
        streamer.connect()?;
        streamer.start()?;
        Ok(streamer)
    }

    /// Replace the host clock used for `start_time` and irregular stamps.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn profile(&self) -> &Arc<DeviceProfile> {
        &self.profile
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    pub fn state(&self) -> StreamerState {
        self.state
    }

    /// Host time captured by the last `start()`.
    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn stream_info(&self, stream: &str) -> Option<StreamInfo> {
        self.outlets
            .iter()
            .find(|(name, _)| name == stream)
            .map(|(_, outlet)| crate::outlet::lock_outlet(outlet).info().clone())
    }

    pub fn active_workers(&self) -> Vec<String> {
        self.source.active_workers()
    }

    fn invalid(&self, operation: &'static str) -> StreamerError {
        StreamerError::InvalidState {
            operation,
            state: self.state.as_str(),
        }
    }

    pub fn connect(&mut self) -> StreamerResult<()> {
        if self.state != StreamerState::Constructed {
            return Err(self.invalid("connect"));
        }
        let ctx = SourceContext {
            profile: &self.profile,
            subscriptions: &self.subscriptions,
            config: &self.config,
        };
        self.source.connect(&ctx)?;
        self.state = StreamerState::Connected;
        Ok(())
    }

    /// Create fresh workers sharing one `start_time` and hand them to the
    /// source.
    pub fn start(&mut self) -> StreamerResult<()> {
        if !matches!(self.state, StreamerState::Connected | StreamerState::Stopped) {
            return Err(self.invalid("start"));
        }

        let start_time = (self.clock)();
        let mut workers = Vec::with_capacity(self.outlets.len());
        for (stream, outlet) in &self.outlets {
            let params = self
                .profile
                .stream(stream)
                .ok_or_else(|| StreamerError::UnknownStream(stream.clone()))?
                .clone();
            workers.push(StreamWorker::new(params, outlet.clone(), start_time, self.clock.clone()));
        }

        let ctx = SourceContext {
            profile: &self.profile,
            subscriptions: &self.subscriptions,
            config: &self.config,
        };
        self.source.start(workers, &ctx)?;
        self.start_time = Some(start_time);
        self.state = StreamerState::Running;
        info!("{} streamer for {} running", self.source.kind(), self.profile.name);
        Ok(())
    }

    /// Stop producing. Producer threads are joined within
    /// `config.stop_timeout_ms`; the streamer is `stopped` even when that
    /// deadline is missed.
    pub fn stop(&mut self) -> StreamerResult<()> {
        if self.state != StreamerState::Running {
            return Err(self.invalid("stop"));
        }
        let ctx = SourceContext {
            profile: &self.profile,
            subscriptions: &self.subscriptions,
            config: &self.config,
        };
        let result = self.source.stop(&ctx);
        self.state = StreamerState::Stopped;
        info!("{} streamer for {} stopped", self.source.kind(), self.profile.name);
        result
    }

    /// Release the source, stopping first if needed. The streamer can be
    /// connected again afterwards.
    pub fn disconnect(&mut self) -> StreamerResult<()> {
        match self.state {
            StreamerState::Constructed => return Err(self.invalid("disconnect")),
            StreamerState::Running => {
                if let Err(e) = self.stop() {
                    warn!("Stop before disconnect failed: {}", e);
                }
            }
            StreamerState::Connected | StreamerState::Stopped => {}
        }
        self.source.disconnect()?;
        self.state = StreamerState::Constructed;
        Ok(())
    }
}

impl<S: DataSource> Drop for Streamer<S> {
    fn drop(&mut self) {
        if self.state != StreamerState::Constructed {
            if let Err(e) = self.disconnect() {
                warn!("Error while dropping streamer for {}: {}", self.profile.name, e);
            }
        }
    }
}
