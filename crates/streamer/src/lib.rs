//! Streamers for wearable biosensors
//!
//! A `Streamer` turns one device's data into chunked, timestamped streams, one
//! outlet per subscribed stream. The samples come from a `DataSource`: a live
//! device over a GATT transport, a synthetic generator, or a recorded session
//! replayed from disk.

pub mod clock;
pub mod config;
pub mod error;
pub mod outlet;
pub mod replay;
pub mod sources;
pub mod streamer;
pub mod subscription;
pub mod worker;

// Re-export the main types that users need
pub use clock::{fixed_clock, system_clock, Clock};
pub use config::{StreamerConfig, SubscriptionPolicy};
pub use error::{ReplayError, ReplayResult, StreamerError, StreamerResult};
pub use outlet::{ChannelOutlet, ChannelOutletFactory, Outlet, OutletFactory, SharedOutlet};
pub use replay::{ConsolePrompt, FileReplaySource, MetadataSource, ReplayState, SessionFiles, SessionPrompt, StreamCollector};
pub use sources::{DummySource, LiveSource, LiveStats, ReplaySource};
pub use streamer::{DataSource, Dummy, LiveStreamer, Replay, SourceContext, Streamer, StreamerState};
pub use subscription::SubscriptionResolver;
pub use worker::StreamWorker;
