//! Output boundary: where completed chunks leave the streamer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use flume::{Receiver, Sender, TrySendError};
use log::{debug, warn};

use stream_types::{Chunk, StreamInfo};

use crate::error::{StreamerError, StreamerResult};

/// One published stream.
pub trait Outlet: Send {
    fn info(&self) -> &StreamInfo;

    /// Publish one complete chunk. Called once per chunk, never with a
    /// partially filled buffer.
    fn push_chunk(&mut self, chunk: Chunk) -> StreamerResult<()>;
}

/// Creates outlets from stream metadata.
pub trait OutletFactory {
    fn create_outlet(&self, info: &StreamInfo) -> StreamerResult<Box<dyn Outlet>>;
}

/// An outlet shared between the streamer that created it and the single
/// worker currently feeding it.
pub type SharedOutlet = Arc<Mutex<Box<dyn Outlet>>>;

pub(crate) fn lock_outlet(outlet: &SharedOutlet) -> MutexGuard<'_, Box<dyn Outlet>> {
    outlet.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-process outlets backed by one flume channel per stream.
///
/// Receivers are kept by the factory, so chunks are buffered even before a
/// consumer asks for its receiver.
#[derive(Clone, Default)]
pub struct ChannelOutletFactory {
    capacity: Option<usize>,
    receivers: Arc<Mutex<HashMap<String, Receiver<Chunk>>>>,
}

impl ChannelOutletFactory {
    /// Unbounded channels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounded channels; chunks that do not fit are dropped with a warning.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Receiver for the stream type `stream` (e.g. `"EEG"`).
    pub fn receiver(&self, stream: &str) -> Option<Receiver<Chunk>> {
        self.receivers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(stream)
            .cloned()
    }

    pub fn streams(&self) -> Vec<String> {
        let mut streams: Vec<String> = self
            .receivers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        streams.sort();
        streams
    }
}

impl OutletFactory for ChannelOutletFactory {
    fn create_outlet(&self, info: &StreamInfo) -> StreamerResult<Box<dyn Outlet>> {
        let (tx, rx) = match self.capacity {
            Some(capacity) => flume::bounded(capacity),
            None => flume::unbounded(),
        };
        self.receivers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(info.stream.clone(), rx);
        debug!("Created channel outlet {} ({} channels)", info.name, info.channel_count);
        Ok(Box::new(ChannelOutlet {
            info: info.clone(),
            tx,
            dropped: 0,
        }))
    }
}

pub struct ChannelOutlet {
    info: StreamInfo,
    tx: Sender<Chunk>,
    dropped: u64,
}

impl Outlet for ChannelOutlet {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn push_chunk(&mut self, chunk: Chunk) -> StreamerResult<()> {
        match self.tx.try_send(chunk) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                warn!(
                    "Outlet {} is full, dropped chunk ({} so far)",
                    self.info.name, self.dropped
                );
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => {
                Err(StreamerError::OutletClosed(self.info.stream.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devices::muse2016;

    fn chunk(first_index: u64) -> Chunk {
        Chunk {
            stream: "ACC".into(),
            first_index,
            samples: vec![vec![1.0; 3]; 3],
            timestamps: vec![0.0, 0.1, 0.2],
        }
    }

    #[test]
    fn test_chunks_reach_receiver_by_stream_name() {
        let factory = ChannelOutletFactory::new();
        let info = muse2016::profile().stream_info("ACC", "test").unwrap();
        let mut outlet = factory.create_outlet(&info).unwrap();
        outlet.push_chunk(chunk(0)).unwrap();

        let rx = factory.receiver("ACC").unwrap();
        assert_eq!(rx.try_recv().unwrap().first_index, 0);
        assert_eq!(factory.streams(), vec!["ACC".to_string()]);
    }

    #[test]
    fn test_bounded_outlet_drops_overflow() {
        let factory = ChannelOutletFactory::bounded(1);
        let info = muse2016::profile().stream_info("ACC", "test").unwrap();
        let mut outlet = factory.create_outlet(&info).unwrap();
        outlet.push_chunk(chunk(0)).unwrap();
        outlet.push_chunk(chunk(3)).unwrap();

        let rx = factory.receiver("ACC").unwrap();
        assert_eq!(rx.try_recv().unwrap().first_index, 0);
        assert!(rx.try_recv().is_err());
    }
}
