//! Chunk assembly and timestamp synthesis for one stream.

use log::{debug, trace};

use devices::DecodedPacket;
use stream_types::{Chunk, StreamParams};

use crate::clock::Clock;
use crate::error::{StreamerError, StreamerResult};
use crate::outlet::{lock_outlet, SharedOutlet};

/// Accumulates rows of one stream into `chunk_size × channel_count` chunks
/// and hands each complete chunk to the stream's outlet.
///
/// Regular streams are stamped from the nominal rate:
/// `(sample_index + i) / nominal_srate + start_time`. Irregular streams
/// (`nominal_srate == 0`) read the host clock as each row completes.
pub struct StreamWorker {
    params: StreamParams,
    outlet: SharedOutlet,
    clock: Clock,
    start_time: f64,
    sample_index: u64,
    buffer: Vec<Vec<f64>>,
    row_times: Vec<f64>,
    filled: usize,
    chunks: u64,
}

impl StreamWorker {
    pub fn new(params: StreamParams, outlet: SharedOutlet, start_time: f64, clock: Clock) -> Self {
        let buffer = vec![vec![0.0; params.channel_count]; params.chunk_size];
        let row_times = vec![start_time; params.chunk_size];
        Self {
            params,
            outlet,
            clock,
            start_time,
            sample_index: 0,
            buffer,
            row_times,
            filled: 0,
            chunks: 0,
        }
    }

    pub fn stream(&self) -> &str {
        &self.params.name
    }

    pub fn params(&self) -> &StreamParams {
        &self.params
    }

    /// Index of the first row of the chunk being assembled.
    pub fn sample_index(&self) -> u64 {
        self.sample_index
    }

    pub fn chunks_emitted(&self) -> u64 {
        self.chunks
    }

    pub fn pending_rows(&self) -> usize {
        self.filled
    }

    /// Append one row; emits a chunk once `chunk_size` rows are buffered.
    /// Returns whether a chunk was emitted.
    pub fn push_sample(&mut self, row: &[f64]) -> StreamerResult<bool> {
        if row.len() != self.params.channel_count {
            return Err(StreamerError::ShapeMismatch {
                stream: self.params.name.clone(),
                expected: self.params.channel_count,
                actual: row.len(),
            });
        }

        self.buffer[self.filled].copy_from_slice(row);
        if !self.params.is_regular() {
            self.row_times[self.filled] = (self.clock)();
        }
        self.filled += 1;

        if self.filled == self.params.chunk_size {
            self.emit()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Write the values of one decoded notification into the buffer columns
    /// it carries. Rows beyond `chunk_size` are ignored.
    pub fn apply_packet(&mut self, packet: &DecodedPacket) {
        let rows = packet.rows().min(self.params.chunk_size);
        for row in 0..rows {
            for (k, &channel) in packet.channels.iter().enumerate() {
                if let Some(slot) = self.buffer[row].get_mut(channel) {
                    *slot = packet.value(row, k);
                }
            }
        }
    }

    /// Emit the buffer as it stands; the live path calls this when the
    /// stream's last characteristic has been received.
    pub fn complete_chunk(&mut self) -> StreamerResult<()> {
        if !self.params.is_regular() {
            let now = (self.clock)();
            self.row_times.iter_mut().for_each(|t| *t = now);
        }
        self.emit()
    }

    /// Zero the buffer without emitting; the sample index does not advance.
    pub fn discard_chunk(&mut self) {
        self.buffer.iter_mut().for_each(|row| row.fill(0.0));
        self.filled = 0;
    }

    fn timestamps(&self) -> Vec<f64> {
        if self.params.is_regular() {
            (0..self.params.chunk_size)
                .map(|i| (self.sample_index + i as u64) as f64 / self.params.nominal_srate + self.start_time)
                .collect()
        } else {
            self.row_times.clone()
        }
    }

    fn emit(&mut self) -> StreamerResult<()> {
        let timestamps = self.timestamps();
        let fresh = vec![vec![0.0; self.params.channel_count]; self.params.chunk_size];
        let chunk = Chunk {
            stream: self.params.name.clone(),
            first_index: self.sample_index,
            samples: std::mem::replace(&mut self.buffer, fresh),
            timestamps,
        };

        self.sample_index += self.params.chunk_size as u64;
        self.filled = 0;
        self.chunks += 1;

        trace!(
            "{} chunk {} at t={:.4}",
            self.params.name,
            chunk.first_index,
            chunk.timestamps[0]
        );
        if self.chunks == 1 {
            debug!("First chunk emitted on {}", self.params.name);
        }

        lock_outlet(&self.outlet).push_chunk(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::fixed_clock;
    use crate::outlet::{ChannelOutletFactory, OutletFactory};
    use devices::muse2016;
    use std::sync::{Arc, Mutex};

    fn worker(stream: &str, start_time: f64) -> (StreamWorker, flume::Receiver<Chunk>) {
        let profile = muse2016::profile();
        let factory = ChannelOutletFactory::new();
        let info = profile.stream_info(stream, "test").unwrap();
        let outlet = Arc::new(Mutex::new(factory.create_outlet(&info).unwrap()));
        let params = profile.stream(stream).unwrap().clone();
        let worker = StreamWorker::new(params, outlet, start_time, fixed_clock(99.0));
        (worker, factory.receiver(stream).unwrap())
    }

    #[test]
    fn test_chunk_emitted_after_chunk_size_rows() {
        let (mut worker, rx) = worker("ACC", 100.0);
        assert!(!worker.push_sample(&[1.0, 2.0, 3.0]).unwrap());
        assert!(!worker.push_sample(&[4.0, 5.0, 6.0]).unwrap());
        assert!(rx.try_recv().is_err());
        assert!(worker.push_sample(&[7.0, 8.0, 9.0]).unwrap());

        let chunk = rx.try_recv().unwrap();
        assert_eq!(chunk.rows(), 3);
        assert_eq!(chunk.channels(), 3);
        assert_eq!(chunk.samples[2], vec![7.0, 8.0, 9.0]);
        assert_eq!(worker.sample_index(), 3);
    }

    #[test]
    fn test_timestamps_follow_nominal_rate() {
        let (mut worker, rx) = worker("ACC", 100.0);
        for i in 0..6 {
            worker.push_sample(&[i as f64 + 1.0; 3]).unwrap();
        }
        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.timestamps[0], 100.0);
        assert_eq!(first.timestamps[1], 1.0 / 52.0 + 100.0);
        assert_eq!(second.first_index, 3);
        assert_eq!(second.timestamps[0], 3.0 / 52.0 + 100.0);
        let all: Vec<f64> = first.timestamps.iter().chain(&second.timestamps).copied().collect();
        assert!(all.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_irregular_stream_uses_host_clock() {
        let (mut worker, rx) = worker("STATUS", 100.0);
        worker.push_sample(&[1.0]).unwrap();
        let chunk = rx.try_recv().unwrap();
        assert_eq!(chunk.timestamps, vec![99.0]);
    }

    #[test]
    fn test_wrong_width_rejected() {
        let (mut worker, _rx) = worker("ACC", 0.0);
        let err = worker.push_sample(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, StreamerError::ShapeMismatch { expected: 3, actual: 2, .. }));
        assert_eq!(worker.pending_rows(), 0);
    }

    #[test]
    fn test_packets_fill_columns_until_trigger() {
        let (mut worker, rx) = worker("EEG", 0.0);
        for channel in 0..5 {
            let packet = DecodedPacket {
                handle: 0x20,
                index: 1,
                channels: vec![channel],
                values: vec![channel as f64 + 1.0; 12],
            };
            worker.apply_packet(&packet);
        }
        worker.complete_chunk().unwrap();

        let chunk = rx.try_recv().unwrap();
        assert_eq!(chunk.rows(), 12);
        assert_eq!(chunk.samples[11], vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(worker.sample_index(), 12);
        assert_eq!(chunk.timestamps[1], 1.0 / 256.0);
    }

    #[test]
    fn test_discarded_chunk_keeps_sample_index() {
        let (mut worker, rx) = worker("EEG", 0.0);
        let packet = DecodedPacket {
            handle: 0x2c,
            index: 7,
            channels: vec![4],
            values: vec![3.5; 12],
        };
        worker.apply_packet(&packet);
        worker.discard_chunk();
        assert!(rx.try_recv().is_err());
        assert_eq!(worker.sample_index(), 0);
        assert_eq!(worker.chunks_emitted(), 0);

        worker.complete_chunk().unwrap();
        let chunk = rx.try_recv().unwrap();
        assert_eq!(chunk.first_index, 0);
        assert!(chunk.is_all_zero());
    }
}
