//! Consumes the channel outlets and logs what flows through them.

use flume::Receiver;
use stream_types::Chunk;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Running totals for one stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSummary {
    pub stream: String,
    pub chunks: u64,
    pub rows: u64,
    pub next_index: Option<u64>,
    pub last_timestamp: Option<f64>,
    /// Chunks whose first index did not follow the previous chunk.
    pub discontinuities: u64,
}

impl StreamSummary {
    pub fn new(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, chunk: &Chunk) {
        if let Some(expected) = self.next_index {
            if chunk.first_index != expected {
                self.discontinuities += 1;
                warn!(
                    "{}: chunk starts at {} after {} (restart?)",
                    self.stream, chunk.first_index, expected
                );
            }
        }
        self.chunks += 1;
        self.rows += chunk.rows() as u64;
        self.next_index = Some(chunk.first_index + chunk.rows() as u64);
        self.last_timestamp = chunk.timestamps.last().copied();
    }

    /// Mean of every value in `chunk`, per channel.
    pub fn channel_means(chunk: &Chunk) -> Vec<f64> {
        (0..chunk.channels())
            .filter_map(|c| chunk.column(c))
            .map(|column| column.iter().sum::<f64>() / column.len().max(1) as f64)
            .collect()
    }
}

/// Drain `rx` until every sender is gone, logging every `every` chunks.
pub async fn watch(stream: String, rx: Receiver<Chunk>, every: u64) -> StreamSummary {
    let mut summary = StreamSummary::new(stream);
    while let Ok(chunk) = rx.recv_async().await {
        summary.record(&chunk);
        if summary.chunks == 1 || summary.chunks % every == 0 {
            let means = StreamSummary::channel_means(&chunk)
                .iter()
                .map(|m| format!("{:.2}", m))
                .collect::<Vec<_>>()
                .join(", ");
            info!(
                "{}: chunk {} ({} rows total), t={:.3}, means [{}]",
                summary.stream,
                summary.chunks,
                summary.rows,
                summary.last_timestamp.unwrap_or_default(),
                means
            );
        }
    }
    debug!("{}: outlet closed", summary.stream);
    summary
}

/// One watcher task per stream registered in `factory`.
pub fn spawn_watchers(
    factory: &streamer::ChannelOutletFactory,
    every: u64,
) -> Vec<JoinHandle<StreamSummary>> {
    factory
        .streams()
        .into_iter()
        .filter_map(|stream| {
            let rx = factory.receiver(&stream)?;
            Some(tokio::spawn(watch(stream, rx, every)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(first_index: u64) -> Chunk {
        Chunk {
            stream: "ACC".into(),
            first_index,
            samples: vec![vec![1.0, 2.0, 3.0], vec![3.0, 4.0, 5.0]],
            timestamps: vec![10.0, 10.5],
        }
    }

    #[test]
    fn test_summary_counts_and_discontinuities() {
        let mut summary = StreamSummary::new("ACC");
        summary.record(&chunk(0));
        summary.record(&chunk(2));
        summary.record(&chunk(0));
        assert_eq!(summary.chunks, 3);
        assert_eq!(summary.rows, 6);
        assert_eq!(summary.discontinuities, 1);
        assert_eq!(summary.last_timestamp, Some(10.5));
    }

    #[test]
    fn test_channel_means() {
        assert_eq!(StreamSummary::channel_means(&chunk(0)), vec![2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_watch_ends_when_senders_drop() {
        let (tx, rx) = flume::unbounded();
        tx.send(chunk(0)).unwrap();
        tx.send(chunk(2)).unwrap();
        drop(tx);
        let summary = watch("ACC".into(), rx, 1).await;
        assert_eq!(summary.chunks, 2);
        assert_eq!(summary.next_index, Some(4));
    }
}
