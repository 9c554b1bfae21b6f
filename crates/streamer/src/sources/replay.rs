use std::collections::BTreeMap;
use std::path::Path;

use log::{debug, info};

use super::{row_period, run_paced, WorkerThreads};
use crate::config::StreamerConfig;
use crate::error::{StreamerError, StreamerResult};
use crate::replay::{FileReplaySource, MetadataSource, SessionFiles, SessionPrompt, StreamCollector};
use crate::streamer::{DataSource, SourceContext};
use crate::worker::StreamWorker;

/// Recorded rows, one paced thread per subscribed stream, looping from the
/// first row whenever a file runs out.
#[derive(Default)]
pub struct ReplaySource {
    files: BTreeMap<String, FileReplaySource>,
    metadata: BTreeMap<String, MetadataSource>,
    label: Option<String>,
    threads: WorkerThreads,
}

impl ReplaySource {
    /// Replay the given sources, keyed by their stream type.
    pub fn new(files: impl IntoIterator<Item = FileReplaySource>) -> Self {
        Self {
            files: files
                .into_iter()
                .map(|source| (source.stream_type().to_string(), source))
                .collect(),
            ..Self::default()
        }
    }

    pub fn from_session(session: SessionFiles) -> Self {
        Self {
            files: session.replay,
            metadata: session.metadata,
            label: Some(session.label),
            threads: WorkerThreads::default(),
        }
    }

    /// Discover the sessions under `root` and load one, prompting when there
    /// is a choice.
    pub fn open(
        root: impl AsRef<Path>,
        prompt: &mut dyn SessionPrompt,
        config: &StreamerConfig,
    ) -> StreamerResult<Self> {
        let session = StreamCollector::scan(root)?.collect(prompt, config.prompt_attempts)?;
        Ok(Self::from_session(session))
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn streams(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    pub fn file(&self, stream: &str) -> Option<&FileReplaySource> {
        self.files.get(stream)
    }

    pub fn metadata(&self, stream: &str) -> Option<&MetadataSource> {
        self.metadata.get(stream)
    }

    /// Columns to skip so a file's rows fit `worker`: recordings may carry a
    /// leading timestamp column.
    fn leading_columns(&self, worker: &StreamWorker) -> StreamerResult<usize> {
        let stream = worker.stream();
        let source = self
            .files
            .get(stream)
            .ok_or_else(|| StreamerError::MissingReplayFile(stream.to_string()))?;
        let expected = worker.params().channel_count;
        match source.columns() {
            n if n == expected => Ok(0),
            n if n == expected + 1 => Ok(1),
            actual => Err(StreamerError::ShapeMismatch {
                stream: stream.to_string(),
                expected,
                actual,
            }),
        }
    }
}

impl DataSource for ReplaySource {
    fn kind(&self) -> &'static str {
        "replay"
    }

    fn connect(&mut self, ctx: &SourceContext<'_>) -> StreamerResult<()> {
        match &self.label {
            Some(label) => info!("Replaying {} as {}", label, ctx.profile.name),
            None => info!("Replaying {} file(s) as {}", self.files.len(), ctx.profile.name),
        }
        Ok(())
    }

    fn start(&mut self, workers: Vec<StreamWorker>, ctx: &SourceContext<'_>) -> StreamerResult<()> {
        let skips = workers
            .iter()
            .map(|worker| self.leading_columns(worker))
            .collect::<StreamerResult<Vec<_>>>()?;

        for (worker, skip) in workers.into_iter().zip(skips) {
            let stream = worker.stream().to_string();
            let Some(source) = self.files.get(&stream) else {
                return Err(StreamerError::MissingReplayFile(stream));
            };
            let mut source = source.clone();
            source.reset();
            if skip > 0 {
                debug!("{}: dropping leading timestamp column", stream);
            }

            let period = row_period(worker.params(), ctx.config);
            let spawned = self.threads.spawn("replay", &stream, move |token| {
                run_paced(worker, period, token, move || {
                    let row = match source.next_row() {
                        Some(row) => row,
                        None => {
                            debug!("{} reached the end, restarting", source.stream_type());
                            source.next_row()?
                        }
                    };
                    Some(row[skip..].to_vec())
                })
            });
            if let Err(e) = spawned {
                self.threads.shutdown(ctx.config.stop_timeout());
                return Err(e);
            }
        }
        Ok(())
    }

    fn stop(&mut self, ctx: &SourceContext<'_>) -> StreamerResult<()> {
        self.threads.stop(ctx.config.stop_timeout())
    }

    fn disconnect(&mut self) -> StreamerResult<()> {
        Ok(())
    }

    fn active_workers(&self) -> Vec<String> {
        self.threads.running()
    }
}
