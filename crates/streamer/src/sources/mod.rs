//! Data sources a `Streamer` can be composed with.
//!
//! `LiveSource` is driven by transport notifications; `DummySource` and
//! `ReplaySource` run one paced producer thread per subscribed stream.

mod dummy;
mod live;
mod replay;

pub use dummy::DummySource;
pub use live::{LiveSource, LiveStats};
pub use replay::ReplaySource;

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use stream_types::StreamParams;

use crate::config::StreamerConfig;
use crate::error::{StreamerError, StreamerResult};
use crate::worker::StreamWorker;

/// Longest uninterrupted sleep of a producer thread.
const CANCEL_POLL: Duration = Duration::from_millis(10);

/// Named producer threads sharing one cancellation token.
pub(crate) struct WorkerThreads {
    token: CancellationToken,
    handles: Vec<(String, JoinHandle<()>)>,
}

impl Default for WorkerThreads {
    fn default() -> Self {
        Self {
            token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }
}

impl WorkerThreads {
    /// Spawn the producer of `stream` on a thread named `<kind>-<stream>`.
    pub fn spawn<F>(&mut self, kind: &str, stream: &str, body: F) -> StreamerResult<()>
    where
        F: FnOnce(CancellationToken) + Send + 'static,
    {
        let token = self.token.clone();
        let handle = thread::Builder::new()
            .name(format!("{}-{}", kind, stream))
            .spawn(move || body(token))?;
        self.handles.push((stream.to_string(), handle));
        Ok(())
    }

    /// Streams whose thread has not finished yet.
    pub fn running(&self) -> Vec<String> {
        self.handles
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Cancel every thread and join them, waiting at most `timeout` overall.
    /// Returns the streams whose thread was still running at the deadline;
    /// those threads are detached.
    pub fn shutdown(&mut self, timeout: Duration) -> Vec<String> {
        self.token.cancel();
        let deadline = Instant::now() + timeout;

        while Instant::now() < deadline && self.handles.iter().any(|(_, h)| !h.is_finished()) {
            thread::sleep(Duration::from_millis(2));
        }

        let mut unfinished = Vec::new();
        for (name, handle) in self.handles.drain(..) {
            if handle.is_finished() {
                if handle.join().is_err() {
                    error!("Worker thread '{}' panicked", name);
                }
            } else {
                warn!("Worker thread '{}' did not stop within {:?}, detaching", name, timeout);
                unfinished.push(name);
            }
        }
        self.token = CancellationToken::new();
        unfinished
    }

    pub fn stop(&mut self, timeout: Duration) -> StreamerResult<()> {
        let unfinished = self.shutdown(timeout);
        if unfinished.is_empty() {
            Ok(())
        } else {
            Err(StreamerError::StopTimeout(unfinished))
        }
    }
}

/// Time between rows of a paced producer.
pub(crate) fn row_period(params: &StreamParams, config: &StreamerConfig) -> Duration {
    if params.is_regular() {
        Duration::from_secs_f64(1.0 / params.nominal_srate)
    } else {
        config.irregular_period()
    }
}

/// Sleep until `deadline`, waking regularly to check `token`. Returns
/// `false` when cancelled.
fn sleep_until(deadline: Instant, token: &CancellationToken) -> bool {
    loop {
        if token.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(CANCEL_POLL));
    }
}

/// Pull rows from `next_row` into `worker`, one every `period`, until the
/// token is cancelled, the source ends or the outlet fails.
///
/// Rows are scheduled against the thread's start instant so pacing does not
/// drift with scheduling jitter.
pub(crate) fn run_paced<F>(
    mut worker: StreamWorker,
    period: Duration,
    token: CancellationToken,
    mut next_row: F,
) where
    F: FnMut() -> Option<Vec<f64>>,
{
    info!("Producer for {} started ({:?} per row)", worker.stream(), period);
    let started = Instant::now();
    let mut rows: u64 = 0;

    while !token.is_cancelled() {
        let Some(row) = next_row() else {
            info!("Source for {} ended", worker.stream());
            break;
        };
        if let Err(e) = worker.push_sample(&row) {
            error!("Producer for {} stopped: {}", worker.stream(), e);
            break;
        }
        rows += 1;
        if !sleep_until(started + period.mul_f64(rows as f64), &token) {
            break;
        }
    }

    info!(
        "Producer for {} exiting after {} chunk(s)",
        worker.stream(),
        worker.chunks_emitted()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_shutdown_joins_cooperative_threads() {
        let mut threads = WorkerThreads::default();
        for i in 0..3 {
            threads
                .spawn("test", &format!("s{}", i), |token| {
                    while !token.is_cancelled() {
                        thread::sleep(Duration::from_millis(1));
                    }
                })
                .unwrap();
        }
        assert_eq!(threads.running().len(), 3);
        assert!(threads.shutdown(Duration::from_secs(1)).is_empty());
        assert!(threads.running().is_empty());
    }

    #[test]
    fn test_shutdown_reports_stuck_thread() {
        let release = Arc::new(AtomicBool::new(false));
        let flag = release.clone();
        let mut threads = WorkerThreads::default();
        threads
            .spawn("test", "stuck", move |_| {
                while !flag.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(1));
                }
            })
            .unwrap();

        let err = threads.stop(Duration::from_millis(30)).unwrap_err();
        assert!(matches!(err, StreamerError::StopTimeout(streams) if streams == vec!["stuck".to_string()]));
        release.store(true, Ordering::SeqCst);
    }

    #[test]
    fn test_sleep_until_returns_early_on_cancel() {
        let token = CancellationToken::new();
        token.cancel();
        let started = Instant::now();
        assert!(!sleep_until(started + Duration::from_secs(5), &token));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
