use log::debug;

use devices::SignalGenerator;

use super::{row_period, run_paced, WorkerThreads};
use crate::error::StreamerResult;
use crate::streamer::{DataSource, SourceContext};
use crate::worker::StreamWorker;

/// Synthetic data: one generator thread per subscribed stream, paced at the
/// stream's nominal rate.
#[derive(Default)]
pub struct DummySource {
    seed: Option<u64>,
    threads: WorkerThreads,
}

impl DummySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed every generator for reproducible output.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }
}

impl DataSource for DummySource {
    fn kind(&self) -> &'static str {
        "dummy"
    }

    fn connect(&mut self, ctx: &SourceContext<'_>) -> StreamerResult<()> {
        debug!("Dummy source for {} needs no connection", ctx.profile.name);
        Ok(())
    }

    fn start(&mut self, workers: Vec<StreamWorker>, ctx: &SourceContext<'_>) -> StreamerResult<()> {
        for (i, worker) in workers.into_iter().enumerate() {
            let period = row_period(worker.params(), ctx.config);
            let mut generator = match self.seed {
                Some(seed) => SignalGenerator::seeded(worker.params(), seed.wrapping_add(i as u64)),
                None => SignalGenerator::new(worker.params()),
            };
            let stream = worker.stream().to_string();
            if let Err(e) = self.threads.spawn("dummy", &stream, move |token| {
                run_paced(worker, period, token, move || Some(generator.next_sample()))
            }) {
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
