use std::sync::Arc;

/// Host clock in seconds, injectable for tests.
pub type Clock = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Wall-clock seconds since the Unix epoch, microsecond resolution.
pub fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0)
}

/// A clock frozen at `seconds`.
pub fn fixed_clock(seconds: f64) -> Clock {
    Arc::new(move || seconds)
}
