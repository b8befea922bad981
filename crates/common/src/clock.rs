//! Clock abstraction for analysis runs.
//!
//! Sessions never read the system time directly. They hold an
//! `Arc<dyn Clock>` so tests can drive time by hand and get deterministic
//! transition timestamps and ETA figures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic time source measured from an arbitrary fixed epoch.
pub trait Clock: Send + Sync {
    /// Time elapsed since this clock's epoch.
    fn now(&self) -> Duration;

    /// Wall-clock time at the epoch (RFC 3339), for reports.
    fn epoch_wall(&self) -> &str;
}

/// Real clock anchored to the moment it was created.
#[derive(Debug, Clone)]
pub struct SystemClock {
    epoch: Instant,
    epoch_wall: String,
}

impl SystemClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Convenience constructor for session wiring.
    pub fn shared() -> Arc<dyn Clock> {
        Arc::new(Self::start())
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    elapsed_ns: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        self.elapsed_ns
            .fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Jump to an absolute offset from the epoch.
    pub fn set(&self, at: Duration) {
        self.elapsed_ns.store(at.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns.load(Ordering::SeqCst))
    }

    fn epoch_wall(&self) -> &str {
        "1970-01-01T00:00:00+00:00"
    }
}

/// Estimated seconds remaining given the fraction done and time spent.
///
/// Returns 0.0 until some progress has been made.
pub fn eta_secs(progress: f64, elapsed: Duration) -> f64 {
    let elapsed_secs = elapsed.as_secs_f64();
    if progress > 0.0 {
        (elapsed_secs / progress) - elapsed_secs
    } else {
        0.0
    }
    .max(0.0)
}
