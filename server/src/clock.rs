//! Game time.
//!
//! Every timestamp stored in the world (energy updates, trading-post regen)
//! is game time in milliseconds. The system clock can run faster than wall
//! time so that regeneration can be observed in short test sessions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub trait Clock: Send {
    /// Current game time in milliseconds.
    fn now(&self) -> u64;
}

// Get current timestamp in milliseconds
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

/// Wall clock scaled by an acceleration factor.
pub struct SystemClock {
    origin: u64,
    started: Instant,
    acceleration: f64,
}

impl SystemClock {
    pub fn new(acceleration: f64) -> Self {
        Self {
            origin: get_timestamp(),
            started: Instant::now(),
            acceleration,
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        let elapsed = self.started.elapsed().as_millis() as f64 * self.acceleration;
        self.origin + elapsed as u64
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
