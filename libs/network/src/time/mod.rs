//! Message Timestamps
//!
//! ## Purpose
//!
//! Header timestamps are `f64` seconds. Send and receive stamps are compared
//! by readers (latency, ordering), so they must never go backwards within a
//! process even if the wall clock is stepped.
//!
//! ## Approach
//!
//! ```text
//! process start: anchor_wall = SystemTime::now()   (once)
//!                anchor      = Instant::now()      (once)
//! timestamp     = anchor_wall + anchor.elapsed()   (monotonic, wall-like)
//! ```
//!
//! One shared anchor per process keeps stamps from every session on the
//! same time base.

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Source of header timestamps
pub trait TimeSource: Send + Sync {
    /// Seconds since an epoch that is consistent for the whole connection
    fn now(&self) -> f64;
}

/// Monotonic clock anchored to the wall clock at first use
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    anchor_wall: f64,
    anchor: Instant,
}

/// Global anchor shared by every session in the process
static GLOBAL_CLOCK: OnceLock<SystemClock> = OnceLock::new();

impl SystemClock {
    /// The process-wide clock
    pub fn global() -> SystemClock {
        *GLOBAL_CLOCK.get_or_init(SystemClock::anchored_now)
    }

    fn anchored_now() -> SystemClock {
        let anchor_wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        SystemClock {
            anchor_wall,
            anchor: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        SystemClock::global()
    }
}

impl TimeSource for SystemClock {
    #[inline]
    fn now(&self) -> f64 {
        self.anchor_wall + self.anchor.elapsed().as_secs_f64()
    }
}
