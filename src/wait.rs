use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{EverythingError, Result};
use crate::traits::Clock;

/// Default delay between readiness polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shortest delay [`wait_until`] sleeps between polls. Smaller intervals,
/// zero included, are raised to this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Default ceiling on the readiness wait.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// SystemClock
// ---------------------------------------------------------------------------

/// The real clock: `Instant::now` and `thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

// ---------------------------------------------------------------------------
// CancelToken
// ---------------------------------------------------------------------------

/// Cooperative cancellation for [`wait_until`].
///
/// Clones share the same flag, so one can be handed to another thread and
/// cancelled from there. Cancellation is observed between polls.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// wait_until()
// ---------------------------------------------------------------------------

/// Poll `ready` every `interval` until it returns `true`.
///
/// `ready` runs once immediately, so an already-satisfied condition returns
/// without sleeping. `interval` is raised to at least [`MIN_POLL_INTERVAL`]. Fails with [`EverythingError::Timeout`] once `ceiling`
/// has elapsed, or [`EverythingError::Cancelled`] when `cancel` fires.
/// The final sleep is clipped so the wait never overshoots `ceiling` by
/// more than one poll.
pub fn wait_until(
    clock:    &dyn Clock,
    cancel:   &CancelToken,
    interval: Duration,
    ceiling:  Duration,
    mut ready: impl FnMut() -> bool,
) -> Result<()> {
    let interval = interval.max(MIN_POLL_INTERVAL);
    let start = clock.now();
    let mut polls = 0u32;

    loop {
        if ready() {
            debug!(polls, "wait condition satisfied");
            return Ok(());
        }
        polls += 1;

        if cancel.is_cancelled() {
            return Err(EverythingError::Cancelled);
        }

        let waited = clock.now().saturating_duration_since(start);
        if waited >= ceiling {
            return Err(EverythingError::Timeout { waited });
        }

        clock.sleep(interval.min(ceiling - waited));
    }
}
