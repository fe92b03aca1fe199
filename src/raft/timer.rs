use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Notify;
use tokio::time::sleep;

/// Non-blocking "heartbeat observed" signal from RPC handlers to the timer.
///
/// Repeated raises before the timer looks collapse into one.
#[derive(Debug, Default)]
pub struct HeartbeatSignal {
    notify: Notify,
}

impl HeartbeatSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.notify.notify_one();
    }

    async fn observed(&self) {
        self.notify.notified().await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    /// A heartbeat arrived before the deadline.
    Reset,
    /// The deadline passed with no heartbeat.
    Expired,
}

/// Randomized follower countdown.
pub struct ElectionTimer {
    range: Range<Duration>,
    rng: StdRng,
    signal: Arc<HeartbeatSignal>,
}

impl ElectionTimer {
    /// `seed` makes the drawn timeouts reproducible; `None` seeds from the OS.
    pub fn new(range: Range<Duration>, seed: Option<u64>, signal: Arc<HeartbeatSignal>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { range, rng, signal }
    }

    /// Draw the next timeout uniformly from `[min, max)`.
    pub fn next_timeout(&mut self) -> Duration {
        let min = self.range.start.as_millis() as u64;
        let max = self.range.end.as_millis() as u64;
        if min >= max {
            return self.range.start;
        }
        Duration::from_millis(self.rng.random_range(min..max))
    }

    /// Arm once and wait for whichever comes first: a heartbeat or the deadline.
    pub async fn wait(&mut self) -> TimerOutcome {
        let timeout = self.next_timeout();
        tokio::select! {
            _ = self.signal.observed() => TimerOutcome::Reset,
            _ = sleep(timeout) => TimerOutcome::Expired,
        }
    }
}
