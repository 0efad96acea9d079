use std::time::Duration;

use tokio::time::Instant;

/// Minimum-interval gate shared by every detection trigger.
///
/// A trigger arriving inside the window is dropped, not queued: the tick
/// that already ran saw the same tree state the dropped trigger reported.
#[derive(Debug)]
pub struct ThrottleGate {
    min_interval: Duration,
    last_tick: Option<Instant>,
}

impl ThrottleGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_tick: None,
        }
    }

    /// Returns true when a tick may run now, recording it as the last
    /// executed tick.
    pub fn admit(&mut self, now: Instant) -> bool {
        match self.last_tick {
            Some(last) if now.duration_since(last) < self.min_interval => false,
            _ => {
                self.last_tick = Some(now);
                true
            }
        }
    }
}
