use std::time::{Duration, Instant};

// Far beyond any useful interval, and small enough that adding it to an
// `Instant` stays representable.
const MAX_INTERVAL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Leading-edge debounce: the first candidate after the threshold is
/// admitted and pushes the threshold `min_interval` past itself.
///
/// Runs on the monotonic clock, so wall-clock adjustments never hold back
/// or release events.
#[derive(Debug, Clone)]
pub struct EventGate {
    threshold: Instant,
    min_interval: Duration,
    event_count: u64,
}

impl EventGate {
    pub fn new(start: Instant, min_interval: Duration) -> Self {
        Self {
            threshold: start,
            min_interval: min_interval.min(MAX_INTERVAL),
            event_count: 0,
        }
    }

    pub fn admit(&mut self, candidate: Instant) -> bool {
        if candidate <= self.threshold {
            return false;
        }

        self.threshold = candidate
            .checked_add(self.min_interval)
            .unwrap_or(candidate);
        self.event_count += 1;
        true
    }

    pub fn threshold(&self) -> Instant {
        self.threshold
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }
}
