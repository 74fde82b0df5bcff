use std::time::{Duration, Instant};

/// Per-host pacing state
///
/// One instance exists per hostname for the lifetime of a run. It is always
/// accessed through the politeness controller's per-host lock, so the
/// read-wait-write sequence of pacing is never interleaved for one host.
#[derive(Debug, Clone, Default)]
pub struct DomainState {
    /// Number of navigations issued to this host in the current run
    pub request_count: u32,

    /// When the last navigation to this host was released
    pub last_request_time: Option<Instant>,
}

impl DomainState {
    /// Creates a new DomainState with no recorded requests
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates how long a caller must wait before the next request
    ///
    /// # Arguments
    ///
    /// * `min_delay` - Minimum interval between two requests to this host
    /// * `now` - The current time instant
    ///
    /// # Returns
    ///
    /// * `Some(Duration)` - Remaining time until the interval has elapsed
    /// * `None` - A request can be made now
    pub fn time_until_next_request(&self, min_delay: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < min_delay {
            Some(min_delay - elapsed)
        } else {
            None
        }
    }

    /// Records that a request was released to this host
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(now);
    }
}
