//! Per-site log suppression for noisy failure paths.
//!
//! Each emitting site keeps one suppressor: the first event of a burst is
//! logged, the rest are dropped until the window elapses.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub(crate) struct LogSuppressor {
    window: Duration,
    last: Mutex<Option<Instant>>,
}

impl LogSuppressor {
    pub(crate) const fn new(window: Duration) -> Self {
        Self {
            window,
            last: parking_lot::const_mutex(None),
        }
    }

    /// True when no event was emitted at this site within the window.
    /// A `true` result arms the window.
    pub(crate) fn should_log(&self) -> bool {
        let mut last = self.last.lock();
        let now = Instant::now();
        match *last {
            Some(prev) if now.duration_since(prev) < self.window => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_event_logs() {
        let suppressor = LogSuppressor::new(Duration::from_secs(60));
        assert!(suppressor.should_log());
    }

    #[test]
    fn burst_is_suppressed() {
        let suppressor = LogSuppressor::new(Duration::from_secs(60));
        assert!(suppressor.should_log());
        assert!(!suppressor.should_log());
        assert!(!suppressor.should_log());
    }

    #[test]
    fn window_elapse_rearms() {
        let suppressor = LogSuppressor::new(Duration::from_millis(10));
        assert!(suppressor.should_log());
        assert!(!suppressor.should_log());
        std::thread::sleep(Duration::from_millis(20));
        assert!(suppressor.should_log());
    }
}
