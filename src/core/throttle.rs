use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::types::NotifyChannel;

/// Per-channel notification rate limiter.
///
/// An emission is allowed only when at least `min_interval` has elapsed since
/// the last *allowed* emission on that channel; a suppressed attempt updates
/// no state, so it cannot push the window forward. Channels are independent.
#[derive(Debug, Clone)]
pub struct NotificationThrottle {
    min_interval: Duration,
    last_emitted: HashMap<NotifyChannel, Instant>,
}

impl NotificationThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_emitted: HashMap::new(),
        }
    }

    /// Returns whether the caller may emit on `channel` right now.
    pub fn try_emit(&mut self, channel: NotifyChannel) -> bool {
        self.try_emit_at(channel, Instant::now())
    }

    pub fn try_emit_at(&mut self, channel: NotifyChannel, now: Instant) -> bool {
        if let Some(last) = self.last_emitted.get(&channel) {
            if now.saturating_duration_since(*last) < self.min_interval {
                return false;
            }
        }
        self.last_emitted.insert(channel, now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_emit_within_interval_is_suppressed() {
        let mut throttle = NotificationThrottle::new(Duration::from_secs(5));
        let t0 = Instant::now();

        assert!(throttle.try_emit_at(NotifyChannel::Alert, t0));
        assert!(!throttle.try_emit_at(NotifyChannel::Alert, t0 + Duration::from_secs(3)));
        assert!(throttle.try_emit_at(NotifyChannel::Alert, t0 + Duration::from_secs(6)));
    }

    #[test]
    fn suppressed_attempt_does_not_reset_the_window() {
        let mut throttle = NotificationThrottle::new(Duration::from_secs(5));
        let t0 = Instant::now();

        assert!(throttle.try_emit_at(NotifyChannel::ConnectionStatus, t0));
        // Suppressed at t0+4; if it reset the window, t0+5 would also be suppressed.
        assert!(!throttle.try_emit_at(NotifyChannel::ConnectionStatus, t0 + Duration::from_secs(4)));
        assert!(throttle.try_emit_at(NotifyChannel::ConnectionStatus, t0 + Duration::from_secs(5)));
    }

    #[test]
    fn channels_are_independent() {
        let mut throttle = NotificationThrottle::new(Duration::from_secs(5));
        let t0 = Instant::now();

        assert!(throttle.try_emit_at(NotifyChannel::ConnectionStatus, t0));
        assert!(throttle.try_emit_at(NotifyChannel::Alert, t0));
        assert!(!throttle.try_emit_at(NotifyChannel::ConnectionStatus, t0 + Duration::from_secs(1)));
        assert!(throttle.try_emit_at(NotifyChannel::System, t0 + Duration::from_secs(1)));
    }
}
