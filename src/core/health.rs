use std::time::{Duration, Instant};

/// Stream health counters tracked across a session without interior mutability.
#[derive(Debug)]
pub struct StreamHealth {
    connection_started: Instant,
    last_message_received: Instant,
    message_count: u64,
    parse_error_count: u64,
    reconnect_count: u64,
}

/// Point-in-time snapshot of the session's health counters.
#[derive(Clone, Debug)]
pub struct StreamStats {
    pub uptime: Duration,
    pub messages: u64,
    pub parse_errors: u64,
    pub reconnects: u64,
    pub last_message_age: Duration,
}

impl StreamHealth {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            connection_started: now,
            last_message_received: now,
            message_count: 0,
            parse_error_count: 0,
            reconnect_count: 0,
        }
    }

    /// Called on every successful open; counters persist across reconnects.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.connection_started = now;
        self.last_message_received = now;
    }

    pub fn record_message(&mut self) {
        self.last_message_received = Instant::now();
        self.message_count = self.message_count.saturating_add(1);
    }

    pub fn record_parse_error(&mut self) {
        self.parse_error_count = self.parse_error_count.saturating_add(1);
    }

    pub fn increment_reconnect(&mut self) {
        self.reconnect_count = self.reconnect_count.saturating_add(1);
    }

    pub fn get_stats(&self) -> StreamStats {
        StreamStats {
            uptime: self.connection_started.elapsed(),
            messages: self.message_count,
            parse_errors: self.parse_error_count,
            reconnects: self.reconnect_count,
            last_message_age: self.last_message_received.elapsed(),
        }
    }
}

impl Default for StreamHealth {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_and_survive_reset() {
        let mut health = StreamHealth::new();
        health.record_message();
        health.record_message();
        health.record_parse_error();
        health.increment_reconnect();
        health.reset();

        let stats = health.get_stats();
        assert_eq!(stats.messages, 2);
        assert_eq!(stats.parse_errors, 1);
        assert_eq!(stats.reconnects, 1);
    }
}
