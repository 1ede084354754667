//! Bounded raw-message log.
//!
//! Keeps the most recent raw payload texts for display, evicting oldest
//! first. Alert and system entries always land; reading-derived entries go
//! through the configured sampling policy to keep write volume down under
//! high-frequency streams.

use crate::core::{CircularBuffer, LogSamplingConfig, LogSamplingPolicy};

#[derive(Debug)]
pub struct RawLog {
    entries: CircularBuffer<String>,
    policy: LogSamplingPolicy,
}

impl RawLog {
    pub fn new(capacity: usize, sampling: LogSamplingConfig) -> Self {
        Self {
            entries: CircularBuffer::new(capacity),
            policy: LogSamplingPolicy::from_config(sampling),
        }
    }

    /// Appends unconditionally, bypassing the sampling policy.
    pub fn append_always(&mut self, entry: String) {
        self.entries.push(entry);
    }

    /// Appends subject to the sampling policy; returns whether the entry was
    /// kept.
    pub fn append_sampled(&mut self, entry: String) -> bool {
        if self.policy.should_log() {
            self.entries.push(entry);
            true
        } else {
            false
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_entries_are_evicted_first() {
        let mut log = RawLog::new(3, LogSamplingConfig::All);
        for i in 0..5 {
            log.append_always(format!("entry-{i}"));
        }
        assert_eq!(log.snapshot(), vec!["entry-2", "entry-3", "entry-4"]);
    }

    #[test]
    fn sampled_appends_respect_the_policy() {
        let mut log = RawLog::new(10, LogSamplingConfig::Periodic { every: 2 });
        let kept: Vec<bool> = (0..4)
            .map(|i| log.append_sampled(format!("reading-{i}")))
            .collect();
        assert_eq!(kept, vec![true, false, true, false]);
        assert_eq!(log.snapshot(), vec!["reading-0", "reading-2"]);
    }

    #[test]
    fn always_appends_bypass_a_restrictive_policy() {
        let mut log = RawLog::new(10, LogSamplingConfig::Random {
            probability: 0.0,
            seed: Some(7),
        });
        assert!(!log.append_sampled("reading".to_string()));
        log.append_always("ALERT: overheating".to_string());
        assert_eq!(log.snapshot(), vec!["ALERT: overheating"]);
    }
}
