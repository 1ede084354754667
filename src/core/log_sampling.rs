use rand::{Rng, SeedableRng, rngs::SmallRng};

use super::types::LogSamplingConfig;

/// Seedable sampling policy deciding which reading-derived raw-log entries
/// are kept under high-frequency streams.
///
/// `Periodic` keeps every Nth decision starting with the first; `Random`
/// keeps each entry with the configured probability, from a seedable RNG so
/// tests can assert deterministic subsets.
#[derive(Debug)]
pub enum LogSamplingPolicy {
    All,
    Periodic { every: u32, count: u32 },
    Random { probability: f64, rng: SmallRng },
}

impl LogSamplingPolicy {
    pub fn from_config(config: LogSamplingConfig) -> Self {
        match config {
            LogSamplingConfig::All => LogSamplingPolicy::All,
            LogSamplingConfig::Periodic { every } => LogSamplingPolicy::Periodic {
                every: every.max(1),
                count: 0,
            },
            LogSamplingConfig::Random { probability, seed } => LogSamplingPolicy::Random {
                probability: probability.clamp(0.0, 1.0),
                rng: match seed {
                    Some(seed) => SmallRng::seed_from_u64(seed),
                    None => SmallRng::from_entropy(),
                },
            },
        }
    }

    pub fn should_log(&mut self) -> bool {
        match self {
            LogSamplingPolicy::All => true,
            LogSamplingPolicy::Periodic { every, count } => {
                let keep = *count % *every == 0;
                *count = count.wrapping_add(1);
                keep
            }
            LogSamplingPolicy::Random { probability, rng } => rng.r#gen::<f64>() < *probability,
        }
    }
}

impl Default for LogSamplingPolicy {
    fn default() -> Self {
        LogSamplingPolicy::All
    }
}
