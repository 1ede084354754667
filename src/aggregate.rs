//! Per-tick sampling aggregation of sensor readings.
//!
//! Readings accumulate in per-sensor buffers between sampling ticks. On each
//! tick the buffers drain into one [`AggregatePoint`] holding the mean of
//! every sensor that reported during the interval, and the point is appended
//! to a bounded series. The display view is a trailing time window over that
//! series; a shorter window hides older points without discarding them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::core::{AggregatePoint, CircularBuffer, SensorReading};

#[derive(Debug)]
pub struct SamplingAggregator {
    buffers: HashMap<String, Vec<f64>>,
    series: CircularBuffer<AggregatePoint>,
    window: std::time::Duration,
}

impl SamplingAggregator {
    pub fn new(series_capacity: usize, window: std::time::Duration) -> Self {
        Self {
            buffers: HashMap::new(),
            series: CircularBuffer::new(series_capacity),
            window,
        }
    }

    /// Buffers one reading for the current interval. Non-finite values are
    /// dropped here so a single bad sample cannot poison a mean.
    pub fn ingest(&mut self, reading: &SensorReading) {
        if !reading.value.is_finite() {
            warn!(
                sensor = %reading.name,
                value = reading.value,
                "dropping non-finite sensor value"
            );
            return;
        }
        self.buffers
            .entry(reading.name.clone())
            .or_default()
            .push(reading.value);
    }

    /// Closes the current interval. Drains all buffers into a mean-per-sensor
    /// point stamped `now`, appends it to the series, and returns it. Returns
    /// `None` when no reading arrived during the interval.
    pub fn sample(&mut self, now: DateTime<Utc>) -> Option<AggregatePoint> {
        if self.buffers.values().all(Vec::is_empty) {
            return None;
        }

        let mut values = HashMap::with_capacity(self.buffers.len());
        for (name, samples) in self.buffers.drain() {
            if samples.is_empty() {
                continue;
            }
            let mean = samples.iter().sum::<f64>() / samples.len() as f64;
            values.insert(name, mean);
        }

        let point = AggregatePoint {
            window_ts: now,
            values,
        };
        self.series.push(point.clone());
        Some(point)
    }

    /// Trailing display view: retained points whose timestamp falls within
    /// the configured window ending at `now`. A window too large to subtract
    /// from `now` means no cutoff at all.
    pub fn window_view(&self, now: DateTime<Utc>) -> Vec<AggregatePoint> {
        let cutoff = chrono::Duration::from_std(self.window)
            .ok()
            .and_then(|window| now.checked_sub_signed(window));
        self.series
            .iter()
            .filter(|point| cutoff.is_none_or(|cutoff| point.window_ts >= cutoff))
            .cloned()
            .collect()
    }

    pub fn series_len(&self) -> usize {
        self.series.len()
    }

    /// Full retained series regardless of the display window.
    pub fn history(&self) -> Vec<AggregatePoint> {
        self.series.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn reading(name: &str, value: f64) -> SensorReading {
        SensorReading {
            name: name.to_string(),
            value,
            raw_text: None,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn tick_produces_per_sensor_means() {
        let mut agg = SamplingAggregator::new(600, Duration::from_secs(60));
        agg.ingest(&reading("temperature", 20.0));
        agg.ingest(&reading("temperature", 22.0));
        agg.ingest(&reading("niveausonore", 40.0));

        let point = agg.sample(Utc::now()).unwrap();
        assert_eq!(point.values["temperature"], 21.0);
        assert_eq!(point.values["niveausonore"], 40.0);
        assert_eq!(agg.series_len(), 1);
    }

    #[test]
    fn empty_interval_produces_no_point() {
        let mut agg = SamplingAggregator::new(600, Duration::from_secs(60));
        assert!(agg.sample(Utc::now()).is_none());
        assert_eq!(agg.series_len(), 0);

        // A tick that produced a point leaves the next interval empty again.
        agg.ingest(&reading("temperature", 20.0));
        assert!(agg.sample(Utc::now()).is_some());
        assert!(agg.sample(Utc::now()).is_none());
    }

    #[test]
    fn series_is_bounded_by_capacity() {
        let mut agg = SamplingAggregator::new(3, Duration::from_secs(60));
        for i in 0..5 {
            agg.ingest(&reading("temperature", i as f64));
            agg.sample(Utc::now());
        }
        assert_eq!(agg.series_len(), 3);
        let oldest = &agg.history()[0];
        assert_eq!(oldest.values["temperature"], 2.0);
    }

    #[test]
    fn non_finite_values_are_excluded_from_the_mean() {
        let mut agg = SamplingAggregator::new(600, Duration::from_secs(60));
        agg.ingest(&reading("temperature", 20.0));
        agg.ingest(&reading("temperature", f64::NAN));
        agg.ingest(&reading("temperature", f64::INFINITY));
        agg.ingest(&reading("temperature", 22.0));

        let point = agg.sample(Utc::now()).unwrap();
        assert_eq!(point.values["temperature"], 21.0);
    }

    #[test]
    fn oversized_window_shows_all_retained_points() {
        let mut agg = SamplingAggregator::new(10, Duration::MAX);
        let now = Utc::now();

        agg.ingest(&reading("temperature", 1.0));
        agg.sample(now - chrono::Duration::seconds(90));
        agg.ingest(&reading("temperature", 2.0));
        agg.sample(now);

        assert_eq!(agg.window_view(now).len(), 2);
    }

    #[test]
    fn window_view_hides_old_points_without_discarding_them() {
        let mut agg = SamplingAggregator::new(600, Duration::from_secs(10));
        let now = Utc::now();

        agg.ingest(&reading("temperature", 1.0));
        agg.sample(now - chrono::Duration::seconds(30));
        agg.ingest(&reading("temperature", 2.0));
        agg.sample(now - chrono::Duration::seconds(5));
        agg.ingest(&reading("temperature", 3.0));
        agg.sample(now);

        let view = agg.window_view(now);
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].values["temperature"], 2.0);
        assert_eq!(agg.history().len(), 3);
    }
}
