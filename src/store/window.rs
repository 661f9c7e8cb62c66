//! Bounded sliding window of health samples.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::VecDeque;

use super::models::{AggregateStats, HealthSample, HealthState};

/// Retention limits for a history window. Both apply after every insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimits {
    pub max_age: ChronoDuration,
    pub max_points: usize,
}

impl Default for WindowLimits {
    /// 24 hours, one point every 5 minutes.
    fn default() -> Self {
        Self {
            max_age: ChronoDuration::hours(24),
            max_points: 288,
        }
    }
}

/// Chronologically ordered samples for one service.
#[derive(Debug, Clone, Default)]
pub struct HistoryWindow {
    samples: VecDeque<HealthSample>,
}

impl HistoryWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample and evict from the front until both limits hold.
    ///
    /// Returns `false` without touching the window when the sample is older
    /// than the newest retained one.
    pub fn push(&mut self, sample: HealthSample, limits: &WindowLimits, now: DateTime<Utc>) -> bool {
        if let Some(last) = self.samples.back() {
            if sample.timestamp < last.timestamp {
                return false;
            }
        }

        self.samples.push_back(sample);
        self.evict(limits, now);
        true
    }

    fn evict(&mut self, limits: &WindowLimits, now: DateTime<Utc>) {
        if let Some(cutoff) = now.checked_sub_signed(limits.max_age) {
            while self.samples.front().is_some_and(|s| s.timestamp < cutoff) {
                self.samples.pop_front();
            }
        }

        while self.samples.len() > limits.max_points {
            self.samples.pop_front();
        }
    }

    /// Samples no older than `hours` relative to `now`, oldest first.
    pub fn since(&self, hours: f64, now: DateTime<Utc>) -> Vec<HealthSample> {
        let start = match lookback_cutoff(hours, now) {
            Some(cutoff) => self.samples.partition_point(|s| s.timestamp < cutoff),
            None => 0,
        };
        self.samples.range(start..).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HealthSample> {
        self.samples.iter()
    }
}

/// `None` means the look-back reaches past anything representable, so the
/// whole window qualifies.
fn lookback_cutoff(hours: f64, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let millis = (hours.max(0.0) * 3_600_000.0) as i64;
    ChronoDuration::try_milliseconds(millis).and_then(|d| now.checked_sub_signed(d))
}

impl AggregateStats {
    /// Uptime and average latency of an already filtered run of samples.
    pub fn from_samples(samples: &[HealthSample]) -> Self {
        Self {
            uptime: uptime_percent(samples),
            average_latency: average_latency(samples),
        }
    }
}

/// `100 * healthy / total`, or `0` for no samples.
fn uptime_percent(samples: &[HealthSample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let healthy = samples
        .iter()
        .filter(|s| s.status == HealthState::Healthy)
        .count();
    healthy as f64 / samples.len() as f64 * 100.0
}

/// Mean of the latencies that are present, `None` when there are none.
fn average_latency(samples: &[HealthSample]) -> Option<f64> {
    let (sum, count) = samples
        .iter()
        .filter_map(|s| s.latency)
        .fold((0.0, 0usize), |(sum, count), l| (sum + l as f64, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample_at(ts: DateTime<Utc>, status: HealthState, latency_ms: Option<u64>) -> HealthSample {
        HealthSample::new(status, latency_ms.map(Duration::from_millis), "test").with_timestamp(ts)
    }

    #[test]
    fn test_count_bound_is_fifo() {
        let limits = WindowLimits::default();
        let now = Utc::now();
        let mut window = HistoryWindow::new();

        // 300 samples, one second apart, all well inside the age limit
        for i in 0..300i64 {
            let ts = now - ChronoDuration::seconds(300 - i);
            assert!(window.push(sample_at(ts, HealthState::Healthy, Some(i as u64)), &limits, now));
            assert!(window.iter().count() <= limits.max_points);
        }

        assert_eq!(window.iter().count(), 288);
        // The first 12 inserted were evicted, oldest first
        assert_eq!(window.iter().next().unwrap().latency, Some(12));
        assert_eq!(window.iter().last().unwrap().latency, Some(299));
    }

    #[test]
    fn test_age_bound() {
        let limits = WindowLimits::default();
        let now = Utc::now();
        let mut window = HistoryWindow::new();

        window.push(sample_at(now - ChronoDuration::hours(30), HealthState::Down, None), &limits, now);
        window.push(sample_at(now - ChronoDuration::hours(25), HealthState::Down, None), &limits, now);
        window.push(sample_at(now - ChronoDuration::hours(23), HealthState::Healthy, Some(5)), &limits, now);
        window.push(sample_at(now, HealthState::Healthy, Some(7)), &limits, now);

        assert_eq!(window.iter().count(), 2);
        let cutoff = now - limits.max_age;
        assert!(window.iter().all(|s| s.timestamp >= cutoff));
    }

    #[test]
    fn test_rejects_out_of_order_sample() {
        let limits = WindowLimits::default();
        let now = Utc::now();
        let mut window = HistoryWindow::new();

        assert!(window.push(sample_at(now, HealthState::Healthy, Some(1)), &limits, now));
        assert!(!window.push(
            sample_at(now - ChronoDuration::minutes(1), HealthState::Down, None),
            &limits,
            now
        ));
        assert_eq!(window.iter().count(), 1);
        assert_eq!(window.iter().last().unwrap().status, HealthState::Healthy);
    }

    #[test]
    fn test_since_filters_and_keeps_order() {
        let limits = WindowLimits::default();
        let now = Utc::now();
        let mut window = HistoryWindow::new();

        for h in (0..5).rev() {
            let ts = now - ChronoDuration::hours(h);
            window.push(sample_at(ts, HealthState::Healthy, Some(h as u64)), &limits, now);
        }

        let last_two = window.since(1.5, now);
        assert_eq!(last_two.len(), 2);
        assert!(last_two[0].timestamp < last_two[1].timestamp);

        // Look-back longer than retention just returns everything
        assert_eq!(window.since(48.0, now).len(), 5);
        assert_eq!(window.since(f64::MAX, now).len(), 5);
        assert_eq!(window.since(0.0, now).len(), 1);
    }

    #[test]
    fn test_uptime_percent() {
        let now = Utc::now();
        assert_eq!(uptime_percent(&[]), 0.0);

        let samples: Vec<_> = [HealthState::Healthy, HealthState::Degraded, HealthState::Down, HealthState::Healthy]
            .into_iter()
            .map(|s| sample_at(now, s, None))
            .collect();
        assert_eq!(uptime_percent(&samples), 50.0);
    }

    #[test]
    fn test_average_latency_ignores_missing() {
        let now = Utc::now();
        assert_eq!(average_latency(&[]), None);
        assert_eq!(average_latency(&[sample_at(now, HealthState::Down, None)]), None);

        let samples = vec![
            sample_at(now, HealthState::Healthy, Some(10)),
            sample_at(now, HealthState::Down, None),
            sample_at(now, HealthState::Healthy, Some(20)),
        ];
        assert_eq!(average_latency(&samples), Some(15.0));
    }

    #[test]
    fn test_aggregate_stats_from_samples() {
        let now = Utc::now();
        assert_eq!(
            AggregateStats::from_samples(&[]),
            AggregateStats {
                uptime: 0.0,
                average_latency: None
            }
        );

        let samples = vec![
            sample_at(now, HealthState::Healthy, Some(4)),
            sample_at(now, HealthState::Degraded, Some(8)),
        ];
        let stats = AggregateStats::from_samples(&samples);
        assert_eq!(stats.uptime, 50.0);
        assert_eq!(stats.average_latency, Some(6.0));
    }
}
