use std::collections::VecDeque;

use crate::config::TrackerConfig;

/// Per-beacon RSSI conditioning: bounded raw history, median-based outlier
/// rejection, recency-weighted averaging, then exponential smoothing.
///
/// The raw history never leaves this type; callers only see derived scalars
/// (smoothed value, sample count, variance).
pub struct RssiFilter {
    history: VecDeque<i32>,
    capacity: usize,
    outlier_min_samples: usize,
    outlier_deviation_db: f64,
    recency_weight_base: f64,
    alpha: f64,
    floor_dbm: f64,
    smoothed: f64,
}

impl RssiFilter {
    pub fn new(config: &TrackerConfig) -> Self {
        RssiFilter {
            history: VecDeque::with_capacity(config.history_capacity),
            capacity: config.history_capacity,
            outlier_min_samples: config.outlier_min_samples,
            outlier_deviation_db: config.outlier_deviation_db,
            recency_weight_base: config.recency_weight_base,
            alpha: config.smoothing_alpha,
            floor_dbm: config.rssi_floor_dbm,
            smoothed: config.rssi_floor_dbm,
        }
    }

    /// Ingest one raw sample and return the updated smoothed estimate.
    ///
    /// Any integer is accepted, however implausible; the outlier filter is
    /// the only defense against garbage readings.
    pub fn process(&mut self, raw: i32) -> f64 {
        self.history.push_back(raw);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }

        let working: Vec<f64> = if self.history.len() >= self.outlier_min_samples {
            let median = self.median();
            self.history
                .iter()
                .map(|&s| s as f64)
                .filter(|s| (s - median).abs() <= self.outlier_deviation_db)
                .collect()
        } else {
            self.history.iter().map(|&s| s as f64).collect()
        };

        // All samples rejected can only happen with a degenerate deviation
        // threshold; fall back to the raw history in that case.
        let weighted = if working.is_empty() {
            self.weighted_average(self.history.iter().map(|&s| s as f64))
        } else {
            self.weighted_average(working.iter().copied())
        };

        self.smoothed = self.alpha * weighted + (1.0 - self.alpha) * self.smoothed;
        self.smoothed
    }

    /// Recency-weighted mean: sample i (0 = oldest kept) weighs base^i.
    fn weighted_average(&self, samples: impl Iterator<Item = f64>) -> f64 {
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        let mut weight = 1.0;
        for sample in samples {
            weighted_sum += sample * weight;
            weight_sum += weight;
            weight *= self.recency_weight_base;
        }
        if weight_sum > 0.0 {
            weighted_sum / weight_sum
        } else {
            self.floor_dbm
        }
    }

    fn median(&self) -> f64 {
        let mut sorted: Vec<i32> = self.history.iter().copied().collect();
        sorted.sort_unstable();
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
        } else {
            sorted[mid] as f64
        }
    }

    pub fn smoothed(&self) -> f64 {
        self.smoothed
    }

    pub fn sample_count(&self) -> usize {
        self.history.len()
    }

    /// Population variance of the raw history (0.0 when empty).
    pub fn variance(&self) -> f64 {
        let n = self.history.len();
        if n == 0 {
            return 0.0;
        }
        let mean = self.history.iter().map(|&s| s as f64).sum::<f64>() / n as f64;
        self.history
            .iter()
            .map(|&s| {
                let d = s as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n as f64
    }

    /// Drop all history and return the smoothed estimate to the far floor.
    pub fn clear(&mut self) {
        self.history.clear();
        self.smoothed = self.floor_dbm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn filter() -> RssiFilter {
        RssiFilter::new(&TrackerConfig::default())
    }

    #[test]
    fn first_sample_blends_against_far_floor() {
        let mut f = filter();
        let smoothed = f.process(-60);
        // 0.15 * -60 + 0.85 * -100
        assert_relative_eq!(smoothed, -94.0, epsilon = 1e-9);
    }

    #[test]
    fn converges_toward_constant_input() {
        let mut f = filter();
        let mut last = f.smoothed();
        for _ in 0..60 {
            last = f.process(-50);
        }
        assert!(last > -51.0 && last <= -50.0, "got {last}");
    }

    #[test]
    fn history_is_bounded() {
        let mut f = filter();
        for i in 0..40 {
            f.process(-60 - (i % 3));
        }
        assert_eq!(f.sample_count(), 15);
    }

    #[test]
    fn outlier_is_excluded_from_weighted_average() {
        let mut f = filter();
        for _ in 0..5 {
            f.process(-60);
        }
        let before = f.smoothed();
        let after = f.process(40);
        // With the +40 excluded the working set is still all -60, so the
        // smoothing step must pull toward exactly -60.
        let expected = 0.15 * -60.0 + 0.85 * before;
        assert_relative_eq!(after, expected, epsilon = 1e-9);
    }

    #[test]
    fn short_history_keeps_outliers() {
        let mut f = filter();
        f.process(-60);
        let s1 = f.smoothed();
        let s2 = f.process(40);
        // Only 2 samples: no rejection, the spike must move the estimate up.
        assert!(s2 > s1);
    }

    #[test]
    fn variance_of_constant_history_is_zero() {
        let mut f = filter();
        for _ in 0..6 {
            f.process(-70);
        }
        assert_relative_eq!(f.variance(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn clear_returns_to_floor() {
        let mut f = filter();
        for _ in 0..10 {
            f.process(-45);
        }
        f.clear();
        assert_eq!(f.sample_count(), 0);
        assert_relative_eq!(f.smoothed(), -100.0, epsilon = 1e-12);
    }

    #[test]
    fn recency_weighting_biases_to_newest() {
        let f = filter();
        let avg = f.weighted_average([-90.0, -50.0].into_iter());
        // 1.0 and 1.2 weights: (-90 - 60) / 2.2
        assert_relative_eq!(avg, (-90.0 - 50.0 * 1.2) / 2.2, epsilon = 1e-9);
        assert!(avg > -70.0);
    }
}
