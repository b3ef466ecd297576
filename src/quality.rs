use crate::config::TrackerConfig;
use crate::filters::RssiFilter;

/// Derives a [0,1] confidence score for one beacon from the consistency of
/// its recent samples, the absolute smoothed strength, and how long the
/// beacon has been detected continuously.
pub struct QualityEstimator {
    min_samples: usize,
    default_quality: f64,
    variance_scale: f64,
    consistency_power: f64,
    strength_floor: f64,
    strength_ceiling: f64,
    frequency_saturation: u32,
    weight_consistency: f64,
    weight_strength: f64,
    weight_frequency: f64,
}

impl QualityEstimator {
    pub fn new(config: &TrackerConfig) -> Self {
        QualityEstimator {
            min_samples: config.quality_min_samples,
            default_quality: config.default_quality,
            variance_scale: config.variance_scale,
            consistency_power: config.consistency_power,
            strength_floor: config.strength_floor_dbm,
            strength_ceiling: config.strength_ceiling_dbm,
            frequency_saturation: config.frequency_saturation,
            weight_consistency: config.weight_consistency,
            weight_strength: config.weight_strength,
            weight_frequency: config.weight_frequency,
        }
    }

    pub fn estimate(&self, filter: &RssiFilter, detections: u32) -> f64 {
        if filter.sample_count() < self.min_samples {
            return self.default_quality;
        }

        // Inconsistent signals are penalized super-linearly.
        let consistency = (1.0 - filter.variance() / self.variance_scale).max(0.0);
        let consistency = consistency.powf(self.consistency_power);

        let span = self.strength_ceiling - self.strength_floor;
        let strength = ((filter.smoothed() - self.strength_floor) / span).clamp(0.0, 1.0);

        let frequency = (detections as f64 / self.frequency_saturation as f64).min(1.0);

        (self.weight_consistency * consistency
            + self.weight_strength * strength
            + self.weight_frequency * frequency)
            .clamp(0.0, 1.0)
    }
}
