// proximity.rs — Distance estimation and adaptive reachability policy
//
// Converts a smoothed RSSI into a physical-distance estimate via the
// log-distance path-loss model, then into a bounded display percentage, and
// derives the adaptive RSSI threshold / confirmation-count policy from the
// current quality score. Tier values are calibration data for one deployment.

use crate::config::TrackerConfig;

/// (min quality, min smoothed RSSI dBm) -> threshold dBm, tried in order.
pub const THRESHOLD_TIERS: [(f64, f64, i32); 3] =
    [(0.60, -55.0, -55), (0.50, -60.0, -60), (0.40, -65.0, -65)];
/// Used when no tier matches; effectively "far".
pub const FALLBACK_THRESHOLD_DBM: i32 = -65;

/// (min quality) -> consecutive qualifying samples required, tried in order.
/// Higher-quality signals need fewer confirmations.
pub const STABLE_SAMPLE_TIERS: [(f64, u32); 3] = [(0.70, 3), (0.60, 4), (0.50, 5)];
pub const FALLBACK_STABLE_SAMPLES: u32 = 6;

pub struct ProximityModel {
    tx_power_dbm: f64,
    path_loss_exponent: f64,
    max_distance_m: f64,
    touch_rssi_dbm: f64,
}

impl ProximityModel {
    pub fn new(config: &TrackerConfig) -> Self {
        ProximityModel {
            tx_power_dbm: config.tx_power_dbm,
            path_loss_exponent: config.path_loss_exponent,
            max_distance_m: config.max_distance_m,
            touch_rssi_dbm: config.touch_rssi_dbm,
        }
    }

    /// Log-distance path loss: d = 10^((txPower - rssi) / (10 n)).
    pub fn distance_meters(&self, smoothed_rssi: f64) -> f64 {
        if smoothed_rssi >= self.touch_rssi_dbm {
            return 0.1;
        }
        let exponent = (self.tx_power_dbm - smoothed_rssi) / (10.0 * self.path_loss_exponent);
        10f64.powf(exponent).clamp(0.0, self.max_distance_m)
    }

    /// Piecewise-linear display percentage, calibrated so the 1.5 m target
    /// radius lands around 62-63%.
    pub fn signal_percent(&self, smoothed_rssi: f64) -> u8 {
        let d = self.distance_meters(smoothed_rssi);
        let percent = if d < 0.5 {
            100.0 - (d / 0.5) * 5.0
        } else if d < 1.0 {
            95.0 - ((d - 0.5) / 0.5) * 25.0
        } else if d < 3.0 {
            70.0 - ((d - 1.0) / 2.0) * 30.0
        } else if d < 10.0 {
            40.0 - ((d - 3.0) / 7.0) * 30.0
        } else {
            10.0 - ((d - 10.0) / 90.0) * 10.0
        };
        percent.round().clamp(0.0, 100.0) as u8
    }

    /// Tiered reachability threshold: strong, consistent signals may use a
    /// tighter cutoff; everything else falls back to the far tier.
    pub fn dynamic_threshold(&self, smoothed_rssi: f64, quality: f64) -> i32 {
        for (min_quality, min_rssi, threshold) in THRESHOLD_TIERS {
            if quality > min_quality && smoothed_rssi >= min_rssi {
                return threshold;
            }
        }
        FALLBACK_THRESHOLD_DBM
    }

    pub fn required_stable_samples(&self, quality: f64) -> u32 {
        for (min_quality, samples) in STABLE_SAMPLE_TIERS {
            if quality > min_quality {
                return samples;
            }
        }
        FALLBACK_STABLE_SAMPLES
    }
}

/// Fixed display bands for the quality score.
pub fn quality_label(quality: f64) -> &'static str {
    if quality >= 0.9 {
        "Excellent"
    } else if quality >= 0.75 {
        "Very Good"
    } else if quality >= 0.6 {
        "Good"
    } else if quality >= 0.4 {
        "Fair"
    } else if quality >= 0.2 {
        "Weak"
    } else {
        "Poor"
    }
}

/// Human-readable distance, coarser with range.
pub fn distance_label(distance_m: f64) -> String {
    if distance_m < 0.3 {
        "< 30cm".to_string()
    } else if distance_m < 1.0 {
        format!("{}cm", (distance_m * 100.0).round() as i32)
    } else if distance_m < 5.0 {
        format!("{:.1}m", distance_m)
    } else if distance_m < 20.0 {
        format!("{}m", distance_m.round() as i32)
    } else {
        "> 20 m".to_string()
    }
}
