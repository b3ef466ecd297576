// config.rs — Tuning constants for the beacon tracking pipeline
//
// Every value here is calibration data for one physical deployment (beacon
// transmit power, room geometry, scan rate of the host radio). Treat these as
// knobs, not derived logic: changing them changes behavior, not correctness.

#[derive(Clone, Debug)]
pub struct TrackerConfig {
    // ── RSSI history / smoothing ──
    /// Bounded per-beacon raw sample history, oldest evicted first.
    pub history_capacity: usize,
    /// Outlier rejection only kicks in once this many samples exist.
    pub outlier_min_samples: usize,
    /// Samples deviating more than this from the median (dBm) are dropped.
    pub outlier_deviation_db: f64,
    /// Recency weight base: sample i (oldest = 0) weighs base^i.
    pub recency_weight_base: f64,
    /// Exponential smoothing factor for the per-beacon RSSI estimate.
    pub smoothing_alpha: f64,
    /// Smoothed RSSI starts here ("far away") before the first sample.
    pub rssi_floor_dbm: f64,

    // ── Signal quality ──
    /// Below this many samples the quality score is `default_quality`.
    pub quality_min_samples: usize,
    /// Fixed low-confidence score for short histories.
    pub default_quality: f64,
    /// Variance divisor for the consistency score (1 - var/scale).
    pub variance_scale: f64,
    /// Super-linear penalty exponent applied to the consistency score.
    pub consistency_power: f64,
    /// dBm range mapped linearly onto [0,1] for the strength score.
    pub strength_floor_dbm: f64,
    pub strength_ceiling_dbm: f64,
    /// Detection count at which the frequency score saturates at 1.
    pub frequency_saturation: u32,
    /// Quality = w_consistency·c^p + w_strength·s + w_frequency·f.
    pub weight_consistency: f64,
    pub weight_strength: f64,
    pub weight_frequency: f64,

    // ── Path-loss / proximity model ──
    /// Expected RSSI at 1 m (dBm).
    pub tx_power_dbm: f64,
    /// Log-distance path-loss exponent (2.0 free space, higher indoors).
    pub path_loss_exponent: f64,
    /// Distance estimates are clamped to this range (meters).
    pub max_distance_m: f64,
    /// At or above this RSSI the beacon is treated as touching (0.1 m).
    pub touch_rssi_dbm: f64,

    // ── Reachability gate (unreached waypoints only) ──
    pub gate_min_quality: f64,
    pub gate_min_percent: u8,
    pub gate_max_distance_m: f64,

    // ── Coordinator cadence / eviction ──
    /// Smoothed-RSSI delta (dBm) that counts as a significant update.
    pub significant_rssi_delta: f64,
    /// Beacons silent longer than this are evicted (unreached only).
    pub staleness_window_secs: f64,
    /// How often the staleness sweep should run.
    pub eviction_tick_secs: f64,
    /// Platform scans are stopped and restarted at this cadence.
    pub rescan_interval_secs: f64,

    // ── Active-set selection ──
    /// Unreached beacons need smoothed RSSI above this to be listed.
    pub active_min_rssi_dbm: f64,
    /// ...and quality above this.
    pub active_min_quality: f64,
    /// Ranking score = rssi · (rank_base + rank_quality_weight · quality).
    pub rank_base: f64,
    pub rank_quality_weight: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            history_capacity: 15,
            outlier_min_samples: 5,
            outlier_deviation_db: 20.0,
            recency_weight_base: 1.2,
            smoothing_alpha: 0.15,
            rssi_floor_dbm: -100.0,

            quality_min_samples: 3,
            default_quality: 0.3,
            variance_scale: 200.0,
            consistency_power: 1.5,
            strength_floor_dbm: -100.0,
            strength_ceiling_dbm: -30.0,
            frequency_saturation: 50,
            weight_consistency: 0.5,
            weight_strength: 0.3,
            weight_frequency: 0.2,

            tx_power_dbm: -59.0,
            path_loss_exponent: 2.4,
            max_distance_m: 100.0,
            touch_rssi_dbm: -30.0,

            gate_min_quality: 0.60,
            gate_min_percent: 60,
            gate_max_distance_m: 1.5,

            significant_rssi_delta: 2.0,
            staleness_window_secs: 8.0,
            eviction_tick_secs: 2.0,
            rescan_interval_secs: 20.0,

            active_min_rssi_dbm: -95.0,
            active_min_quality: 0.1,
            rank_base: 0.7,
            rank_quality_weight: 0.3,
        }
    }
}
