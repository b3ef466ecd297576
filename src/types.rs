use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One advertisement report from the platform BLE scanner.
///
/// `timestamp` is seconds on the same monotonic-ish clock the caller uses for
/// eviction ticks; the core never reads the wall clock itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BleScanResult {
    pub device_id: String,
    pub rssi: i32,
    pub name: Option<String>,
    /// Manufacturer company ID -> raw advertisement payload.
    #[serde(default)]
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
    #[serde(default)]
    pub service_uuids: Vec<String>,
    pub timestamp: f64,
}

/// Static description of one waypoint beacon, supplied at session start.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WaypointConfig {
    pub label: String,
    /// 1-based position in the navigation sequence. Unique per session.
    pub order: u32,
    /// Exact platform device identifier, if known ahead of time.
    #[serde(default)]
    pub device_id: Option<String>,
    /// Canonical dashed uppercase beacon UUID (iBeacon/AltBeacon payload).
    #[serde(default)]
    pub uuid: Option<String>,
    /// Substrings matched (case-insensitive) against the advertised name.
    #[serde(default)]
    pub name_hints: Vec<String>,
}

/// Live per-waypoint state exposed upward.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WaypointView {
    pub label: String,
    pub order: u32,
    pub reached: bool,
    pub stable_count: u32,
    pub smoothed_rssi: f64,
    pub quality: f64,
    pub detections: u32,
}

/// One entry of the ranked active-signal list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActiveSignal {
    pub label: String,
    pub order: u32,
    pub reached: bool,
    pub smoothed_rssi: f64,
    pub quality: f64,
    pub quality_label: String,
    pub signal_percent: u8,
    pub distance_m: f64,
    pub distance_label: String,
    pub score: f64,
}

/// Consistent point-in-time view of the whole tracker, for polling callers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub waypoints: Vec<WaypointView>,
    pub active_signals: Vec<ActiveSignal>,
    pub reached_count: usize,
}
