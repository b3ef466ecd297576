// coordinator.rs — Per-session scan aggregation and waypoint tracking
//
// Everything in this module is independent of:
//   - tokio / async runtime
//   - the platform BLE scanner
//   - any UI or rendering layer
//
// It takes scan-result batches in and produces explicit state-change events
// and a ranked active-signal view out. Batches, eviction sweeps and rescan
// checks are expected to run on one execution context; nothing here is
// internally synchronized.

use std::collections::HashMap;

use log::{debug, info};

use crate::config::TrackerConfig;
use crate::filters::RssiFilter;
use crate::frame;
use crate::proximity::{self, ProximityModel};
use crate::quality::QualityEstimator;
use crate::types::{ActiveSignal, BleScanResult, TrackerSnapshot, WaypointConfig, WaypointView};
use crate::waypoint::Waypoint;

/// State changes surfaced to the embedding layer, one list per batch or
/// eviction sweep. Replaces reactive observable fields with plain data.
#[derive(Clone, Debug)]
pub enum TrackerEvent {
    WaypointReached {
        label: String,
        order: u32,
        timestamp: f64,
    },
    /// A smoothed RSSI moved by at least the significant delta, or a
    /// waypoint was just reached; the ranked list was recomputed.
    ActiveSignalsChanged { count: usize },
    BeaconTimedOut {
        label: String,
        silent_secs: f64,
    },
}

/// Mutable per-beacon signal state, owned by the coordinator and keyed by
/// waypoint slot (beacon and waypoint are one-to-one within a session).
struct BeaconTrack {
    filter: RssiFilter,
    quality: f64,
    detections: u32,
    last_seen: Option<f64>,
}

pub struct ScanCoordinator {
    config: TrackerConfig,
    model: ProximityModel,
    quality: QualityEstimator,
    waypoint_configs: Vec<WaypointConfig>,
    waypoints: Vec<Waypoint>,
    tracks: Vec<BeaconTrack>,
    device_index: HashMap<String, usize>,
    uuid_index: HashMap<String, usize>,
    last_rescan: Option<f64>,
}

impl ScanCoordinator {
    pub fn new(config: TrackerConfig, waypoint_configs: Vec<WaypointConfig>) -> Self {
        let mut device_index = HashMap::new();
        let mut uuid_index = HashMap::new();
        for (idx, wc) in waypoint_configs.iter().enumerate() {
            if let Some(id) = &wc.device_id {
                device_index.insert(id.clone(), idx);
            }
            if let Some(uuid) = &wc.uuid {
                uuid_index.insert(uuid.to_uppercase(), idx);
            }
        }
        let waypoints = waypoint_configs
            .iter()
            .map(|s| Waypoint::new(s.label.clone(), s.order))
            .collect();
        let tracks = waypoint_configs
            .iter()
            .map(|_| BeaconTrack {
                filter: RssiFilter::new(&config),
                quality: 0.0,
                detections: 0,
                last_seen: None,
            })
            .collect();
        ScanCoordinator {
            model: ProximityModel::new(&config),
            quality: QualityEstimator::new(&config),
            config,
            waypoint_configs,
            waypoints,
            tracks,
            device_index,
            uuid_index,
            last_rescan: None,
        }
    }

    /// Map one scan result onto a waypoint slot. Tried in order: exact
    /// device id, beacon-frame UUID, name substring, service-UUID substring.
    /// Ambient BLE traffic matches nothing and is expected.
    pub fn resolve_identity(&self, result: &BleScanResult) -> Option<usize> {
        if let Some(&idx) = self.device_index.get(&result.device_id) {
            return Some(idx);
        }

        if let Some(decoded) = frame::decode(&result.manufacturer_data) {
            let uuid = frame::format_uuid(decoded.uuid());
            if let Some(&idx) = self.uuid_index.get(&uuid) {
                return Some(idx);
            }
        }

        if let Some(name) = &result.name {
            let name = name.to_lowercase();
            for (idx, wc) in self.waypoint_configs.iter().enumerate() {
                if wc
                    .name_hints
                    .iter()
                    .any(|hint| !hint.is_empty() && name.contains(&hint.to_lowercase()))
                {
                    return Some(idx);
                }
            }
        }

        for advertised in &result.service_uuids {
            let advertised = normalize_uuid(advertised);
            if advertised.is_empty() {
                continue;
            }
            for (idx, wc) in self.waypoint_configs.iter().enumerate() {
                if let Some(uuid) = &wc.uuid {
                    if advertised.contains(&normalize_uuid(uuid)) {
                        return Some(idx);
                    }
                }
            }
        }

        None
    }

    /// Handle one batch of scan results to completion.
    ///
    /// Unknown beacons are dropped silently; everything else runs the full
    /// filter -> quality -> proximity -> state-machine chain.
    pub fn process_batch(&mut self, results: &[BleScanResult]) -> Vec<TrackerEvent> {
        let mut events = Vec::new();
        let mut significant = false;

        for result in results {
            let Some(idx) = self.resolve_identity(result) else {
                debug!("unmatched scan result from {}", result.device_id);
                continue;
            };
            significant |= self.process_result(idx, result, &mut events);
        }

        if significant {
            events.push(TrackerEvent::ActiveSignalsChanged {
                count: self.active_signals().len(),
            });
        }
        events
    }

    fn process_result(
        &mut self,
        idx: usize,
        result: &BleScanResult,
        events: &mut Vec<TrackerEvent>,
    ) -> bool {
        let track = &mut self.tracks[idx];
        track.last_seen = Some(result.timestamp);
        track.detections = track.detections.saturating_add(1);

        let previous = track.filter.smoothed();
        let smoothed = track.filter.process(result.rssi);
        track.quality = self.quality.estimate(&track.filter, track.detections);

        let distance = self.model.distance_meters(smoothed);
        let percent = self.model.signal_percent(smoothed);
        let threshold = self.model.dynamic_threshold(smoothed, track.quality);
        let required = self.model.required_stable_samples(track.quality);

        let waypoint = &mut self.waypoints[idx];
        let rounded = smoothed.round() as i32;

        // The RSSI threshold alone is noisy near the target radius, so
        // unreached waypoints must also pass the quality/percent/distance
        // gate. Reached waypoints skip the gate so display data stays live.
        let gate_open = track.quality > self.config.gate_min_quality
            && percent >= self.config.gate_min_percent
            && distance < self.config.gate_max_distance_m;

        let just_reached = if waypoint.reached() || gate_open {
            waypoint.update_rssi(rounded, threshold, required)
        } else {
            false
        };

        if just_reached {
            info!(
                "waypoint {} '{}' reached (rssi {:.1} dBm, quality {:.2})",
                waypoint.order, waypoint.label, smoothed, track.quality
            );
            events.push(TrackerEvent::WaypointReached {
                label: waypoint.label.clone(),
                order: waypoint.order,
                timestamp: result.timestamp,
            });
        }

        just_reached || (smoothed - previous).abs() >= self.config.significant_rssi_delta
    }

    /// Staleness sweep, expected on a fixed tick. Unreached waypoints lose
    /// all derived signal state and their counters; reached waypoints are
    /// untouched and survive signal loss for the rest of the session.
    pub fn evict_stale(&mut self, now: f64) -> Vec<TrackerEvent> {
        let mut events = Vec::new();
        for (idx, track) in self.tracks.iter_mut().enumerate() {
            let Some(seen) = track.last_seen else {
                continue;
            };
            let silent = now - seen;
            if silent <= self.config.staleness_window_secs {
                continue;
            }
            if self.waypoints[idx].reached() {
                continue;
            }
            track.filter.clear();
            track.quality = 0.0;
            track.detections = 0;
            track.last_seen = None;
            self.waypoints[idx].reset();
            info!(
                "beacon '{}' silent for {:.1}s, evicted",
                self.waypoint_configs[idx].label, silent
            );
            events.push(TrackerEvent::BeaconTimedOut {
                label: self.waypoint_configs[idx].label.clone(),
                silent_secs: silent,
            });
        }
        events
    }

    /// True when the platform scan should be stopped and restarted to dodge
    /// scan staleness. The restart itself belongs to the scanning layer.
    pub fn rescan_due(&mut self, now: f64) -> bool {
        match self.last_rescan {
            None => {
                self.last_rescan = Some(now);
                false
            }
            Some(last) if now - last >= self.config.rescan_interval_secs => {
                self.last_rescan = Some(now);
                true
            }
            Some(_) => false,
        }
    }

    /// Ranked list of waypoints worth surfacing: reached ones always, others
    /// only with a live-enough signal. Reached first, then composite score.
    pub fn active_signals(&self) -> Vec<ActiveSignal> {
        let mut list: Vec<ActiveSignal> = self
            .waypoints
            .iter()
            .zip(&self.tracks)
            .filter(|(wp, track)| {
                wp.reached()
                    || (track.filter.smoothed() > self.config.active_min_rssi_dbm
                        && track.quality > self.config.active_min_quality)
            })
            .map(|(wp, track)| {
                let smoothed = track.filter.smoothed();
                let distance = self.model.distance_meters(smoothed);
                ActiveSignal {
                    label: wp.label.clone(),
                    order: wp.order,
                    reached: wp.reached(),
                    smoothed_rssi: smoothed,
                    quality: track.quality,
                    quality_label: proximity::quality_label(track.quality).to_string(),
                    signal_percent: self.model.signal_percent(smoothed),
                    distance_m: distance,
                    distance_label: proximity::distance_label(distance),
                    score: smoothed
                        * (self.config.rank_base + self.config.rank_quality_weight * track.quality),
                }
            })
            .collect();

        list.sort_by(|a, b| {
            b.reached.cmp(&a.reached).then(
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        });
        list
    }

    pub fn waypoints(&self) -> Vec<WaypointView> {
        self.waypoints
            .iter()
            .zip(&self.tracks)
            .map(|(wp, track)| WaypointView {
                label: wp.label.clone(),
                order: wp.order,
                reached: wp.reached(),
                stable_count: wp.stable_count(),
                smoothed_rssi: track.filter.smoothed(),
                quality: track.quality,
                detections: track.detections,
            })
            .collect()
    }

    pub fn reached_count(&self) -> usize {
        self.waypoints.iter().filter(|wp| wp.reached()).count()
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            waypoints: self.waypoints(),
            active_signals: self.active_signals(),
            reached_count: self.reached_count(),
        }
    }

    /// Explicit operator reset of one waypoint by sequence order.
    pub fn reset_waypoint(&mut self, order: u32) {
        if let Some(wp) = self.waypoints.iter_mut().find(|wp| wp.order == order) {
            wp.reset();
        }
    }

    /// Clear one waypoint's confirmation counter; reached state is kept.
    pub fn reset_waypoint_counter(&mut self, order: u32) {
        if let Some(wp) = self.waypoints.iter_mut().find(|wp| wp.order == order) {
            wp.reset_counter();
        }
    }

    /// Restart the whole session in place: every waypoint unreached, every
    /// beacon track back to cold.
    pub fn reset_all(&mut self) {
        for wp in &mut self.waypoints {
            wp.reset();
        }
        for track in &mut self.tracks {
            track.filter.clear();
            track.quality = 0.0;
            track.detections = 0;
            track.last_seen = None;
        }
        self.last_rescan = None;
    }
}

fn normalize_uuid(uuid: &str) -> String {
    uuid.chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect::<String>()
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const WP2_UUID: &str = "E2C56DB5-DFFB-48D2-B060-D0F5A71096E0";

    fn waypoint_configs() -> Vec<WaypointConfig> {
        vec![
            WaypointConfig {
                label: "Entrance".into(),
                order: 1,
                device_id: Some("AA:11".into()),
                uuid: None,
                name_hints: vec!["entrance".into()],
            },
            WaypointConfig {
                label: "Hallway".into(),
                order: 2,
                device_id: Some("BB:22".into()),
                uuid: Some(WP2_UUID.into()),
                name_hints: vec![],
            },
            WaypointConfig {
                label: "Lab".into(),
                order: 3,
                device_id: Some("CC:33".into()),
                uuid: None,
                name_hints: vec!["lab-beacon".into()],
            },
        ]
    }

    fn coordinator() -> ScanCoordinator {
        ScanCoordinator::new(TrackerConfig::default(), waypoint_configs())
    }

    fn result(device_id: &str, rssi: i32, timestamp: f64) -> BleScanResult {
        BleScanResult {
            device_id: device_id.into(),
            rssi,
            name: None,
            manufacturer_data: HashMap::new(),
            service_uuids: vec![],
            timestamp,
        }
    }

    fn uuid_bytes() -> [u8; 16] {
        [
            0xE2, 0xC5, 0x6D, 0xB5, 0xDF, 0xFB, 0x48, 0xD2, 0xB0, 0x60, 0xD0, 0xF5, 0xA7, 0x10,
            0x96, 0xE0,
        ]
    }

    /// Drive one beacon with a constant RSSI until the waypoint flips.
    fn drive_to_reached(coord: &mut ScanCoordinator, device_id: &str, rssi: i32) -> f64 {
        let mut t = 0.0;
        for _ in 0..80 {
            t += 0.5;
            let events = coord.process_batch(&[result(device_id, rssi, t)]);
            if events
                .iter()
                .any(|e| matches!(e, TrackerEvent::WaypointReached { .. }))
            {
                return t;
            }
        }
        panic!("waypoint never reached at rssi {rssi}");
    }

    #[test]
    fn resolves_by_device_id_first() {
        let coord = coordinator();
        assert_eq!(coord.resolve_identity(&result("BB:22", -60, 1.0)), Some(1));
    }

    #[test]
    fn resolves_by_ibeacon_uuid() {
        let coord = coordinator();
        let mut payload = vec![0x02, 0x15];
        payload.extend_from_slice(&uuid_bytes());
        payload.extend_from_slice(&[0x00, 0x01, 0x00, 0x02, 0xC5]);
        let mut r = result("unknown-device", -60, 1.0);
        r.manufacturer_data.insert(0x004C, payload);
        assert_eq!(coord.resolve_identity(&r), Some(1));
    }

    #[test]
    fn resolves_by_name_hint() {
        let coord = coordinator();
        let mut r = result("unknown-device", -60, 1.0);
        r.name = Some("HM10 Lab-Beacon 3".into());
        assert_eq!(coord.resolve_identity(&r), Some(2));
    }

    #[test]
    fn resolves_by_service_uuid_substring() {
        let coord = coordinator();
        let mut r = result("unknown-device", -60, 1.0);
        r.service_uuids = vec![WP2_UUID.to_lowercase()];
        assert_eq!(coord.resolve_identity(&r), Some(1));
    }

    #[test]
    fn foreign_traffic_is_dropped_without_state_change() {
        let mut coord = coordinator();
        let events = coord.process_batch(&[result("ambient-phone", -40, 1.0)]);
        assert!(events.is_empty());
        assert!(coord.waypoints().iter().all(|w| w.detections == 0));
    }

    #[test]
    fn malformed_manufacturer_data_falls_through() {
        let mut coord = coordinator();
        let mut r = result("unknown-device", -40, 1.0);
        r.manufacturer_data.insert(0x004C, vec![0x02]);
        assert_eq!(coord.resolve_identity(&r), None);
        assert!(coord.process_batch(&[r]).is_empty());
    }

    #[test]
    fn strong_steady_beacon_reaches_waypoint() {
        let mut coord = coordinator();
        drive_to_reached(&mut coord, "AA:11", -45);
        assert_eq!(coord.reached_count(), 1);
        let views = coord.waypoints();
        assert!(views[0].reached);
        assert!(!views[1].reached);
    }

    #[test]
    fn weak_beacon_never_passes_the_gate() {
        let mut coord = coordinator();
        let mut t = 0.0;
        for _ in 0..80 {
            t += 0.5;
            // -70 dBm is ~2.9 m out: outside the 1.5 m gate radius.
            coord.process_batch(&[result("AA:11", -70, t)]);
        }
        assert_eq!(coord.reached_count(), 0);
        assert_eq!(coord.waypoints()[0].stable_count, 0);
    }

    #[test]
    fn reached_waypoint_survives_eviction_and_stays_ranked_first() {
        let mut coord = coordinator();
        let reached_at = drive_to_reached(&mut coord, "AA:11", -45);

        // Second beacon is live but unreached.
        let mut t = reached_at;
        for _ in 0..10 {
            t += 0.5;
            coord.process_batch(&[result("BB:22", -50, t)]);
        }

        // 30 s of silence: well past the 8 s staleness window.
        let quality_before = coord.waypoints()[0].quality;
        let events = coord.evict_stale(t + 30.0);

        // The unreached beacon is evicted, the reached one is untouched.
        assert!(events
            .iter()
            .any(|e| matches!(e, TrackerEvent::BeaconTimedOut { label, .. } if label == "Hallway")));
        let views = coord.waypoints();
        assert!(views[0].reached);
        assert_eq!(views[0].quality, quality_before);
        assert!(views[0].smoothed_rssi > -60.0);
        assert!(!views[1].reached);
        assert_eq!(views[1].smoothed_rssi, -100.0);
        assert_eq!(views[1].quality, 0.0);
        assert_eq!(views[1].detections, 0);

        let active = coord.active_signals();
        assert_eq!(active[0].label, "Entrance");
        assert!(active[0].reached);
        assert!(!active.iter().any(|s| s.label == "Hallway"));

        // Eviction is one-shot until the beacon is seen again.
        assert!(coord.evict_stale(t + 40.0).is_empty());
    }

    #[test]
    fn eviction_spares_recently_seen_beacons() {
        let mut coord = coordinator();
        coord.process_batch(&[result("AA:11", -60, 100.0)]);
        assert!(coord.evict_stale(104.0).is_empty());
        assert!(!coord.evict_stale(109.0).is_empty());
    }

    #[test]
    fn active_set_requires_live_signal_or_reached() {
        let mut coord = coordinator();
        // One weak sample leaves the smoothed estimate below the -95 cutoff.
        coord.process_batch(&[result("AA:11", -70, 1.0)]);
        assert!(coord.active_signals().is_empty());

        let mut t = 1.0;
        for _ in 0..10 {
            t += 0.5;
            coord.process_batch(&[result("AA:11", -60, t)]);
        }
        let active = coord.active_signals();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].label, "Entrance");
        assert!(!active[0].reached);
    }

    #[test]
    fn significant_update_flag_settles_once_smoothed() {
        let mut coord = coordinator();
        // Early samples move the estimate by several dBm each: significant.
        let events = coord.process_batch(&[result("AA:11", -60, 0.5)]);
        assert!(events
            .iter()
            .any(|e| matches!(e, TrackerEvent::ActiveSignalsChanged { .. })));

        let mut t = 0.5;
        for _ in 0..60 {
            t += 0.5;
            coord.process_batch(&[result("AA:11", -60, t)]);
        }
        // Fully converged: per-sample delta is now far below 2 dBm.
        let events = coord.process_batch(&[result("AA:11", -60, t + 0.5)]);
        assert!(events.is_empty());
    }

    #[test]
    fn rescan_cadence_triggers_on_interval() {
        let mut coord = coordinator();
        assert!(!coord.rescan_due(5.0));
        assert!(!coord.rescan_due(15.0));
        assert!(coord.rescan_due(25.0));
        assert!(!coord.rescan_due(30.0));
        assert!(coord.rescan_due(45.1));
    }

    #[test]
    fn explicit_reset_clears_a_reached_waypoint() {
        let mut coord = coordinator();
        drive_to_reached(&mut coord, "AA:11", -45);
        coord.reset_waypoint(1);
        assert_eq!(coord.reached_count(), 0);
        assert!(!coord.waypoints()[0].reached);
    }

    #[test]
    fn reset_all_returns_to_cold_state() {
        let mut coord = coordinator();
        drive_to_reached(&mut coord, "AA:11", -45);
        coord.reset_all();
        let views = coord.waypoints();
        assert!(views.iter().all(|w| !w.reached
            && w.stable_count == 0
            && w.detections == 0
            && w.smoothed_rssi == -100.0));
        assert!(coord.active_signals().is_empty());
    }
}
