// scanner.rs — Simulated BLE scan source for the demo binary
//
// Stands in for the platform scanner: pushes scan-result batches over an mpsc
// channel at scan-cycle cadence. The simulation walks a straight corridor past
// the configured beacons and synthesizes RSSI from the same path-loss model
// the tracker inverts, plus deterministic jitter and occasional foreign
// traffic, so every identity-resolution path gets exercised.

use std::collections::HashMap;

use tokio::sync::mpsc::Sender;
use tokio::time::{interval, Duration};

use crate::types::BleScanResult;

/// One simulated beacon placed along the corridor.
#[derive(Clone, Debug)]
pub struct SimBeacon {
    pub device_id: String,
    /// Meters from the corridor start.
    pub position_m: f64,
}

pub struct SimScanner {
    /// Beacons ordered by corridor position.
    pub beacons: Vec<SimBeacon>,
    /// Walking speed, m/s.
    pub speed_mps: f64,
    /// Pause at each beacon; gives the smoothing filter time to converge
    /// inside the reach radius, like a person stopping at a checkpoint.
    pub dwell_secs: f64,
    /// Seconds between emitted batches.
    pub batch_period_secs: f64,
}

impl SimScanner {
    pub fn corridor(beacons: Vec<SimBeacon>) -> Self {
        SimScanner {
            beacons,
            speed_mps: 0.7,
            dwell_secs: 12.0,
            batch_period_secs: 0.5,
        }
    }

    /// Walk -> stop at each beacon for `dwell_secs` -> walk on.
    fn walker_position(&self, mut t: f64) -> f64 {
        let mut pos = 0.0;
        for beacon in &self.beacons {
            let travel = (beacon.position_m - pos).max(0.0) / self.speed_mps;
            if t <= travel {
                return pos + self.speed_mps * t;
            }
            t -= travel;
            pos = beacon.position_m;
            if t <= self.dwell_secs {
                return pos;
            }
            t -= self.dwell_secs;
        }
        pos + self.speed_mps * t
    }

    fn rssi_at(&self, beacon_pos: f64, walker_pos: f64, t: f64, salt: f64) -> i32 {
        let distance = (beacon_pos - walker_pos).abs().max(0.3);
        let ideal = -59.0 - 10.0 * 2.4 * distance.log10();
        // Deterministic multipath-ish jitter, a few dB peak to peak.
        let jitter = 3.0 * (t * 2.3 + salt).sin() + 1.5 * (t * 7.1 + salt * 2.0).sin();
        (ideal + jitter).round() as i32
    }

    fn batch_at(&self, t: f64) -> Vec<BleScanResult> {
        let walker_pos = self.walker_position(t);
        let mut batch: Vec<BleScanResult> = self
            .beacons
            .iter()
            .enumerate()
            .filter_map(|(i, beacon)| {
                let rssi = self.rssi_at(beacon.position_m, walker_pos, t, i as f64);
                // Out of radio range: the platform simply reports nothing.
                if rssi < -95 {
                    return None;
                }
                Some(BleScanResult {
                    device_id: beacon.device_id.clone(),
                    rssi,
                    name: None,
                    manufacturer_data: HashMap::new(),
                    service_uuids: vec![],
                    timestamp: t,
                })
            })
            .collect();

        // Ambient foreign advertiser every few cycles; the coordinator must
        // drop it on the floor.
        if (t as u64) % 5 == 0 {
            batch.push(BleScanResult {
                device_id: format!("phone-{}", t as u64),
                rssi: -55,
                name: Some("Pixel".into()),
                manufacturer_data: HashMap::new(),
                service_uuids: vec![],
                timestamp: t,
            });
        }
        batch
    }

    /// Emit batches until the channel closes. Mirrors the shape of a real
    /// platform-scanner callback loop.
    pub async fn run(self, tx: Sender<Vec<BleScanResult>>) {
        let mut ticker = interval(Duration::from_millis(
            (self.batch_period_secs * 1000.0) as u64,
        ));
        let mut t = 0.0;
        loop {
            ticker.tick().await;
            t += self.batch_period_secs;
            if tx.send(self.batch_at(t)).await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> SimScanner {
        SimScanner::corridor(vec![
            SimBeacon { device_id: "AA".into(), position_m: 3.0 },
            SimBeacon { device_id: "BB".into(), position_m: 30.0 },
        ])
    }

    #[test]
    fn nearby_beacon_is_reported_distant_one_is_not() {
        let s = scanner();
        // Walker at ~2.8 m: right next to AA, ~27 m from BB.
        let batch = s.batch_at(4.0);
        assert!(batch.iter().any(|r| r.device_id == "AA"));
        assert!(!batch.iter().any(|r| r.device_id == "BB"));
    }

    #[test]
    fn walker_dwells_at_each_beacon() {
        let s = scanner();
        // Arrives at 3.0 m after ~4.3 s and holds for the 12 s dwell.
        assert!((s.walker_position(5.0) - 3.0).abs() < 1e-9);
        assert!((s.walker_position(16.0) - 3.0).abs() < 1e-9);
        assert!(s.walker_position(17.0) > 3.0);
    }

    #[test]
    fn rssi_rises_as_walker_approaches() {
        let s = scanner();
        let far = s.rssi_at(3.0, 0.0, 1.0, 0.0);
        let near = s.rssi_at(3.0, 2.7, 1.0, 0.0);
        assert!(near > far);
    }
}
