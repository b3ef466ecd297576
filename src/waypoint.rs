use serde::{Deserialize, Serialize};

/// On a below-threshold sample the stability counter is scaled by this and
/// floored, instead of being zeroed. Transient dropouts near the boundary
/// should not erase accumulated confirmation.
pub const STABLE_DECAY_FACTOR: f64 = 0.8;
/// Hard cap on the stability counter after decay.
pub const STABLE_COUNT_CAP: u32 = 10;

/// One navigation checkpoint tied to a single beacon.
///
/// `reached` is sticky for the whole session: no decay path or eviction may
/// clear it, only an explicit `reset`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Waypoint {
    pub label: String,
    /// 1-based position in the navigation sequence.
    pub order: u32,
    reached: bool,
    stable_count: u32,
}

impl Waypoint {
    pub fn new(label: impl Into<String>, order: u32) -> Self {
        Waypoint {
            label: label.into(),
            order,
            reached: false,
            stable_count: 0,
        }
    }

    /// Feed one qualifying-or-not RSSI observation.
    ///
    /// Returns true exactly once, on the call where the waypoint first
    /// crosses `required_samples` consecutive confirmations.
    pub fn update_rssi(&mut self, rssi: i32, threshold: i32, required_samples: u32) -> bool {
        if self.reached {
            return false;
        }
        if rssi >= threshold {
            self.stable_count += 1;
            if self.stable_count >= required_samples {
                self.reached = true;
                return true;
            }
        } else {
            self.stable_count = ((self.stable_count as f64 * STABLE_DECAY_FACTOR).floor() as u32)
                .min(STABLE_COUNT_CAP);
        }
        false
    }

    /// Full operator reset: back to unreached, counter cleared.
    pub fn reset(&mut self) {
        self.reached = false;
        self.stable_count = 0;
    }

    /// Clear the stability counter only; a reached waypoint stays reached.
    pub fn reset_counter(&mut self) {
        self.stable_count = 0;
    }

    pub fn reached(&self) -> bool {
        self.reached
    }

    pub fn stable_count(&self) -> u32 {
        self.stable_count
    }
}
