// beacon_tracker_rs — BLE waypoint proximity tracking pipeline
//
// The core (config, filters, quality, proximity, waypoint, coordinator) is a
// pure computation layer: it never touches the radio, the clock, or an async
// runtime. Scan results and timer ticks come in with timestamps attached,
// events and ranked views come out. The `scanner` module and the demo binary
// are the only async pieces.

pub mod config;
pub mod coordinator;
pub mod filters;
pub mod frame;
pub mod proximity;
pub mod quality;
pub mod scanner;
pub mod types;
pub mod waypoint;

pub use config::TrackerConfig;
pub use coordinator::{ScanCoordinator, TrackerEvent};
pub use types::{ActiveSignal, BleScanResult, TrackerSnapshot, WaypointConfig, WaypointView};
pub use waypoint::Waypoint;
