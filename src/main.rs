use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use tokio::sync::mpsc;

use beacon_tracker_rs::scanner::{SimBeacon, SimScanner};
use beacon_tracker_rs::{
    ScanCoordinator, TrackerConfig, TrackerEvent, TrackerSnapshot, WaypointConfig,
};

#[derive(Parser, Debug)]
#[command(name = "beacon_tracker")]
#[command(about = "BLE waypoint tracker - simulated corridor walk demo", long_about = None)]
struct Args {
    /// Simulated seconds to run (0 = until all waypoints reached)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// Walking speed in m/s
    #[arg(long, default_value = "0.7")]
    speed: f64,

    /// Print the final tracker snapshot as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct SessionSummary {
    simulated_secs: f64,
    batches: u64,
    reached: usize,
    snapshot: TrackerSnapshot,
}

fn demo_waypoints() -> (Vec<WaypointConfig>, Vec<SimBeacon>) {
    let layout = [("Entrance", "C3:00:00:11", 2.0), ("Hallway", "C3:00:00:22", 14.0), ("Lab door", "C3:00:00:33", 26.0)];
    let waypoints = layout
        .iter()
        .enumerate()
        .map(|(i, (label, device_id, _))| WaypointConfig {
            label: (*label).into(),
            order: i as u32 + 1,
            device_id: Some((*device_id).into()),
            uuid: None,
            name_hints: vec![],
        })
        .collect();
    let beacons = layout
        .iter()
        .map(|(_, device_id, pos)| SimBeacon {
            device_id: (*device_id).into(),
            position_m: *pos,
        })
        .collect();
    (waypoints, beacons)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = TrackerConfig::default();
    let (waypoints, beacons) = demo_waypoints();
    let total_waypoints = waypoints.len();

    println!("[{}] Beacon Tracker Starting", ts_now());
    println!("  Waypoints: {}", total_waypoints);
    println!("  Walking speed: {} m/s", args.speed);

    let mut coordinator = ScanCoordinator::new(config.clone(), waypoints);

    let mut scanner = SimScanner::corridor(beacons);
    scanner.speed_mps = args.speed;

    let (batch_tx, mut batch_rx) = mpsc::channel(64);
    let _scan_handle = tokio::spawn(scanner.run(batch_tx));

    let mut batches = 0u64;
    let mut sim_time = 0.0f64;
    let mut last_eviction = 0.0f64;

    // Batch handling, the eviction sweep and the rescan check all run inside
    // this one loop: per-beacon state is only ever touched from here.
    while let Some(batch) = batch_rx.recv().await {
        batches += 1;
        sim_time = batch.last().map(|r| r.timestamp).unwrap_or(sim_time);

        for event in coordinator.process_batch(&batch) {
            match event {
                TrackerEvent::WaypointReached { label, order, timestamp } => {
                    println!(
                        "[{}] reached waypoint {} '{}' at t={:.1}s ({}/{})",
                        ts_now(),
                        order,
                        label,
                        timestamp,
                        coordinator.reached_count(),
                        total_waypoints
                    );
                }
                TrackerEvent::ActiveSignalsChanged { count } => {
                    print_active(&coordinator, count);
                }
                TrackerEvent::BeaconTimedOut { .. } => {}
            }
        }

        if sim_time - last_eviction >= config.eviction_tick_secs {
            last_eviction = sim_time;
            for event in coordinator.evict_stale(sim_time) {
                if let TrackerEvent::BeaconTimedOut { label, silent_secs } = event {
                    println!(
                        "[{}] beacon '{}' silent {:.1}s, signal state cleared",
                        ts_now(),
                        label,
                        silent_secs
                    );
                }
            }
        }

        if coordinator.rescan_due(sim_time) {
            // A real embedding stops and restarts the platform scan here.
            println!("[{}] rescan cycle at t={:.1}s", ts_now(), sim_time);
        }

        let done = args.duration == 0 && coordinator.reached_count() == total_waypoints;
        let timed_out = args.duration > 0 && sim_time >= args.duration as f64;
        if done || timed_out {
            break;
        }
    }

    let summary = SessionSummary {
        simulated_secs: sim_time,
        batches,
        reached: coordinator.reached_count(),
        snapshot: coordinator.snapshot(),
    };

    println!(
        "[{}] Session over: {}/{} waypoints in {:.1} simulated seconds ({} batches)",
        ts_now(),
        summary.reached,
        total_waypoints,
        summary.simulated_secs,
        summary.batches
    );
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

fn print_active(coordinator: &ScanCoordinator, count: usize) {
    if count == 0 {
        return;
    }
    let line: Vec<String> = coordinator
        .active_signals()
        .iter()
        .map(|s| {
            format!(
                "{}{} {}% {} ({})",
                if s.reached { "*" } else { "" },
                s.label,
                s.signal_percent,
                s.distance_label,
                s.quality_label
            )
        })
        .collect();
    println!("[{}] active: {}", ts_now(), line.join(" | "));
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S%.3f").to_string()
}
