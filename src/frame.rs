// frame.rs — Beacon advertisement frame decoding
//
// Manufacturer data is decoded once per scan result, before identity
// resolution. Anything that does not match a known framing byte-for-byte is
// Unrecognized; short or garbled payloads never error, they just fail to match.

use std::collections::HashMap;
use std::fmt::Write as _;

/// Apple company identifier used by iBeacon advertisements.
pub const IBEACON_COMPANY_ID: u16 = 0x004C;
/// iBeacon payload header: type 0x02, length 0x15.
pub const IBEACON_HEADER: [u8; 2] = [0x02, 0x15];
/// AltBeacon payload header, valid under any manufacturer ID.
pub const ALTBEACON_HEADER: [u8; 2] = [0xBE, 0xAC];

/// Header (2) + UUID (16) + major (2) + minor (2) + power (1).
const FULL_FRAME_LEN: usize = 23;
const UUID_RANGE: std::ops::Range<usize> = 2..18;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BeaconFrame {
    IBeacon {
        uuid: [u8; 16],
        major: u16,
        minor: u16,
        tx_power: i8,
    },
    AltBeacon {
        uuid: [u8; 16],
        major: u16,
        minor: u16,
        tx_power: i8,
    },
}

impl BeaconFrame {
    pub fn uuid(&self) -> &[u8; 16] {
        match self {
            BeaconFrame::IBeacon { uuid, .. } | BeaconFrame::AltBeacon { uuid, .. } => uuid,
        }
    }
}

/// Try to decode one recognizable beacon frame out of a scan result's
/// manufacturer data. iBeacon framing is only accepted under the Apple
/// company ID; AltBeacon framing is accepted under any ID.
pub fn decode(manufacturer_data: &HashMap<u16, Vec<u8>>) -> Option<BeaconFrame> {
    if let Some(payload) = manufacturer_data.get(&IBEACON_COMPANY_ID) {
        if let Some(frame) = decode_payload(payload, &IBEACON_HEADER, true) {
            return Some(frame);
        }
    }
    for payload in manufacturer_data.values() {
        if let Some(frame) = decode_payload(payload, &ALTBEACON_HEADER, false) {
            return Some(frame);
        }
    }
    None
}

fn decode_payload(payload: &[u8], header: &[u8; 2], ibeacon: bool) -> Option<BeaconFrame> {
    if payload.len() < UUID_RANGE.end || payload[0..2] != header[..] {
        return None;
    }
    let mut uuid = [0u8; 16];
    uuid.copy_from_slice(&payload[UUID_RANGE]);

    // Major/minor/power are informational; tolerate truncated frames.
    let (major, minor, tx_power) = if payload.len() >= FULL_FRAME_LEN {
        (
            u16::from_be_bytes([payload[18], payload[19]]),
            u16::from_be_bytes([payload[20], payload[21]]),
            payload[22] as i8,
        )
    } else {
        (0, 0, 0)
    };

    Some(if ibeacon {
        BeaconFrame::IBeacon { uuid, major, minor, tx_power }
    } else {
        BeaconFrame::AltBeacon { uuid, major, minor, tx_power }
    })
}

/// Render 16 UUID bytes as canonical dashed uppercase hex (8-4-4-4-12).
pub fn format_uuid(uuid: &[u8; 16]) -> String {
    let mut out = String::with_capacity(36);
    for (i, byte) in uuid.iter().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            out.push('-');
        }
        let _ = write!(out, "{:02X}", byte);
    }
    out
}
