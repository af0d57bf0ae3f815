use chrono::{DateTime, Utc};
use fleetgate_frame::bcd::{parse_bcd_datetime, BCD_TIME_LEN};
use serde::Serialize;
use tracing::debug;

use crate::error::{DecodeError, Result};

/// Fixed part of a location body, before any extensions.
pub const LOCATION_BODY_MIN: usize = 28;

/// Status bit: GPS fix is valid.
pub const STATUS_FIX_VALID: u32 = 0x02;
/// Status bit: western hemisphere (negate longitude).
pub const STATUS_WEST: u32 = 0x04;
/// Status bit: southern hemisphere (negate latitude).
pub const STATUS_SOUTH: u32 = 0x08;

const COORD_SCALE: f64 = 1_000_000.0;
const TIME_OFFSET: usize = 22;

/// Extension ids understood by [`parse_extensions`].
pub mod extension_id {
    pub const MILEAGE: u8 = 0x01;
    pub const FUEL: u8 = 0x2B;
    pub const SIGNAL_STRENGTH: u8 = 0x30;
    pub const SATELLITES: u8 = 0x31;
    pub const MOTION_STATE: u8 = 0x52;
    pub const GSM_CELLS: u8 = 0x53;
    pub const WIFI: u8 = 0x54;
    pub const BATTERY: u8 = 0x56;
    pub const LTE_CELLS: u8 = 0x5D;
    pub const VOLTAGE: u8 = 0x61;
    pub const ICCID: u8 = 0xF1;
    pub const FORTIFIED: u8 = 0xF3;
}

const GSM_CELL_WIDTH: usize = 8;
const LTE_CELL_WIDTH: usize = 10;
const WIFI_WIDTH: usize = 7;
const ICCID_LEN: usize = 20;

/// One decoded location fix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionRecord {
    /// Device-reported fix time, or the receive time if the BCD field was bad.
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude_m: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_kph: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_deg: Option<u16>,
    pub alarm_flags: u32,
    pub status: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<Extension>,
}

/// A trailing (id, length, value) item of a location body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Extension {
    Mileage { km: f64 },
    Fuel { raw: u32 },
    SignalStrength { csq: u8 },
    Satellites { count: u8 },
    /// 0 unknown, 1 forward, 2 reverse, 3 stopped.
    MotionState { state: u8 },
    GsmCells { cells: Vec<GsmCell> },
    Wifi { access_points: Vec<WifiAccessPoint> },
    Battery { level: u8 },
    LteCells { cells: Vec<LteCell> },
    Voltage { volts: f64 },
    Iccid { iccid: String },
    Fortified { armed: bool },
    /// Unknown id, or a known id with an unexpected width.
    Skipped { id: u8, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GsmCell {
    pub mcc: u16,
    pub mnc: u8,
    pub lac: u16,
    pub cell_id: u16,
    pub signal: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LteCell {
    pub mcc: u16,
    pub mnc: u8,
    pub lac: u16,
    pub cell_id: u32,
    pub signal: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WifiAccessPoint {
    /// Colon-separated upper-case hex.
    pub mac: String,
    pub signal: u8,
}

/// Decode a location report (0x0200) or location query response (0x0201) body.
///
/// ```text
/// ┌───────────┬────────────┬─────────┬─────────┬─────────┬─────────┬─────────┬──────────┬────────────┐
/// │ Alarm 4B  │ Status 4B  │ Lat 4B  │ Lon 4B  │ Alt 2B  │ Spd 2B  │ Hdg 2B  │ Time 6B  │ Extensions │
/// │           │            │ 1e-6 °  │ 1e-6 °  │ m       │ 0.1km/h │ °       │ BCD      │ id,len,val │
/// └───────────┴────────────┴─────────┴─────────┴─────────┴─────────┴─────────┴──────────┴────────────┘
/// ```
///
/// `received_at` stands in for an unparseable fix time.
pub fn decode_location(body: &[u8], received_at: DateTime<Utc>) -> Result<PositionRecord> {
    if body.len() < LOCATION_BODY_MIN {
        return Err(DecodeError::BodyTooShort {
            kind: "location",
            len: body.len(),
            min: LOCATION_BODY_MIN,
        });
    }

    let alarm_flags = be_u32(&body[0..4]);
    let status = be_u32(&body[4..8]);
    let mut latitude = f64::from(be_i32(&body[8..12])) / COORD_SCALE;
    let mut longitude = f64::from(be_i32(&body[12..16])) / COORD_SCALE;
    if status & STATUS_WEST != 0 {
        longitude = -longitude;
    }
    if status & STATUS_SOUTH != 0 {
        latitude = -latitude;
    }

    let valid = status & STATUS_FIX_VALID != 0;
    let altitude = be_u16(&body[16..18]);
    let speed = f32::from(be_u16(&body[18..20])) / 10.0;
    let heading = be_u16(&body[20..22]);

    let time_bytes = &body[TIME_OFFSET..TIME_OFFSET + BCD_TIME_LEN];
    let timestamp = parse_bcd_datetime(time_bytes).unwrap_or_else(|| {
        debug!(raw = ?time_bytes, "unparseable fix time, using receive time");
        received_at
    });

    Ok(PositionRecord {
        timestamp,
        valid,
        latitude,
        longitude,
        altitude_m: valid.then_some(altitude),
        speed_kph: valid.then_some(speed),
        heading_deg: valid.then_some(heading),
        alarm_flags,
        status,
        extensions: parse_extensions(&body[LOCATION_BODY_MIN..]),
    })
}

/// Parse the (id, length, value) list that trails the fixed location body.
///
/// A declared length that runs past the end of `data` stops the scan.
pub fn parse_extensions(data: &[u8]) -> Vec<Extension> {
    let mut out = Vec::new();
    let mut pos = 0;

    while pos + 2 <= data.len() {
        let id = data[pos];
        let len = usize::from(data[pos + 1]);
        pos += 2;

        let Some(value) = data.get(pos..pos + len) else {
            debug!(id, len, remaining = data.len() - pos, "extension overruns body");
            break;
        };
        out.push(parse_extension(id, value));
        pos += len;
    }

    out
}

fn parse_extension(id: u8, value: &[u8]) -> Extension {
    use extension_id::*;

    let len = value.len();
    match (id, len) {
        (MILEAGE, 4) => Extension::Mileage {
            km: f64::from(be_u32(value)) / 10.0,
        },
        (FUEL, 4) => Extension::Fuel {
            raw: be_u32(value),
        },
        (SIGNAL_STRENGTH, 1) => Extension::SignalStrength { csq: value[0] },
        (SATELLITES, 1) => Extension::Satellites { count: value[0] },
        (MOTION_STATE, 1) => Extension::MotionState { state: value[0] },
        (GSM_CELLS, 1..) => Extension::GsmCells {
            cells: counted_entries(value, GSM_CELL_WIDTH)
                .map(|e| GsmCell {
                    mcc: be_u16(&e[0..2]),
                    mnc: e[2],
                    lac: be_u16(&e[3..5]),
                    cell_id: be_u16(&e[5..7]),
                    signal: e[7],
                })
                .collect(),
        },
        (WIFI, 1..) => Extension::Wifi {
            access_points: counted_entries(value, WIFI_WIDTH)
                .map(|e| WifiAccessPoint {
                    mac: format_mac(&e[0..6]),
                    signal: e[6],
                })
                .collect(),
        },
        (BATTERY, 2) => Extension::Battery { level: value[0] },
        (LTE_CELLS, 1..) => Extension::LteCells {
            cells: counted_entries(value, LTE_CELL_WIDTH)
                .map(|e| LteCell {
                    mcc: be_u16(&e[0..2]),
                    mnc: e[2],
                    lac: be_u16(&e[3..5]),
                    cell_id: be_u32(&e[5..9]),
                    signal: e[9],
                })
                .collect(),
        },
        (VOLTAGE, 2) => Extension::Voltage {
            volts: f64::from(be_u16(value)) / 100.0,
        },
        (ICCID, ICCID_LEN) => Extension::Iccid {
            iccid: String::from_utf8_lossy(value)
                .trim_end_matches('\0')
                .to_string(),
        },
        (FORTIFIED, 1) => Extension::Fortified {
            armed: value[0] == 0x01,
        },
        _ => Extension::Skipped { id, len },
    }
}

/// Count-prefixed fixed-width entries; a count larger than the value holds
/// yields only the entries that fit.
fn counted_entries(value: &[u8], width: usize) -> impl Iterator<Item = &[u8]> {
    let count = usize::from(value[0]);
    value[1..].chunks_exact(width).take(count)
}

fn format_mac(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

fn be_u16(b: &[u8]) -> u16 {
    u16::from_be_bytes([b[0], b[1]])
}

fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

fn be_i32(b: &[u8]) -> i32 {
    i32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn location_body(status: u32, lat: i32, lon: i32) -> Vec<u8> {
        let mut body = Vec::with_capacity(LOCATION_BODY_MIN);
        body.extend_from_slice(&0u32.to_be_bytes());
        body.extend_from_slice(&status.to_be_bytes());
        body.extend_from_slice(&lat.to_be_bytes());
        body.extend_from_slice(&lon.to_be_bytes());
        body.extend_from_slice(&120u16.to_be_bytes());
        body.extend_from_slice(&455u16.to_be_bytes());
        body.extend_from_slice(&90u16.to_be_bytes());
        body.extend_from_slice(&[0x24, 0x03, 0x15, 0x10, 0x30, 0x45]);
        body
    }

    fn received() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn decodes_valid_fix() {
        let body = location_body(0x02, 18_500_000, -69_000_000);
        let record = decode_location(&body, received()).unwrap();

        assert!(record.valid);
        assert_eq!(record.latitude, 18.5);
        assert_eq!(record.longitude, -69.0);
        assert_eq!(record.altitude_m, Some(120));
        assert_eq!(record.speed_kph, Some(45.5));
        assert_eq!(record.heading_deg, Some(90));
        assert_eq!(
            record.timestamp,
            Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 45).unwrap()
        );
        assert!(record.extensions.is_empty());
    }

    #[test]
    fn hemisphere_bits_negate_coordinates() {
        let body = location_body(0x02 | STATUS_SOUTH | STATUS_WEST, 33_000_000, 70_500_000);
        let record = decode_location(&body, received()).unwrap();
        assert_eq!(record.latitude, -33.0);
        assert_eq!(record.longitude, -70.5);

        let south_only = location_body(STATUS_SOUTH, 10_000_000, 20_000_000);
        let record = decode_location(&south_only, received()).unwrap();
        assert_eq!(record.latitude, -10.0);
        assert_eq!(record.longitude, 20.0);
    }

    #[test]
    fn invalid_fix_omits_motion_fields() {
        let body = location_body(0x00, 1_000_000, 2_000_000);
        let record = decode_location(&body, received()).unwrap();

        assert!(!record.valid);
        assert_eq!(record.altitude_m, None);
        assert_eq!(record.speed_kph, None);
        assert_eq!(record.heading_deg, None);
        assert_eq!(record.status, 0);
    }

    #[test]
    fn bad_time_falls_back_to_receive_time() {
        let mut body = location_body(0x02, 0, 0);
        body[22..28].copy_from_slice(&[0x24, 0x13, 0x45, 0x99, 0x00, 0x00]);
        let record = decode_location(&body, received()).unwrap();
        assert_eq!(record.timestamp, received());
    }

    #[test]
    fn short_body_is_rejected() {
        let err = decode_location(&[0u8; 27], received()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::BodyTooShort { len: 27, min: 28, .. }
        ));
    }

    #[test]
    fn parses_scalar_extensions() {
        let data = [
            0x01, 4, 0x00, 0x00, 0x30, 0x39, // mileage 12345 -> 1234.5 km
            0x30, 1, 0x1F, // csq 31
            0x31, 1, 0x09, // 9 satellites
            0x56, 2, 0x55, 0x00, // battery 85
            0x61, 2, 0x04, 0xD2, // 12.34 V
            0xF3, 1, 0x01, // fortified
        ];
        let ext = parse_extensions(&data);

        assert_eq!(
            ext,
            vec![
                Extension::Mileage { km: 1234.5 },
                Extension::SignalStrength { csq: 31 },
                Extension::Satellites { count: 9 },
                Extension::Battery { level: 85 },
                Extension::Voltage { volts: 12.34 },
                Extension::Fortified { armed: true },
            ]
        );
    }

    #[test]
    fn width_mismatch_and_unknown_ids_are_skipped() {
        let data = [
            0x01, 2, 0xAA, 0xBB, // mileage with wrong width
            0xE0, 3, 1, 2, 3, // unknown
            0x31, 1, 0x05,
        ];
        let ext = parse_extensions(&data);

        assert_eq!(
            ext,
            vec![
                Extension::Skipped { id: 0x01, len: 2 },
                Extension::Skipped { id: 0xE0, len: 3 },
                Extension::Satellites { count: 5 },
            ]
        );
    }

    #[test]
    fn overrunning_length_stops_scan() {
        let data = [0x31, 1, 0x07, 0x30, 9, 0x01];
        let ext = parse_extensions(&data);
        assert_eq!(ext, vec![Extension::Satellites { count: 7 }]);
    }

    #[test]
    fn parses_cell_and_wifi_lists() {
        let mut data = vec![0x53, 1 + 8, 1];
        data.extend_from_slice(&[0x01, 0xCC, 0x00, 0x25, 0x1C, 0x3A, 0x4B, 0x40]);
        data.extend_from_slice(&[0x5D, 1 + 10, 1]);
        data.extend_from_slice(&[0x01, 0xCC, 0x01, 0x25, 0x1C, 0x00, 0x0A, 0x3A, 0x4B, 0x38]);
        data.extend_from_slice(&[0x54, 1 + 7, 1]);
        data.extend_from_slice(&[0xA4, 0x5E, 0x60, 0x01, 0x02, 0xF3, 0xC8]);

        let ext = parse_extensions(&data);
        assert_eq!(ext.len(), 3);
        assert_eq!(
            ext[0],
            Extension::GsmCells {
                cells: vec![GsmCell {
                    mcc: 460,
                    mnc: 0,
                    lac: 0x251C,
                    cell_id: 0x3A4B,
                    signal: 0x40,
                }]
            }
        );
        assert_eq!(
            ext[1],
            Extension::LteCells {
                cells: vec![LteCell {
                    mcc: 460,
                    mnc: 1,
                    lac: 0x251C,
                    cell_id: 0x000A_3A4B,
                    signal: 0x38,
                }]
            }
        );
        assert_eq!(
            ext[2],
            Extension::Wifi {
                access_points: vec![WifiAccessPoint {
                    mac: "A4:5E:60:01:02:F3".to_string(),
                    signal: 0xC8,
                }]
            }
        );
    }

    #[test]
    fn cell_count_larger_than_value_yields_what_fits() {
        let data = [0x53, 9, 3, 0x01, 0xCC, 0x00, 0x00, 0x01, 0x00, 0x02, 0x10];
        let ext = parse_extensions(&data);
        assert!(matches!(&ext[0], Extension::GsmCells { cells } if cells.len() == 1));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(Extension::Battery { level: 40 }).unwrap();
        assert_eq!(json["kind"], "battery");
        assert_eq!(json["level"], 40);
    }
}
