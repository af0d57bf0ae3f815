//! Binary-coded decimal fields: the 6-byte device id and the 6-byte
//! `YYMMDDHHMMSS` timestamp.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{FrameError, Result};

/// Size of the BCD device id in the header.
pub const DEVICE_ID_LEN: usize = 6;

/// Number of decimal digits a device id expands to.
pub const DEVICE_ID_DIGITS: usize = DEVICE_ID_LEN * 2;

/// Size of a BCD timestamp.
pub const BCD_TIME_LEN: usize = 6;

/// Decode one BCD byte into its two-digit value.
pub fn bcd_to_dec(byte: u8) -> Option<u8> {
    let high = byte >> 4;
    let low = byte & 0x0F;
    if high > 9 || low > 9 {
        return None;
    }
    Some(high * 10 + low)
}

/// Encode a value in `0..=99` as one BCD byte.
pub fn dec_to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// Expand 6 BCD bytes into the normalized device id.
///
/// Leading zeros are stripped, so `01 84 04 22 83 23` becomes
/// `"18404228323"`.
pub fn device_id_from_bcd(bytes: &[u8; DEVICE_ID_LEN]) -> Result<String> {
    let mut digits = String::with_capacity(DEVICE_ID_DIGITS);
    for &byte in bytes {
        let value = bcd_to_dec(byte).ok_or(FrameError::InvalidBcd(byte))?;
        digits.push(char::from(b'0' + value / 10));
        digits.push(char::from(b'0' + value % 10));
    }
    Ok(digits.trim_start_matches('0').to_string())
}

/// Pack a device id back into 6 BCD bytes, left-padding with zeros.
///
/// Exact inverse of [`device_id_from_bcd`].
pub fn device_id_to_bcd(device_id: &str) -> Result<[u8; DEVICE_ID_LEN]> {
    let id = device_id.trim();
    if id.len() > DEVICE_ID_DIGITS || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FrameError::InvalidDeviceId(device_id.to_string()));
    }

    let padded = format!("{:0>width$}", id, width = DEVICE_ID_DIGITS);
    let digits = padded.as_bytes();
    let mut out = [0u8; DEVICE_ID_LEN];
    for (i, slot) in out.iter_mut().enumerate() {
        let high = digits[i * 2] - b'0';
        let low = digits[i * 2 + 1] - b'0';
        *slot = (high << 4) | low;
    }
    Ok(out)
}

/// Parse a `YYMMDDHHMMSS` BCD timestamp (years are 2000-based, UTC).
///
/// Returns `None` when any byte is not valid BCD or the date does not exist.
pub fn parse_bcd_datetime(bytes: &[u8]) -> Option<DateTime<Utc>> {
    if bytes.len() < BCD_TIME_LEN {
        return None;
    }
    let mut fields = [0u32; BCD_TIME_LEN];
    for (slot, &byte) in fields.iter_mut().zip(bytes) {
        *slot = u32::from(bcd_to_dec(byte)?);
    }
    let [year, month, day, hour, minute, second] = fields;
    NaiveDate::from_ymd_opt(2000 + year as i32, month, day)?
        .and_hms_opt(hour, minute, second)
        .map(|naive| naive.and_utc())
}

/// Encode a UTC timestamp as `YYMMDDHHMMSS` BCD.
pub fn encode_bcd_datetime(at: &DateTime<Utc>) -> [u8; BCD_TIME_LEN] {
    use chrono::{Datelike, Timelike};

    let year = at.year().rem_euclid(100) as u8;
    [
        dec_to_bcd(year),
        dec_to_bcd(at.month() as u8),
        dec_to_bcd(at.day() as u8),
        dec_to_bcd(at.hour() as u8),
        dec_to_bcd(at.minute() as u8),
        dec_to_bcd(at.second() as u8),
    ]
}
