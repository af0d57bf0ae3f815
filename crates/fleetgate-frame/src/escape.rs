//! Byte stuffing and the XOR checksum.
//!
//! Everything between the two `0x7E` delimiters is escaped:
//! `0x7E` becomes `0x7D 0x02` and `0x7D` becomes `0x7D 0x01`.

/// Frame delimiter.
pub const DELIMITER: u8 = 0x7E;

/// Escape marker.
pub const ESCAPE: u8 = 0x7D;

const ESCAPED_DELIMITER: u8 = 0x02;
const ESCAPED_ESCAPE: u8 = 0x01;

/// Expand every literal delimiter and escape byte into its two-byte form.
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 8);
    escape_into(data, &mut out);
    out
}

/// Same as [`escape`], appending to an existing buffer.
pub fn escape_into(data: &[u8], out: &mut Vec<u8>) {
    for &byte in data {
        match byte {
            DELIMITER => out.extend_from_slice(&[ESCAPE, ESCAPED_DELIMITER]),
            ESCAPE => out.extend_from_slice(&[ESCAPE, ESCAPED_ESCAPE]),
            other => out.push(other),
        }
    }
}

/// Collapse escape sequences back into their original bytes.
///
/// Lenient by policy: an escape byte followed by anything other than
/// `0x01`/`0x02` (or by nothing) is passed through as-is, because field
/// firmware has been seen emitting such sequences.
pub fn unescape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let byte = data[i];
        if byte == ESCAPE {
            match data.get(i + 1) {
                Some(&ESCAPED_DELIMITER) => {
                    out.push(DELIMITER);
                    i += 2;
                    continue;
                }
                Some(&ESCAPED_ESCAPE) => {
                    out.push(ESCAPE);
                    i += 2;
                    continue;
                }
                _ => {}
            }
        }
        out.push(byte);
        i += 1;
    }
    out
}

/// XOR of all bytes.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Check that the last byte is the XOR of all preceding bytes.
///
/// Fails closed: anything shorter than two bytes is invalid.
pub fn verify_checksum(data: &[u8]) -> bool {
    match data.split_last() {
        Some((&last, rest)) if !rest.is_empty() => checksum(rest) == last,
        _ => false,
    }
}
