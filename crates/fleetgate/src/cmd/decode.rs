use chrono::Utc;
use fleetgate_frame::{message_type_name, parse_packet, DELIMITER};
use fleetgate_protocol::{decode, reply_for, Message, DEFAULT_AUTH_TOKEN};
use serde::Serialize;

use crate::cmd::DecodeArgs;
use crate::exit::{decode_error, encode_error, frame_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_fields, print_json, print_pretty, OutputFormat};

#[derive(Serialize)]
struct DecodeOutput {
    message_type: String,
    message_name: &'static str,
    device_id: String,
    sequence: u16,
    body_len: usize,
    body: String,
    message: Message,
    /// Acknowledgement the gateway would send back.
    reply: Option<String>,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex)?;
    let out = decode_frame(&bytes)?;

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_fields(&rows(&out)),
        OutputFormat::Pretty => print_pretty(&rows(&out)),
    }
    Ok(SUCCESS)
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = hex::decode(&compact)
        .map_err(|err| CliError::new(USAGE, format!("invalid hex: {err}")))?;
    if bytes.is_empty() {
        return Err(CliError::new(USAGE, "frame must not be empty"));
    }
    Ok(bytes)
}

fn decode_frame(bytes: &[u8]) -> CliResult<DecodeOutput> {
    let inner = bytes.strip_prefix(&[DELIMITER]).unwrap_or(bytes);
    let inner = inner.strip_suffix(&[DELIMITER]).unwrap_or(inner);

    let packet = parse_packet(inner).map_err(|err| frame_error("malformed frame", err))?;
    let message =
        decode(&packet, Utc::now()).map_err(|err| decode_error("undecodable body", err))?;
    let reply = reply_for(&packet.header, &message, DEFAULT_AUTH_TOKEN)
        .map_err(|err| encode_error("reply encoding failed", err))?
        .map(hex::encode);

    Ok(DecodeOutput {
        message_type: format!("{:#06x}", packet.message_type()),
        message_name: message_type_name(packet.message_type()),
        device_id: packet.header.device_id.clone(),
        sequence: packet.header.sequence,
        body_len: packet.body.len(),
        body: hex::encode(&packet.body),
        message,
        reply,
    })
}

fn rows(out: &DecodeOutput) -> Vec<(&'static str, String)> {
    let mut rows = vec![
        (
            "message_type",
            format!("{} ({})", out.message_type, out.message_name),
        ),
        ("device_id", out.device_id.clone()),
        ("sequence", out.sequence.to_string()),
        ("body_len", out.body_len.to_string()),
    ];
    if let Some(position) = out.message.position() {
        rows.push(("timestamp", position.timestamp.to_rfc3339()));
        rows.push(("valid", position.valid.to_string()));
        rows.push(("latitude", format!("{:.6}", position.latitude)));
        rows.push(("longitude", format!("{:.6}", position.longitude)));
        if let Some(speed) = position.speed_kph {
            rows.push(("speed_kph", format!("{speed:.1}")));
        }
        for extension in &position.extensions {
            rows.push((
                "extension",
                serde_json::to_string(extension).unwrap_or_default(),
            ));
        }
    } else {
        rows.push((
            "message",
            serde_json::to_string(&out.message).unwrap_or_default(),
        ));
    }
    rows.push(("reply", out.reply.clone().unwrap_or_else(|| "-".to_string())));
    rows
}

#[cfg(test)]
mod tests {
    use fleetgate_frame::assemble;
    use fleetgate_frame::message_type::{TERMINAL_HEARTBEAT, LOCATION_REPORT};

    use super::*;
    use crate::exit::DATA_INVALID;

    fn location_body() -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&0u32.to_be_bytes());
        body.extend_from_slice(&0x0000_0006u32.to_be_bytes());
        body.extend_from_slice(&18_500_000u32.to_be_bytes());
        body.extend_from_slice(&69_000_000u32.to_be_bytes());
        body.extend_from_slice(&[0x00, 0x0A, 0x00, 0x7D, 0x00, 0xB4]);
        body.extend_from_slice(&[0x24, 0x01, 0x02, 0x03, 0x04, 0x05]);
        body
    }

    #[test]
    fn decodes_location_with_or_without_delimiters() {
        let frame = assemble(LOCATION_REPORT, "18404228323", 9, &location_body()).unwrap();
        for bytes in [&frame[..], &frame[1..frame.len() - 1]] {
            let out = decode_frame(bytes).unwrap();
            assert_eq!(out.message_type, "0x0200");
            assert_eq!(out.device_id, "18404228323");
            let position = out.message.position().unwrap();
            assert!((position.latitude - 18.5).abs() < 1e-9);
            assert!((position.longitude + 69.0).abs() < 1e-9);
            assert!(out.reply.is_some());
        }
    }

    #[test]
    fn hex_may_contain_spaces() {
        let frame = assemble(TERMINAL_HEARTBEAT, "1", 1, &[]).unwrap();
        let spaced = frame
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ");
        let out = decode_frame(&parse_hex(&spaced).unwrap()).unwrap();
        assert_eq!(out.message_name, "HEARTBEAT");
    }

    #[test]
    fn bad_checksum_is_data_invalid() {
        let mut frame = assemble(TERMINAL_HEARTBEAT, "1", 1, &[]).unwrap().to_vec();
        let last = frame.len() - 2;
        frame[last] ^= 0x01;
        let err = decode_frame(&frame).err().unwrap();
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn invalid_hex_is_usage() {
        assert_eq!(parse_hex("7e0g").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("  ").unwrap_err().code, USAGE);
    }
}
