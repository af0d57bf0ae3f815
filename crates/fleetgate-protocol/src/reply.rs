use bytes::{BufMut, Bytes, BytesMut};
use fleetgate_frame::message_type::{PLATFORM_GENERAL_RESPONSE, PLATFORM_REGISTRATION_RESPONSE};
use fleetgate_frame::{assemble, Header};

use crate::error::EncodeError;
use crate::message::Message;

/// Header sequence used on every platform reply.
pub const REPLY_SEQUENCE: u16 = 0;

/// Default token returned in registration acks.
pub const DEFAULT_AUTH_TOKEN: &str = "OK";

/// Result codes carried in platform acks.
pub mod result {
    pub const SUCCESS: u8 = 0;
    pub const FAILURE: u8 = 1;
    pub const MALFORMED: u8 = 2;
    pub const UNSUPPORTED: u8 = 3;
}

/// Platform general response (0x8001).
///
/// Body: echoed sequence (2) + echoed message type (2) + result (1).
pub fn general_ack(
    device_id: &str,
    sequence: u16,
    message_type: u16,
    result: u8,
) -> Result<Bytes, EncodeError> {
    let mut body = BytesMut::with_capacity(5);
    body.put_u16(sequence);
    body.put_u16(message_type);
    body.put_u8(result);
    Ok(assemble(PLATFORM_GENERAL_RESPONSE, device_id, REPLY_SEQUENCE, &body)?)
}

/// Platform registration response (0x8100).
///
/// Body: echoed sequence (2) + result (1) + auth token (ASCII).
pub fn registration_ack(
    device_id: &str,
    sequence: u16,
    result: u8,
    auth_token: &str,
) -> Result<Bytes, EncodeError> {
    let mut body = BytesMut::with_capacity(3 + auth_token.len());
    body.put_u16(sequence);
    body.put_u8(result);
    body.put_slice(auth_token.as_bytes());
    Ok(assemble(PLATFORM_REGISTRATION_RESPONSE, device_id, REPLY_SEQUENCE, &body)?)
}

/// The acknowledgement owed for a decoded message, if any.
///
/// Terminal general responses and unrecognised types are not acked.
pub fn reply_for(
    header: &Header,
    message: &Message,
    auth_token: &str,
) -> Result<Option<Bytes>, EncodeError> {
    let frame = match message {
        Message::Registration(_) => {
            registration_ack(&header.device_id, header.sequence, result::SUCCESS, auth_token)?
        }
        Message::TerminalResponse(_) | Message::Unknown { .. } => return Ok(None),
        _ => general_ack(
            &header.device_id,
            header.sequence,
            header.message_type,
            result::SUCCESS,
        )?,
    };
    Ok(Some(frame))
}

#[cfg(test)]
mod tests {
    use fleetgate_frame::message_type::{
        LOCATION_REPORT, TERMINAL_GENERAL_RESPONSE, TERMINAL_HEARTBEAT,
    };
    use fleetgate_frame::parse_packet;

    use super::*;

    fn inner(frame: &Bytes) -> &[u8] {
        &frame[1..frame.len() - 1]
    }

    fn header(message_type: u16, sequence: u16) -> Header {
        Header {
            message_type,
            attributes: 0,
            device_id: "18404228323".to_string(),
            sequence,
        }
    }

    #[test]
    fn general_ack_layout() {
        let frame = general_ack("18404228323", 0x002A, LOCATION_REPORT, result::SUCCESS).unwrap();
        let packet = parse_packet(inner(&frame)).unwrap();

        assert_eq!(packet.message_type(), PLATFORM_GENERAL_RESPONSE);
        assert_eq!(packet.header.sequence, REPLY_SEQUENCE);
        assert_eq!(packet.device_id(), "18404228323");
        assert_eq!(packet.body.as_ref(), &[0x00, 0x2A, 0x02, 0x00, 0x00]);
    }

    #[test]
    fn registration_ack_layout() {
        let frame = registration_ack("123", 0x0102, result::SUCCESS, DEFAULT_AUTH_TOKEN).unwrap();
        let packet = parse_packet(inner(&frame)).unwrap();

        assert_eq!(packet.message_type(), PLATFORM_REGISTRATION_RESPONSE);
        assert_eq!(packet.body.as_ref(), &[0x01, 0x02, 0x00, b'O', b'K']);
    }

    #[test]
    fn reply_for_heartbeat_echoes_type() {
        let frame = reply_for(&header(TERMINAL_HEARTBEAT, 9), &Message::Heartbeat, "OK")
            .unwrap()
            .unwrap();
        let packet = parse_packet(inner(&frame)).unwrap();
        assert_eq!(packet.body.as_ref(), &[0x00, 0x09, 0x00, 0x02, 0x00]);
    }

    #[test]
    fn no_reply_for_unknown_or_terminal_response() {
        let unknown = Message::Unknown {
            message_type: 0x0F0F,
        };
        assert!(reply_for(&header(0x0F0F, 1), &unknown, "OK")
            .unwrap()
            .is_none());

        let response = Message::TerminalResponse(None);
        assert!(reply_for(&header(TERMINAL_GENERAL_RESPONSE, 1), &response, "OK")
            .unwrap()
            .is_none());
    }
}
