use std::sync::Arc;

use chrono::Utc;
use fleetgate_frame::{message_type_name, parse_packet};
use fleetgate_protocol::{decode, reply_for, Message};
use fleetgate_transport::DeviceTransport;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::registry::ConnectionRegistry;
use crate::sink::TelemetrySink;

/// Identification state of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No valid frame seen yet.
    Unidentified,
    /// Bound to a serial number in the registry.
    Identified(String),
}

/// What happened to one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Malformed; nothing was written or registered.
    Dropped,
    /// Decoded and processed.
    Handled {
        message_type: u16,
        acked: bool,
        position: bool,
    },
}

/// Per-connection frame handler.
///
/// Frames are processed strictly in order: parse, decode, write the ack,
/// register, then emit telemetry.
pub struct SessionHandler {
    registry: Arc<ConnectionRegistry>,
    sink: Arc<dyn TelemetrySink>,
    transport: Arc<dyn DeviceTransport>,
    auth_token: String,
    state: SessionState,
}

impl SessionHandler {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        sink: Arc<dyn TelemetrySink>,
        transport: Arc<dyn DeviceTransport>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            sink,
            transport,
            auth_token: auth_token.into(),
            state: SessionState::Unidentified,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Serial number once identified.
    pub fn serial(&self) -> Option<&str> {
        match &self.state {
            SessionState::Identified(serial) => Some(serial),
            SessionState::Unidentified => None,
        }
    }

    /// Process one raw frame (the escaped bytes between delimiters).
    ///
    /// An `Err` means the ack could not be written and the session must end.
    pub async fn handle_frame(&mut self, raw: &[u8]) -> Result<FrameOutcome> {
        let peer = self.transport.peer();
        let packet = match parse_packet(raw) {
            Ok(packet) => packet,
            Err(err) => {
                debug!(%peer, error = %err, "dropping malformed frame");
                return Ok(FrameOutcome::Dropped);
            }
        };

        let message_type = packet.message_type();
        let message = match decode(&packet, Utc::now()) {
            Ok(message) => message,
            Err(err) => {
                debug!(
                    %peer,
                    serial = packet.device_id(),
                    error = %err,
                    "dropping undecodable frame"
                );
                return Ok(FrameOutcome::Dropped);
            }
        };

        let reply = match reply_for(&packet.header, &message, &self.auth_token) {
            Ok(reply) => reply,
            Err(err) => {
                warn!(%peer, error = %err, "could not build acknowledgement");
                None
            }
        };
        let acked = reply.is_some();
        if let Some(reply) = reply {
            self.transport.send(&reply).await?;
        }

        log_message(packet.device_id(), &message);
        self.identify(packet.device_id()).await;

        let position = match (message.into_position(), self.serial()) {
            (Some(record), Some(serial)) => {
                self.sink.emit(serial, record).await;
                true
            }
            _ => false,
        };

        Ok(FrameOutcome::Handled {
            message_type,
            acked,
            position,
        })
    }

    /// Release the registry entry (if still ours) and close the transport.
    pub async fn finish(&mut self) {
        if let SessionState::Identified(serial) = &self.state {
            self.registry.release(serial, &self.transport);
        }
        self.state = SessionState::Unidentified;
        self.transport.close().await;
    }

    async fn identify(&mut self, serial: &str) {
        if serial.is_empty() {
            warn!(peer = %self.transport.peer(), "frame with all-zero device id; not registering");
            return;
        }

        if let SessionState::Identified(current) = &self.state {
            if current != serial {
                warn!(
                    peer = %self.transport.peer(),
                    old = %current,
                    new = serial,
                    "device id changed on open connection; rebinding"
                );
                self.registry.release(current, &self.transport);
            }
        }

        self.registry.register(serial, self.transport.clone()).await;
        self.state = SessionState::Identified(serial.to_string());
    }
}

fn log_message(serial: &str, message: &Message) {
    match message {
        Message::Registration(info) => info!(
            serial,
            model = %info.model,
            terminal_id = %info.terminal_id,
            plate = %info.plate,
            "terminal registration"
        ),
        Message::Authentication { .. } => info!(serial, "terminal authenticated"),
        Message::TerminalResponse(Some(resp)) => info!(
            serial,
            response_to = message_type_name(resp.response_type),
            response_sequence = resp.response_sequence,
            result = resp.result,
            "terminal answered command"
        ),
        Message::TextSubmit { text, .. } => info!(serial, %text, "terminal text"),
        Message::Unknown { message_type } => debug!(
            serial,
            message_type = %format!("{message_type:#06x}"),
            "unrecognised message type"
        ),
        other => debug!(serial, ?other, "message"),
    }
}

#[cfg(test)]
mod tests {
    use fleetgate_frame::message_type::{
        LOCATION_REPORT, PLATFORM_GENERAL_RESPONSE, PLATFORM_REGISTRATION_RESPONSE,
        TERMINAL_HEARTBEAT, TERMINAL_REGISTRATION,
    };
    use fleetgate_frame::{assemble, unescape};
    use tokio::sync::mpsc;

    use super::*;
    use crate::sink::{ChannelSink, Telemetry};
    use crate::testing::MockTransport;

    struct Fixture {
        registry: Arc<ConnectionRegistry>,
        transport: Arc<MockTransport>,
        handler: SessionHandler,
        rx: mpsc::Receiver<Telemetry>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(ConnectionRegistry::new());
        let transport = MockTransport::new("10.0.0.1:5000");
        let (sink, rx) = ChannelSink::new(8);
        let handler = SessionHandler::new(registry.clone(), Arc::new(sink), transport.clone(), "OK");
        Fixture {
            registry,
            transport,
            handler,
            rx,
        }
    }

    /// Escaped bytes between the delimiters.
    fn raw(message_type: u16, serial: &str, sequence: u16, body: &[u8]) -> Vec<u8> {
        let frame = assemble(message_type, serial, sequence, body).unwrap();
        frame[1..frame.len() - 1].to_vec()
    }

    fn location_body() -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&0u32.to_be_bytes());
        body.extend_from_slice(&0x02u32.to_be_bytes());
        body.extend_from_slice(&18_500_000i32.to_be_bytes());
        body.extend_from_slice(&(-69_000_000i32).to_be_bytes());
        body.extend_from_slice(&[0x00, 0x32, 0x01, 0xF4, 0x00, 0x5A]);
        body.extend_from_slice(&[0x24, 0x03, 0x15, 0x10, 0x30, 0x45]);
        body
    }

    #[tokio::test]
    async fn location_frame_end_to_end() {
        let mut fx = fixture();
        let frame = raw(LOCATION_REPORT, "18404228323", 0x0042, &location_body());
        assert_eq!(unescape(&frame).len(), 41);

        let outcome = fx.handler.handle_frame(&frame).await.unwrap();
        assert_eq!(
            outcome,
            FrameOutcome::Handled {
                message_type: LOCATION_REPORT,
                acked: true,
                position: true,
            }
        );

        let sent = fx.transport.sent();
        assert_eq!(sent.len(), 1);
        let ack = parse_packet(&sent[0][1..sent[0].len() - 1]).unwrap();
        assert_eq!(ack.message_type(), PLATFORM_GENERAL_RESPONSE);
        assert_eq!(ack.body.as_ref(), &[0x00, 0x42, 0x02, 0x00, 0x00]);

        let telemetry = fx.rx.try_recv().unwrap();
        assert_eq!(telemetry.serial_number, "18404228323");
        assert!(telemetry.record.valid);
        assert_eq!(telemetry.record.latitude, 18.5);
        assert_eq!(telemetry.record.longitude, -69.0);
        assert!(fx.rx.try_recv().is_err());

        assert_eq!(fx.handler.serial(), Some("18404228323"));
        assert!(fx.registry.is_connected("18404228323").await);
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped_silently() {
        let mut fx = fixture();
        let mut frame = raw(TERMINAL_HEARTBEAT, "123", 1, &[]);
        let last = frame.len() - 1;
        frame[last] ^= 0x01;

        let outcome = fx.handler.handle_frame(&frame).await.unwrap();
        assert_eq!(outcome, FrameOutcome::Dropped);
        assert!(fx.transport.sent().is_empty());
        assert_eq!(fx.handler.state(), &SessionState::Unidentified);
        assert_eq!(fx.registry.count().await, 0);
    }

    #[tokio::test]
    async fn short_location_is_not_acked_or_registered() {
        let mut fx = fixture();
        let frame = raw(LOCATION_REPORT, "123", 1, &[0u8; 10]);

        let outcome = fx.handler.handle_frame(&frame).await.unwrap();
        assert_eq!(outcome, FrameOutcome::Dropped);
        assert!(fx.transport.sent().is_empty());
        assert_eq!(fx.registry.count().await, 0);
    }

    #[tokio::test]
    async fn unknown_type_registers_without_ack() {
        let mut fx = fixture();
        let frame = raw(0x0F0F, "555", 3, &[1, 2, 3]);

        let outcome = fx.handler.handle_frame(&frame).await.unwrap();
        assert_eq!(
            outcome,
            FrameOutcome::Handled {
                message_type: 0x0F0F,
                acked: false,
                position: false,
            }
        );
        assert!(fx.transport.sent().is_empty());
        assert!(fx.registry.is_connected("555").await);
        assert!(fx.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn registration_gets_registration_ack() {
        let mut fx = fixture();
        let frame = raw(TERMINAL_REGISTRATION, "123", 0x0101, &[0u8; 40]);

        fx.handler.handle_frame(&frame).await.unwrap();
        let sent = fx.transport.sent();
        let ack = parse_packet(&sent[0][1..sent[0].len() - 1]).unwrap();
        assert_eq!(ack.message_type(), PLATFORM_REGISTRATION_RESPONSE);
        assert_eq!(ack.body.as_ref(), &[0x01, 0x01, 0x00, b'O', b'K']);
    }

    #[tokio::test]
    async fn failed_ack_write_ends_session() {
        let mut fx = fixture();
        fx.handler
            .handle_frame(&raw(TERMINAL_HEARTBEAT, "123", 1, &[]))
            .await
            .unwrap();
        assert!(fx.registry.is_connected("123").await);

        fx.transport.fail_writes();
        let result = fx.handler.handle_frame(&raw(TERMINAL_HEARTBEAT, "123", 2, &[])).await;
        assert!(result.is_err());

        fx.handler.finish().await;
        assert!(!fx.registry.is_connected("123").await);
        assert_eq!(fx.transport.close_count(), 1);
    }

    #[tokio::test]
    async fn changed_device_id_rebinds() {
        let mut fx = fixture();
        fx.handler
            .handle_frame(&raw(TERMINAL_HEARTBEAT, "111", 1, &[]))
            .await
            .unwrap();
        fx.handler
            .handle_frame(&raw(TERMINAL_HEARTBEAT, "222", 2, &[]))
            .await
            .unwrap();

        assert_eq!(fx.handler.serial(), Some("222"));
        assert!(!fx.registry.is_connected("111").await);
        assert!(fx.registry.is_connected("222").await);
        assert_eq!(fx.transport.close_count(), 0);
    }

    #[tokio::test]
    async fn all_zero_device_id_is_acked_but_not_registered() {
        let mut fx = fixture();
        let outcome = fx
            .handler
            .handle_frame(&raw(TERMINAL_HEARTBEAT, "0", 1, &[]))
            .await
            .unwrap();

        assert!(matches!(outcome, FrameOutcome::Handled { acked: true, .. }));
        assert_eq!(fx.handler.state(), &SessionState::Unidentified);
        assert_eq!(fx.registry.count().await, 0);
    }

    #[tokio::test]
    async fn finish_does_not_evict_replacement() {
        let mut fx = fixture();
        fx.handler
            .handle_frame(&raw(TERMINAL_HEARTBEAT, "123", 1, &[]))
            .await
            .unwrap();

        let replacement = MockTransport::new("10.0.0.2:6000");
        fx.registry.register("123", replacement.clone()).await;
        fx.handler.finish().await;

        assert!(fx.registry.is_connected("123").await);
        assert!(fx.registry.send("123", b"cmd").await);
        assert_eq!(replacement.sent().len(), 1);
    }
}
