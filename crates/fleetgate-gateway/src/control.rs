use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fleetgate_protocol::{encode, GpsCommand};
use fleetgate_transport::ControlSocket;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::UnixStream;
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, Result};
use crate::registry::{ConnectionRegistry, SessionInfo};

/// Longest accepted control line.
pub const MAX_CONTROL_LINE: usize = 64 * 1024;

/// One control-plane request (a single JSON line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlRequest {
    /// Send a named command to a device.
    Send { serial: String, command: GpsCommand },
    /// Send a pre-framed message given as hex.
    SendRaw { serial: String, frame_hex: String },
    /// Connection state of one device.
    Status { serial: String },
    /// Aggregate connection count and session list.
    Stats,
}

/// Reply to a [`ControlRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_devices: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<SessionInfo>>,
}

impl ControlResponse {
    fn new(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            message: message.into(),
            timestamp: Utc::now(),
            serial: None,
            connected: None,
            last_activity: None,
            connected_devices: None,
            sessions: None,
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(true, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(false, message)
    }

    fn for_serial(mut self, serial: &str) -> Self {
        self.serial = Some(serial.to_string());
        self
    }
}

/// Execute one request against the registry.
pub async fn handle_request(registry: &ConnectionRegistry, request: ControlRequest) -> ControlResponse {
    match request {
        ControlRequest::Send { serial, command } => {
            let frame = match encode(&serial, &command.to_command()) {
                Ok(frame) => frame,
                Err(err) => return ControlResponse::error(err.to_string()).for_serial(&serial),
            };
            deliver(registry, &serial, &frame, &command.to_string()).await
        }
        ControlRequest::SendRaw { serial, frame_hex } => {
            let frame = match hex::decode(frame_hex.trim()) {
                Ok(frame) if !frame.is_empty() => frame,
                Ok(_) => return ControlResponse::error("frame_hex is empty").for_serial(&serial),
                Err(err) => {
                    return ControlResponse::error(format!("invalid frame_hex: {err}"))
                        .for_serial(&serial)
                }
            };
            deliver(registry, &serial, &frame, "raw frame").await
        }
        ControlRequest::Status { serial } => {
            let status = registry.status(&serial).await;
            let message = if status.connected {
                "device connected"
            } else {
                "device not connected"
            };
            let mut response = ControlResponse::ok(message).for_serial(&serial);
            response.connected = Some(status.connected);
            response.last_activity = status.last_activity;
            response.timestamp = status.checked_at;
            response
        }
        ControlRequest::Stats => {
            let sessions = registry.snapshot().await;
            let mut response = ControlResponse::ok(format!("{} device(s) connected", sessions.len()));
            response.connected_devices = Some(sessions.len());
            response.sessions = Some(sessions);
            response
        }
    }
}

async fn deliver(
    registry: &ConnectionRegistry,
    serial: &str,
    frame: &[u8],
    what: &str,
) -> ControlResponse {
    if registry.send(serial, frame).await {
        info!(serial, command = what, "command sent");
        let mut response = ControlResponse::ok(format!("{what} sent")).for_serial(serial);
        response.connected = Some(true);
        response
    } else {
        info!(serial, command = what, "command not delivered");
        let mut response =
            ControlResponse::error("device not connected or write failed").for_serial(serial);
        response.connected = Some(false);
        response
    }
}

/// Serve control connections until `shutdown` is cancelled.
pub async fn serve_control(
    socket: ControlSocket,
    registry: Arc<ConnectionRegistry>,
    shutdown: CancellationToken,
) -> Result<()> {
    loop {
        let stream = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = socket.accept() => accepted,
        };

        match stream {
            Ok(stream) => {
                let registry = registry.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, registry, shutdown).await {
                        debug!(error = %err, "control connection ended with error");
                    }
                });
            }
            Err(err) => warn!(error = %err, "control accept failed"),
        }
    }

    info!(path = ?socket.path(), "control socket closed");
    Ok(())
}

async fn handle_connection(
    stream: UnixStream,
    registry: Arc<ConnectionRegistry>,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut lines = Framed::new(stream, LinesCodec::new_with_max_length(MAX_CONTROL_LINE));

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next() => line,
        };
        let Some(line) = line else { break };
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<ControlRequest>(&line) {
            Ok(request) => {
                debug!(?request, "control request");
                handle_request(&registry, request).await
            }
            Err(err) => ControlResponse::error(format!("invalid request: {err}")),
        };
        lines.send(serde_json::to_string(&response)?).await?;
    }

    Ok(())
}

/// Send one request to a running gateway and wait for its reply.
pub async fn request(path: impl AsRef<Path>, request: &ControlRequest) -> Result<ControlResponse> {
    let stream = ControlSocket::connect(path).await?;
    let mut lines = Framed::new(stream, LinesCodec::new_with_max_length(MAX_CONTROL_LINE));

    lines.send(serde_json::to_string(request)?).await?;
    let line = lines.next().await.ok_or(GatewayError::NoResponse)??;
    Ok(serde_json::from_str(&line)?)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use fleetgate_frame::message_type::TERMINAL_CONTROL;
    use fleetgate_frame::parse_packet;

    use super::*;
    use crate::testing::MockTransport;

    fn sock_path(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fleetgate-ctl-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("control.sock")
    }

    #[test]
    fn parses_requests() {
        let send: ControlRequest =
            serde_json::from_str(r#"{"op":"send","serial":"123","command":"cut-fuel"}"#).unwrap();
        assert_eq!(
            send,
            ControlRequest::Send {
                serial: "123".to_string(),
                command: GpsCommand::CutFuel,
            }
        );

        let stats: ControlRequest = serde_json::from_str(r#"{"op":"stats"}"#).unwrap();
        assert_eq!(stats, ControlRequest::Stats);

        let raw: ControlRequest =
            serde_json::from_str(r#"{"op":"send_raw","serial":"1","frame_hex":"7e00"}"#).unwrap();
        assert!(matches!(raw, ControlRequest::SendRaw { .. }));

        assert!(serde_json::from_str::<ControlRequest>(r#"{"op":"launch"}"#).is_err());
        assert!(
            serde_json::from_str::<ControlRequest>(r#"{"op":"send","serial":"1","command":"x"}"#)
                .is_err()
        );
    }

    #[tokio::test]
    async fn send_to_connected_device() {
        let registry = ConnectionRegistry::new();
        let t = MockTransport::new("a");
        registry.register("18404228323", t.clone()).await;

        let response = handle_request(
            &registry,
            ControlRequest::Send {
                serial: "18404228323".to_string(),
                command: GpsCommand::CutFuel,
            },
        )
        .await;

        assert!(response.success);
        let sent = t.sent();
        let packet = parse_packet(&sent[0][1..sent[0].len() - 1]).unwrap();
        assert_eq!(packet.message_type(), TERMINAL_CONTROL);
        assert_eq!(packet.body.as_ref(), &[0x64]);
    }

    #[tokio::test]
    async fn send_to_unknown_device_fails() {
        let registry = ConnectionRegistry::new();
        let response = handle_request(
            &registry,
            ControlRequest::Send {
                serial: "42".to_string(),
                command: GpsCommand::Restart,
            },
        )
        .await;

        assert!(!response.success);
        assert_eq!(response.connected, Some(false));
    }

    #[tokio::test]
    async fn send_raw_validates_hex() {
        let registry = ConnectionRegistry::new();
        let t = MockTransport::new("a");
        registry.register("1", t.clone()).await;

        let bad = handle_request(
            &registry,
            ControlRequest::SendRaw {
                serial: "1".to_string(),
                frame_hex: "zz".to_string(),
            },
        )
        .await;
        assert!(!bad.success);

        let good = handle_request(
            &registry,
            ControlRequest::SendRaw {
                serial: "1".to_string(),
                frame_hex: "7e0102037e".to_string(),
            },
        )
        .await;
        assert!(good.success);
        assert_eq!(t.sent(), vec![vec![0x7e, 0x01, 0x02, 0x03, 0x7e]]);
    }

    #[tokio::test]
    async fn status_and_stats() {
        let registry = ConnectionRegistry::new();
        registry.register("7", MockTransport::new("a")).await;

        let status = handle_request(&registry, ControlRequest::Status { serial: "7".to_string() }).await;
        assert_eq!(status.connected, Some(true));
        assert!(status.last_activity.is_some());

        let stats = handle_request(&registry, ControlRequest::Stats).await;
        assert_eq!(stats.connected_devices, Some(1));
        assert_eq!(stats.sessions.unwrap()[0].serial_number, "7");
    }

    #[tokio::test]
    async fn round_trip_over_socket() {
        let path = sock_path("rt");
        let socket = ControlSocket::bind(&path).unwrap();
        let registry = Arc::new(ConnectionRegistry::new());
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve_control(socket, registry, shutdown.clone()));

        let response = request(&path, &ControlRequest::Stats).await.unwrap();
        assert!(response.success);
        assert_eq!(response.connected_devices, Some(0));

        let status = request(&path, &ControlRequest::Status { serial: "9".to_string() })
            .await
            .unwrap();
        assert_eq!(status.connected, Some(false));

        shutdown.cancel();
        server.await.unwrap().unwrap();
        assert!(!path.exists());
    }
}
