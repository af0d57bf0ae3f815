use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fleetgate_frame::Jt808Codec;
use fleetgate_transport::{DeviceTransport, TcpGatewaySocket};
use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::task::JoinSet;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::error::Result;
use crate::registry::ConnectionRegistry;
use crate::session::SessionHandler;
use crate::sink::TelemetrySink;

/// How long shutdown waits for connection tasks after closing sessions.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
/// Pause after a failed accept (e.g. fd exhaustion) before retrying.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Per-connection settings shared by every session.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub read_idle_timeout: Duration,
    pub max_frame_len: usize,
    pub auth_token: String,
}

impl From<&GatewayConfig> for ConnectionSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            read_idle_timeout: config.read_idle_timeout(),
            max_frame_len: config.max_frame_len,
            auth_token: config.auth_token.clone(),
        }
    }
}

/// Accepts device connections and runs one session task per connection.
pub struct GatewayListener {
    socket: TcpGatewaySocket,
    registry: Arc<ConnectionRegistry>,
    sink: Arc<dyn TelemetrySink>,
    settings: ConnectionSettings,
}

impl GatewayListener {
    /// Bind the device listen address from `config`.
    pub async fn bind(
        config: &GatewayConfig,
        registry: Arc<ConnectionRegistry>,
        sink: Arc<dyn TelemetrySink>,
    ) -> Result<Self> {
        let socket = TcpGatewaySocket::bind(&config.listen)
            .await?
            .with_write_timeout(config.write_timeout());
        Ok(Self {
            socket,
            registry,
            sink,
            settings: ConnectionSettings::from(config),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    /// Accept until `shutdown` is cancelled, then close every session.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let mut tasks = JoinSet::new();

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.socket.accept() => accepted,
            };

            match accepted {
                Ok((reader, transport)) => {
                    let cancel = transport.cancel_token();
                    let transport: Arc<dyn DeviceTransport> = transport;
                    tasks.spawn(run_connection(
                        reader,
                        transport,
                        cancel,
                        self.registry.clone(),
                        self.sink.clone(),
                        self.settings.clone(),
                    ));
                }
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }

            // Reap finished connection tasks.
            while tasks.try_join_next().is_some() {}
        }

        info!("shutting down device listener");
        self.registry.close_all().await;
        if tokio::time::timeout(DRAIN_TIMEOUT, async {
            while tasks.join_next().await.is_some() {}
        })
        .await
        .is_err()
        {
            warn!(remaining = tasks.len(), "connection tasks still running; aborting");
            tasks.abort_all();
        }
        Ok(())
    }
}

/// Drive one device connection until it closes, idles out or is cancelled.
///
/// Generic over the reader so that tests can use in-memory streams.
pub async fn run_connection<R>(
    reader: R,
    transport: Arc<dyn DeviceTransport>,
    cancel: CancellationToken,
    registry: Arc<ConnectionRegistry>,
    sink: Arc<dyn TelemetrySink>,
    settings: ConnectionSettings,
) where
    R: AsyncRead + Unpin + Send,
{
    let peer = transport.peer();
    let mut frames = FramedRead::new(reader, Jt808Codec::with_max_frame_len(settings.max_frame_len));
    let mut session = SessionHandler::new(registry, sink, transport, settings.auth_token);
    info!(%peer, "device connected");

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(%peer, "connection cancelled");
                break;
            }
            next = tokio::time::timeout(settings.read_idle_timeout, frames.next()) => next,
        };

        match next {
            Err(_) => {
                info!(%peer, serial = session.serial(), "read idle timeout");
                break;
            }
            Ok(None) => {
                debug!(%peer, "peer closed connection");
                break;
            }
            Ok(Some(Err(err))) => {
                debug!(%peer, error = %err, "read failed");
                break;
            }
            Ok(Some(Ok(raw))) => {
                if let Err(err) = session.handle_frame(&raw).await {
                    warn!(%peer, serial = session.serial(), error = %err, "ack write failed; ending session");
                    break;
                }
            }
        }
    }

    session.finish().await;
    info!(%peer, "device disconnected");
}
