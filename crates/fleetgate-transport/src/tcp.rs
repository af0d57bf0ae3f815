use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::DeviceTransport;

/// Default bound on a single device write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Write half of a device connection.
///
/// Closing cancels [`cancel_token`](Self::cancel_token), which the owning
/// read loop watches to stop reading.
pub struct StreamTransport<W> {
    id: u64,
    peer: String,
    writer: Mutex<Option<W>>,
    connected: AtomicBool,
    cancel: CancellationToken,
    write_timeout: Duration,
}

/// TCP device connection.
pub type TcpDeviceTransport = StreamTransport<OwnedWriteHalf>;

impl<W> StreamTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(id: u64, peer: impl Into<String>, writer: W) -> Self {
        Self {
            id,
            peer: peer.into(),
            writer: Mutex::new(Some(writer)),
            connected: AtomicBool::new(true),
            cancel: CancellationToken::new(),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Connection id, unique within one listener.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Token cancelled when this transport is closed or fails.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Mark the transport dead without touching the writer.
    ///
    /// Used by the read loop when the peer hangs up.
    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
        self.cancel.cancel();
    }
}

impl<W> std::fmt::Debug for StreamTransport<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("connected", &self.connected.load(Ordering::Acquire))
            .finish()
    }
}

#[async_trait]
impl<W> DeviceTransport for StreamTransport<W>
where
    W: AsyncWrite + Unpin + Send + Sync,
{
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.cancel.is_cancelled()
    }

    async fn send(&self, data: &[u8]) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::Closed)?;

        let write = async {
            writer.write_all(data).await?;
            writer.flush().await
        };
        let outcome = match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(TransportError::Io(err)),
            Err(_) => Err(TransportError::Timeout(self.write_timeout)),
        };

        if let Err(err) = &outcome {
            warn!(id = self.id, peer = %self.peer, error = %err, "device write failed");
            guard.take();
            self.mark_disconnected();
        }
        outcome
    }

    async fn close(&self) {
        self.mark_disconnected();
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(err) = writer.shutdown().await {
                debug!(id = self.id, peer = %self.peer, error = %err, "shutdown after close failed");
            }
            debug!(id = self.id, peer = %self.peer, "transport closed");
        }
    }

    fn peer(&self) -> String {
        self.peer.clone()
    }
}

/// TCP listener handing out (read half, transport) pairs.
pub struct TcpGatewaySocket {
    listener: TcpListener,
    local_addr: SocketAddr,
    next_id: AtomicU64,
    write_timeout: Duration,
}

impl TcpGatewaySocket {
    /// Bind and listen on `addr` (e.g. `0.0.0.0:7053`).
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        info!(%local_addr, "listening for devices");

        Ok(Self {
            listener,
            local_addr,
            next_id: AtomicU64::new(1),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        })
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Accept the next device connection.
    pub async fn accept(&self) -> Result<(OwnedReadHalf, Arc<TcpDeviceTransport>)> {
        let (stream, peer) = self.listener.accept().await.map_err(TransportError::Accept)?;
        if let Err(err) = stream.set_nodelay(true) {
            debug!(%peer, error = %err, "failed to set TCP_NODELAY");
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reader, writer) = stream.into_split();
        let transport = StreamTransport::new(id, peer.to_string(), writer)
            .with_write_timeout(self.write_timeout);

        debug!(id, %peer, "accepted device connection");
        Ok((reader, Arc::new(transport)))
    }

    /// The bound address (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
