use async_trait::async_trait;

use crate::error::Result;

/// The write side of a connected device.
///
/// The registry holds these behind `Arc<dyn DeviceTransport>` and never keeps
/// a map guard across a call. Implementations must tolerate `close` being
/// called more than once.
#[async_trait]
pub trait DeviceTransport: Send + Sync + std::fmt::Debug {
    /// Whether the transport is believed to be usable.
    fn is_connected(&self) -> bool;

    /// Write one fully framed message.
    async fn send(&self, data: &[u8]) -> Result<()>;

    /// Close best-effort; errors are swallowed.
    async fn close(&self);

    /// Remote address for diagnostics.
    fn peer(&self) -> String;
}
