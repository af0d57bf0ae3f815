use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fleetgate_transport::{DeviceTransport, Result, TransportError};

/// In-memory transport recording every write.
#[derive(Debug, Default)]
pub struct MockTransport {
    name: String,
    connected: AtomicBool,
    fail_writes: AtomicBool,
    closes: AtomicUsize,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl MockTransport {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            connected: AtomicBool::new(true),
            ..Self::default()
        })
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeviceTransport for MockTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, data: &[u8]) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Io(std::io::Error::from(
                std::io::ErrorKind::BrokenPipe,
            )));
        }
        self.sent.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn peer(&self) -> String {
        self.name.clone()
    }
}
