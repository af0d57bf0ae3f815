use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use fleetgate_transport::DeviceTransport;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Live connection for one serial number.
#[derive(Debug, Clone)]
pub struct DeviceSession {
    pub serial_number: String,
    pub transport: Arc<dyn DeviceTransport>,
    pub last_activity: DateTime<Utc>,
}

/// Answer to a status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub serial_number: String,
    pub connected: bool,
    pub last_activity: Option<DateTime<Utc>>,
    pub checked_at: DateTime<Utc>,
}

/// One row of [`ConnectionRegistry::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub serial_number: String,
    pub peer: String,
    pub last_activity: DateTime<Utc>,
}

/// Serial number → live transport.
///
/// At most one entry per serial number. Transport calls are always made on a
/// cloned `Arc` after the map guard is released, and no operation panics or
/// surfaces transport errors.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: DashMap<String, DeviceSession>,
}

fn same_transport(a: &Arc<dyn DeviceTransport>, b: &Arc<dyn DeviceTransport>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `serial` to `transport`, replacing and closing any previous one.
    ///
    /// Registering the transport already held only refreshes `last_activity`.
    pub async fn register(&self, serial: &str, transport: Arc<dyn DeviceTransport>) {
        let now = Utc::now();
        let replaced = match self.sessions.entry(serial.to_string()) {
            Entry::Occupied(mut entry) => {
                if same_transport(&entry.get().transport, &transport) {
                    entry.get_mut().last_activity = now;
                    None
                } else {
                    let previous = entry.insert(DeviceSession {
                        serial_number: serial.to_string(),
                        transport: transport.clone(),
                        last_activity: now,
                    });
                    Some(previous.transport)
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(DeviceSession {
                    serial_number: serial.to_string(),
                    transport: transport.clone(),
                    last_activity: now,
                });
                info!(serial, peer = %transport.peer(), "device registered");
                None
            }
        };

        if let Some(old) = replaced {
            info!(
                serial,
                old_peer = %old.peer(),
                new_peer = %transport.peer(),
                "device reconnected; closing previous connection"
            );
            old.close().await;
        }
    }

    /// Write a framed command to `serial`.
    ///
    /// Returns `false` if the device is unknown, its transport is dead, or
    /// the write fails; the last two also remove the entry.
    pub async fn send(&self, serial: &str, data: &[u8]) -> bool {
        let Some(transport) = self.transport_of(serial) else {
            debug!(serial, "send to unknown device");
            return false;
        };

        if !transport.is_connected() {
            debug!(serial, "send to dead transport; evicting");
            self.evict(serial, &transport).await;
            return false;
        }

        match transport.send(data).await {
            Ok(()) => {
                debug!(serial, len = data.len(), "command delivered");
                true
            }
            Err(err) => {
                warn!(serial, error = %err, "command write failed; evicting");
                self.evict(serial, &transport).await;
                false
            }
        }
    }

    /// Whether `serial` has a live transport; evicts it if not.
    pub async fn is_connected(&self, serial: &str) -> bool {
        let Some(transport) = self.transport_of(serial) else {
            return false;
        };
        if transport.is_connected() {
            return true;
        }
        self.evict(serial, &transport).await;
        false
    }

    /// Connection state and last activity for `serial`.
    pub async fn status(&self, serial: &str) -> DeviceStatus {
        let connected = self.is_connected(serial).await;
        let last_activity = self.sessions.get(serial).map(|s| s.last_activity);
        DeviceStatus {
            serial_number: serial.to_string(),
            connected,
            last_activity,
            checked_at: Utc::now(),
        }
    }

    /// Number of live sessions, after sweeping dead ones.
    pub async fn count(&self) -> usize {
        self.sweep().await;
        self.sessions.len()
    }

    /// Live sessions sorted by serial number.
    pub async fn snapshot(&self) -> Vec<SessionInfo> {
        self.sweep().await;
        let mut rows: Vec<SessionInfo> = self
            .sessions
            .iter()
            .map(|entry| SessionInfo {
                serial_number: entry.serial_number.clone(),
                peer: entry.transport.peer(),
                last_activity: entry.last_activity,
            })
            .collect();
        rows.sort_by(|a, b| a.serial_number.cmp(&b.serial_number));
        rows
    }

    /// Remove `serial` and close its transport. Idempotent.
    pub async fn remove(&self, serial: &str) -> bool {
        let Some((_, session)) = self.sessions.remove(serial) else {
            return false;
        };
        info!(serial, "device removed");
        session.transport.close().await;
        true
    }

    /// Remove `serial` only while it is still bound to `transport`.
    ///
    /// Called when a connection ends, so that a stale connection cannot
    /// evict the one that replaced it. Does not close the transport.
    pub fn release(&self, serial: &str, transport: &Arc<dyn DeviceTransport>) -> bool {
        let removed = self
            .sessions
            .remove_if(serial, |_, session| same_transport(&session.transport, transport))
            .is_some();
        if removed {
            info!(serial, "device disconnected");
        }
        removed
    }

    /// Remove and close every session.
    pub async fn close_all(&self) {
        let serials: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        let count = serials.len();
        for serial in serials {
            if let Some((_, session)) = self.sessions.remove(&serial) {
                session.transport.close().await;
            }
        }
        info!(count, "closed all device sessions");
    }

    fn transport_of(&self, serial: &str) -> Option<Arc<dyn DeviceTransport>> {
        self.sessions.get(serial).map(|s| s.transport.clone())
    }

    async fn evict(&self, serial: &str, transport: &Arc<dyn DeviceTransport>) {
        self.release(serial, transport);
        transport.close().await;
    }

    async fn sweep(&self) {
        let dead: Vec<(String, Arc<dyn DeviceTransport>)> = self
            .sessions
            .iter()
            .filter(|entry| !entry.transport.is_connected())
            .map(|entry| (entry.key().clone(), entry.transport.clone()))
            .collect();
        for (serial, transport) in dead {
            self.evict(&serial, &transport).await;
        }
    }
}
