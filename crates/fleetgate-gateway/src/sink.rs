use async_trait::async_trait;
use fleetgate_protocol::PositionRecord;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Destination for decoded positions.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn emit(&self, serial: &str, record: PositionRecord);
}

/// A position tagged with the device that sent it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Telemetry {
    pub serial_number: String,
    #[serde(flatten)]
    pub record: PositionRecord,
}

/// Forwards telemetry over a bounded channel.
///
/// A full channel applies backpressure to the sending session; a dropped
/// receiver discards records.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Telemetry>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Telemetry>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl TelemetrySink for ChannelSink {
    async fn emit(&self, serial: &str, record: PositionRecord) {
        let telemetry = Telemetry {
            serial_number: serial.to_string(),
            record,
        };
        if self.tx.send(telemetry).await.is_err() {
            debug!(serial, "telemetry receiver gone; dropping record");
        }
    }
}

/// Logs each position at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl TelemetrySink for TracingSink {
    async fn emit(&self, serial: &str, record: PositionRecord) {
        info!(
            serial,
            valid = record.valid,
            lat = record.latitude,
            lon = record.longitude,
            speed_kph = record.speed_kph,
            at = %record.timestamp,
            "position"
        );
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn record() -> PositionRecord {
        PositionRecord {
            timestamp: Utc::now(),
            valid: true,
            latitude: 18.5,
            longitude: -69.0,
            altitude_m: Some(10),
            speed_kph: Some(12.5),
            heading_deg: Some(180),
            alarm_flags: 0,
            status: 0x02,
            extensions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn channel_sink_forwards() {
        let (sink, mut rx) = ChannelSink::new(4);
        sink.emit("123", record()).await;

        let got = rx.recv().await.unwrap();
        assert_eq!(got.serial_number, "123");
        assert_eq!(got.record.latitude, 18.5);
    }

    #[tokio::test]
    async fn channel_sink_tolerates_dropped_receiver() {
        let (sink, rx) = ChannelSink::new(1);
        drop(rx);
        sink.emit("123", record()).await;
    }

    #[test]
    fn telemetry_serializes_flat() {
        let json = serde_json::to_value(Telemetry {
            serial_number: "123".to_string(),
            record: record(),
        })
        .unwrap();
        assert_eq!(json["serial_number"], "123");
        assert_eq!(json["latitude"], 18.5);
        assert!(json.get("extensions").is_none());
    }
}
