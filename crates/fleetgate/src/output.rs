use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use fleetgate_gateway::{ControlResponse, Telemetry};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Two-column FIELD/VALUE table.
pub fn print_fields(rows: &[(&str, String)]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["FIELD", "VALUE"]);
    for (field, value) in rows {
        table.add_row(vec![field.to_string(), value.clone()]);
    }
    println!("{table}");
}

/// `field=value` pairs on one line.
pub fn print_pretty(rows: &[(&str, String)]) {
    let line = rows
        .iter()
        .map(|(field, value)| format!("{field}={value}"))
        .collect::<Vec<_>>()
        .join(" ");
    println!("{line}");
}

pub fn print_response(response: &ControlResponse, format: OutputFormat) {
    if let OutputFormat::Json = format {
        print_json(response);
        return;
    }

    let mut rows = vec![
        ("success", response.success.to_string()),
        ("message", response.message.clone()),
    ];
    if let Some(serial) = &response.serial {
        rows.push(("serial", serial.clone()));
    }
    if let Some(connected) = response.connected {
        rows.push(("connected", connected.to_string()));
    }
    if let Some(at) = response.last_activity {
        rows.push(("last_activity", at.to_rfc3339()));
    }
    if let Some(count) = response.connected_devices {
        rows.push(("connected_devices", count.to_string()));
    }
    rows.push(("timestamp", response.timestamp.to_rfc3339()));

    match format {
        OutputFormat::Table => {
            print_fields(&rows);
            if let Some(sessions) = response.sessions.as_deref().filter(|s| !s.is_empty()) {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(vec!["SERIAL", "PEER", "LAST ACTIVITY"]);
                for session in sessions {
                    table.add_row(vec![
                        session.serial_number.clone(),
                        session.peer.clone(),
                        session.last_activity.to_rfc3339(),
                    ]);
                }
                println!("{table}");
            }
        }
        _ => {
            print_pretty(&rows);
            for session in response.sessions.iter().flatten() {
                println!(
                    "  {} peer={} last_activity={}",
                    session.serial_number,
                    session.peer,
                    session.last_activity.to_rfc3339()
                );
            }
        }
    }
}

/// One line per position; tables are unsuitable for a stream.
pub fn print_telemetry(telemetry: &Telemetry, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(telemetry),
        OutputFormat::Table | OutputFormat::Pretty => {
            let record = &telemetry.record;
            println!(
                "{} serial={} valid={} lat={:.6} lon={:.6} speed_kph={} extensions={}",
                record.timestamp.to_rfc3339(),
                telemetry.serial_number,
                record.valid,
                record.latitude,
                record.longitude,
                record
                    .speed_kph
                    .map(|s| format!("{s:.1}"))
                    .unwrap_or_else(|| "-".to_string()),
                record.extensions.len()
            );
        }
    }
}
