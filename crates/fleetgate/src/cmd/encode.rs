use fleetgate_protocol::{encode, encode_with_sequence};
use serde::Serialize;

use crate::cmd::EncodeArgs;
use crate::exit::{encode_error, CliResult, SUCCESS};
use crate::output::{print_fields, print_json, OutputFormat};

#[derive(Serialize)]
struct EncodeOutput {
    serial: String,
    command: String,
    message_type: String,
    frame: String,
}

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let command = args.command.to_command();
    let frame = match args.sequence {
        Some(sequence) => encode_with_sequence(&args.serial, &command, sequence),
        None => encode(&args.serial, &command),
    }
    .map_err(|err| encode_error("encode failed", err))?;

    let out = EncodeOutput {
        serial: args.serial,
        command: args.command.to_string(),
        message_type: format!("{:#06x}", command.message_type()),
        frame: hex::encode(&frame),
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_fields(&[
            ("serial", out.serial.clone()),
            ("command", out.command.clone()),
            ("message_type", out.message_type.clone()),
            ("frame", out.frame.clone()),
        ]),
        OutputFormat::Pretty => println!("{}", out.frame),
    }
    Ok(SUCCESS)
}
