use fleetgate_gateway::{request, ControlRequest};

use crate::cmd::{runtime, SendArgs};
use crate::exit::{gateway_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_response, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let control = match (args.command, args.raw) {
        (Some(command), None) => ControlRequest::Send {
            serial: args.serial,
            command,
        },
        (None, Some(frame_hex)) => ControlRequest::SendRaw {
            serial: args.serial,
            frame_hex,
        },
        _ => return Err(CliError::new(USAGE, "give either a command or --raw")),
    };

    let path = args.control.path();
    let response = runtime()?
        .block_on(request(&path, &control))
        .map_err(|err| gateway_error("control request failed", err))?;

    print_response(&response, format);
    Ok(if response.success { SUCCESS } else { FAILURE })
}
