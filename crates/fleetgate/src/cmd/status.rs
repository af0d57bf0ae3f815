use fleetgate_gateway::{request, ControlRequest};

use crate::cmd::{runtime, StatusArgs};
use crate::exit::{gateway_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_response, OutputFormat};

/// Exits non-zero when the device is not connected, so scripts can test it.
pub fn run(args: StatusArgs, format: OutputFormat) -> CliResult<i32> {
    let path = args.control.path();
    let response = runtime()?
        .block_on(request(
            &path,
            &ControlRequest::Status {
                serial: args.serial,
            },
        ))
        .map_err(|err| gateway_error("control request failed", err))?;

    print_response(&response, format);
    Ok(if response.connected == Some(true) {
        SUCCESS
    } else {
        FAILURE
    })
}
