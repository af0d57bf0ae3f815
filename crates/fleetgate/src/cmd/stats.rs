use fleetgate_gateway::{request, ControlRequest};

use crate::cmd::{runtime, StatsArgs};
use crate::exit::{gateway_error, CliResult, SUCCESS};
use crate::output::{print_response, OutputFormat};

pub fn run(args: StatsArgs, format: OutputFormat) -> CliResult<i32> {
    let path = args.control.path();
    let response = runtime()?
        .block_on(request(&path, &ControlRequest::Stats))
        .map_err(|err| gateway_error("control request failed", err))?;

    print_response(&response, format);
    Ok(SUCCESS)
}
