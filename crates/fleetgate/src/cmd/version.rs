use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("fleetgate {}", env!("CARGO_PKG_VERSION"));
    if !args.extended {
        return Ok(SUCCESS);
    }

    println!(
        "target: {}",
        option_env!("FLEETGATE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("os/arch: {}/{}", std::env::consts::OS, std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "default_listen: {}",
        fleetgate_gateway::config::DEFAULT_LISTEN
    );
    println!(
        "default_control_socket: {}",
        fleetgate_gateway::default_control_socket().display()
    );

    Ok(SUCCESS)
}
