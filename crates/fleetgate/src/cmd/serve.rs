use std::sync::Arc;

use fleetgate_gateway::{ChannelSink, Gateway, GatewayConfig, TelemetrySink, TracingSink};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cmd::{runtime, ServeArgs};
use crate::exit::{gateway_error, CliResult, SUCCESS};
use crate::output::{print_telemetry, OutputFormat};

const TELEMETRY_BUFFER: usize = 1024;

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(&args)?;
    runtime()?.block_on(serve(config, args.quiet, format))
}

fn load_config(args: &ServeArgs) -> CliResult<GatewayConfig> {
    let mut config = match &args.config {
        Some(path) => GatewayConfig::from_json_file(path)
            .map_err(|err| gateway_error("config load failed", err))?,
        None => GatewayConfig::default(),
    };

    if let Some(listen) = &args.listen {
        config.listen = listen.clone();
    }
    if let Some(path) = &args.control_socket {
        config.control_socket = path.clone();
    }
    if let Some(secs) = args.read_idle_timeout {
        config.read_idle_timeout_secs = secs;
    }
    if let Some(token) = &args.auth_token {
        config.auth_token = token.clone();
    }

    config
        .validate()
        .map_err(|err| gateway_error("invalid configuration", err))?;
    Ok(config)
}

async fn serve(config: GatewayConfig, quiet: bool, format: OutputFormat) -> CliResult<i32> {
    let (sink, printer): (Arc<dyn TelemetrySink>, _) = if quiet {
        (Arc::new(TracingSink), None)
    } else {
        let (sink, mut rx) = ChannelSink::new(TELEMETRY_BUFFER);
        let printer = tokio::spawn(async move {
            while let Some(telemetry) = rx.recv().await {
                print_telemetry(&telemetry, format);
            }
        });
        (Arc::new(sink), Some(printer))
    };

    let gateway = Gateway::bind(&config, sink)
        .await
        .map_err(|err| gateway_error("gateway start failed", err))?;
    info!(
        listen = %gateway.local_addr(),
        control = %gateway.control_path().display(),
        "fleetgate serving"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    gateway
        .run(shutdown)
        .await
        .map_err(|err| gateway_error("gateway failed", err))?;

    if let Some(printer) = printer {
        // Every sink clone is dropped once the sessions are gone.
        let _ = printer.await;
    }
    Ok(SUCCESS)
}

async fn cancel_on_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("interrupt received"),
                    _ = term.recv() => info!("terminate received"),
                }
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    shutdown.cancel();
}
