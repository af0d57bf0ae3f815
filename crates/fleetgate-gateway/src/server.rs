use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use fleetgate_transport::ControlSocket;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::GatewayConfig;
use crate::control::serve_control;
use crate::error::Result;
use crate::listener::GatewayListener;
use crate::registry::ConnectionRegistry;
use crate::sink::TelemetrySink;

/// Device listener plus control socket sharing one registry.
pub struct Gateway {
    listener: GatewayListener,
    control: ControlSocket,
    registry: Arc<ConnectionRegistry>,
}

impl Gateway {
    /// Validate `config` and bind both sockets.
    pub async fn bind(config: &GatewayConfig, sink: Arc<dyn TelemetrySink>) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(ConnectionRegistry::new());
        let listener = GatewayListener::bind(config, registry.clone(), sink).await?;
        let control = ControlSocket::bind(&config.control_socket)?;
        info!(
            listen = %listener.local_addr(),
            control = ?config.control_socket,
            "gateway bound"
        );
        Ok(Self {
            listener,
            control,
            registry,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn control_path(&self) -> PathBuf {
        self.control.path().to_path_buf()
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// The control socket stops accepting first; then every device session
    /// is closed and drained.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let control = tokio::spawn(serve_control(
            self.control,
            self.registry.clone(),
            shutdown.clone(),
        ));

        let served = self.listener.serve(shutdown.clone()).await;
        shutdown.cancel();

        match control.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(error = %err, "control server failed"),
            Err(err) => error!(error = %err, "control server task panicked"),
        }
        info!("gateway stopped");
        served
    }
}
