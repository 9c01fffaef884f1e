use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Duration, sleep, timeout};

use crate::core::is_valid_port;
use crate::network::connection::TEARDOWN_WAIT;
use crate::network::{Connection, Service, Transport};
use crate::utils::{P2PError, Result};

/// Accepts peer connections and hands each one to the first service that
/// accepts its opening request.
pub struct Listener {
    port: u16,
    services: Arc<Vec<Arc<dyn Service>>>,
    shutdown: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl Listener {
    pub fn new(port: u16, services: Vec<Arc<dyn Service>>) -> Result<Self> {
        if !is_valid_port(port) {
            return Err(P2PError::ConfigError(format!("Invalid port {}", port)));
        }
        if services.is_empty() {
            return Err(P2PError::ConfigError(
                "At least one service is required".to_string(),
            ));
        }

        Ok(Self {
            port,
            services: Arc::new(services),
            shutdown: None,
            handle: None,
            local_addr: None,
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub async fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        let listener = Transport::listen(self.port).await?;
        self.local_addr = Some(listener.local_addr()?);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let services = self.services.clone();
        self.handle = Some(tokio::spawn(accept_loop(listener, services, shutdown_rx)));
        self.shutdown = Some(shutdown_tx);

        info!("Listener started, listening on {}", self.port);
        Ok(())
    }

    /// Stop accepting connections. Does nothing if the listener never started.
    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            info!("Shutting down listener on {}", self.port);
            let _ = shutdown.send(true);
        }
    }

    /// Wait for the accept loop and its in-flight connections to finish.
    pub async fn await_termination(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("Listener task ended abnormally: {}", e);
            }
            info!("Listener on {} terminated", self.port);
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    services: Arc<Vec<Arc<dyn Service>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    debug!("New connection from: {}", addr);
                    let services = services.clone();
                    connections.spawn(handle_connection(stream, addr, services));
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    sleep(Duration::from_millis(100)).await;
                }
            },
            Some(finished) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = finished {
                    warn!("Connection task failed: {}", e);
                }
            }
        }
    }

    drop(listener);
    let drained = timeout(TEARDOWN_WAIT, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(
            "Aborting {} connections still open after {:?}",
            connections.len(),
            TEARDOWN_WAIT
        );
        connections.abort_all();
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    services: Arc<Vec<Arc<dyn Service>>>,
) {
    let mut connection = Connection::accepted(stream, addr);

    let outcome = match connection.receive().await {
        Ok(Some(request)) => {
            match services.iter().find(|service| service.accepts(&request.payload)) {
                Some(service) => service.serve(request, &mut connection).await,
                None => Err(P2PError::InvalidResponse(format!(
                    "No service accepts {}",
                    request.kind()
                ))),
            }
        }
        Ok(None) => Ok(()),
        Err(e) => Err(e),
    };

    if let Err(e) = outcome {
        error!("Failed to handle connection from {}: {}", addr, e);
    }
    connection.close().await;
}
