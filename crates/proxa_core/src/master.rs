use std::sync::Arc;

use proxa_config::ProxaConfig;
use proxa_proxy::ProxyHandler;
use tokio::{net::TcpListener, sync::Semaphore};
use tracing::{debug, error, info, instrument};

use crate::worker::handle_connection;

/// Process-level runtime: owns the listening socket and hands every accepted
/// connection to a worker task. The proxy handler is built once at startup
/// (store already connected) and shared by all workers.
pub struct Master {
    cfg: Arc<ProxaConfig>,
    handler: Arc<ProxyHandler>,
}

impl Master {
    pub fn new(cfg: ProxaConfig, handler: ProxyHandler) -> Self {
        Self {
            cfg: Arc::new(cfg),
            handler: Arc::new(handler),
        }
    }

    /// Binds the listener and runs the accept loop until the task is
    /// cancelled (the binary races this against the shutdown signal).
    #[instrument(skip(self), fields(
        listen = %self.cfg.server.listen,
        worker_connections = %self.cfg.global.worker_connections,
    ))]
    pub async fn run(self) -> anyhow::Result<()> {
        info!(target: "proxa::master", "Starting PROXA MASTER");

        // Global limit for concurrent connections across the entire process
        let max_conns = self.cfg.global.worker_connections as usize;
        let semaphore = Arc::new(Semaphore::new(max_conns));

        info!(
            target: "proxa::master",
            max_conns,
            "Global connection semaphore initialized"
        );

        let listen_addr = self.cfg.server.listen.clone();
        let listener = match TcpListener::bind(&listen_addr).await {
            Ok(l) => {
                info!(
                    target: "proxa::master",
                    listen = %listen_addr,
                    "Bind() successful"
                );
                l
            }
            Err(e) => {
                error!(
                    target: "proxa::master",
                    listen = %listen_addr,
                    error = ?e,
                    "Failed to bind listener"
                );
                return Err(e.into());
            }
        };

        info!(
            target: "proxa::master",
            origin = %self.cfg.origin.address,
            "Master initialized. Waiting for incoming connections (Ctrl+C to stop)..."
        );

        accept_loop(listener, listen_addr, semaphore, self.handler, self.cfg).await
    }
}

#[instrument(
    skip(listener, semaphore, handler, cfg),
    fields(
        listen = %listen_addr,
        max_permits = semaphore.available_permits(),
    )
)]
async fn accept_loop(
    listener: TcpListener,
    listen_addr: String,
    semaphore: Arc<Semaphore>,
    handler: Arc<ProxyHandler>,
    cfg: Arc<ProxaConfig>,
) -> anyhow::Result<()> {
    info!(
        target: "proxa::master",
        listen = %listen_addr,
        "accept_loop started for listening socket"
    );

    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                error!(
                    target: "proxa::master",
                    listen = %listen_addr,
                    error = ?e,
                    "Failed to accept connection"
                );
                return Err(e.into());
            }
        };

        // Permits must be acquired via Semaphore::acquire_owned to be
        // movable across the task boundary.
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(p) => p,
            Err(e) => {
                error!(
                    target: "proxa::master",
                    listen = %listen_addr,
                    error = ?e,
                    "Failed to acquire connection permit"
                );
                return Err(e.into());
            }
        };

        debug!(
            target: "proxa::master",
            client_addr = %addr,
            in_flight = semaphore.available_permits(),
            "New connection accepted"
        );

        let handler_clone = handler.clone();
        let cfg_clone = cfg.clone();

        tokio::spawn(async move {
            let span = tracing::info_span!("worker_connection", client_addr = %addr);
            let _enter = span.enter();

            if let Err(e) = handle_connection(stream, addr, handler_clone, cfg_clone).await {
                error!(
                    target: "proxa::worker",
                    client_addr = %addr,
                    error = ?e,
                    "Error while handling connection"
                );
            } else {
                debug!(
                    target: "proxa::worker",
                    client_addr = %addr,
                    "Connection handled successfully"
                );
            }

            drop(permit);
        });
    }
}
