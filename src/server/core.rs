use log::{error, info, warn};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::client::handle_client;
use crate::config::ServerConfig;
use crate::error::StartupError;
use crate::middleware::logging::log_connection;
use crate::protocol::responses::{GREETING, TOO_MANY};
use crate::service::WorkspaceService;

pub struct Server {
    listener: TcpListener,
    service: Arc<WorkspaceService>,
    config: Arc<ServerConfig>,
    connections: Arc<Semaphore>,
}

impl Server {
    /// Open the workspace service described by `config` and bind the listener.
    pub async fn bind(config: ServerConfig) -> Result<Self, StartupError> {
        let service = WorkspaceService::from_config(&config)?;
        Self::with_service(config, Arc::new(service)).await
    }

    /// Bind the listener in front of an already opened service.
    pub async fn with_service(
        config: ServerConfig,
        service: Arc<WorkspaceService>,
    ) -> Result<Self, StartupError> {
        let address = config.listen_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| StartupError::Bind(address.clone(), e))?;
        info!("Server bound to {}", address);

        Ok(Self {
            listener,
            service,
            connections: Arc::new(Semaphore::new(config.max_clients)),
            config: Arc::new(config),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn service(&self) -> Arc<WorkspaceService> {
        Arc::clone(&self.service)
    }

    /// Accept clients until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            "Starting Vellum workspace server on {} (max {} clients)",
            self.config.listen_address(),
            self.config.max_clients
        );

        let sweeper = spawn_session_sweep(Arc::clone(&self.service), &self.config);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting clients");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.spawn_client(stream, addr),
                    Err(e) => error!("Error accepting connection: {}", e),
                },
            }
        }

        sweeper.abort();
    }

    /// Greet the client and hand it to its own task, or turn it away when full.
    fn spawn_client(&self, stream: TcpStream, addr: SocketAddr) {
        let permit = match Arc::clone(&self.connections).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Rejecting {}: connection limit reached", addr);
                tokio::spawn(reject_client(stream));
                return;
            }
        };

        let service = Arc::clone(&self.service);
        let config = Arc::clone(&self.config);

        tokio::spawn(async move {
            let _permit = permit;
            let mut stream = stream;
            log_connection(&addr.to_string());

            if let Err(e) = stream.write_all(GREETING.as_bytes()).await {
                warn!("Failed to greet client {}: {}", addr, e);
                return;
            }
            handle_client(stream, addr, service, config).await;
        });
    }
}

async fn reject_client(mut stream: TcpStream) {
    let _ = stream.write_all(TOO_MANY.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Periodically drop expired sessions and stale throttle entries.
fn spawn_session_sweep(service: Arc<WorkspaceService>, config: &ServerConfig) -> JoinHandle<()> {
    let period = config.session_sweep_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purged = service.sweep();
            if purged > 0 {
                info!("Swept {} expired sessions", purged);
            }
        }
    })
}
