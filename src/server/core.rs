use log::{error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::client::handle_client;
use crate::config::ServerConfig;
use crate::error::FtpServerError;
use crate::protocol::format_response;
use crate::protocol::responses::SERVICE_NOT_AVAILABLE;
use crate::server::ServerServices;
use crate::storage::LocalFileSystem;

pub struct Server {
    listener: TcpListener,
    services: Arc<ServerServices>,
    shutdown: CancellationToken,
    active_clients: Arc<AtomicUsize>,
}

/// Releases a client slot when the connection task ends.
struct ClientSlot(Arc<AtomicUsize>);

impl Drop for ClientSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Server {
    /// Validates the configuration, prepares the server root, starts the
    /// background worker and binds the control socket.
    pub async fn new(config: ServerConfig) -> Result<Self, FtpServerError> {
        config.validate()?;

        let file_system = LocalFileSystem::new(config.server_root_path(), config.background_uploads);
        file_system.ensure_root().await?;

        let control_socket = config.control_socket();
        let listener = TcpListener::bind(&control_socket).await.map_err(|e| {
            error!("Failed to bind to {}: {}", control_socket, e);
            FtpServerError::IoError(e)
        })?;
        info!("Server bound to {}", listener.local_addr()?);

        let shutdown = CancellationToken::new();
        let services = ServerServices::new(config, Arc::new(file_system), &shutdown)?;

        Ok(Self {
            listener,
            services: Arc::new(services),
            shutdown,
            active_clients: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn services(&self) -> &Arc<ServerServices> {
        &self.services
    }

    /// Token whose cancellation stops `run`, every connection and the worker.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        info!("Shutting down FTP server");
        self.shutdown.cancel();
    }

    /// Accepts connections until shut down.
    pub async fn run(&self) -> Result<(), FtpServerError> {
        let max_clients = self.services.config.max_clients;
        info!(
            "Starting Rax FTP server on {} (max {} clients)",
            self.listener.local_addr()?,
            max_clients
        );

        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    if self.active_clients.fetch_add(1, Ordering::SeqCst) >= max_clients {
                        self.active_clients.fetch_sub(1, Ordering::SeqCst);
                        warn!("Rejecting {}: {} clients connected", addr, max_clients);
                        tokio::spawn(reject_client(stream));
                        continue;
                    }

                    let slot = ClientSlot(Arc::clone(&self.active_clients));
                    let services = Arc::clone(&self.services);
                    let shutdown = self.shutdown.clone();

                    // Spawn a task for each client so accept loop doesn't block
                    tokio::spawn(async move {
                        let _slot = slot;
                        handle_client(stream, services, shutdown).await;
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }

        self.services.worker.stop().await;
        info!("FTP server stopped");
        Ok(())
    }
}

async fn reject_client(mut stream: TcpStream) {
    let message = format_response(SERVICE_NOT_AVAILABLE, "Too many connections. Try again later.");
    if stream.write_all(message.as_bytes()).await.is_ok() {
        let _ = stream.shutdown().await;
    }
}
