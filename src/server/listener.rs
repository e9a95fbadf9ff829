//! WebSocket listener
//!
//! Handles the TCP accept loop and spawns connection handlers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::broadcast::Broadcaster;
use crate::registry::StreamRegistry;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;

/// Accept loop for one running server
pub struct Listener {
    config: Arc<ServerConfig>,
    registry: Arc<StreamRegistry>,
    broadcaster: Arc<Broadcaster>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    next_conn_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl Listener {
    /// Create a listener sharing the server's registry and broadcaster
    pub fn new(
        config: Arc<ServerConfig>,
        registry: Arc<StreamRegistry>,
        broadcaster: Arc<Broadcaster>,
        shutdown: CancellationToken,
    ) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            registry,
            broadcaster,
            shutdown,
            tracker: TaskTracker::new(),
            next_conn_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Accept connections until shutdown is requested
    ///
    /// On shutdown, waits up to `shutdown_timeout` for open connections to
    /// send their close frames.
    pub async fn run(&self, listener: TcpListener) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => self.handle_connection(socket, peer_addr),
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                    }
                },
            }
        }

        // Stop accepting before waiting on open connections
        drop(listener);

        self.tracker.close();
        let open = self.tracker.len();
        if open > 0 {
            tracing::debug!(connections = open, "Waiting for connections to close");
        }
        if tokio::time::timeout(self.config.shutdown_timeout, self.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                connections = self.tracker.len(),
                "Connections still open after shutdown timeout"
            );
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(conn_id = conn_id, peer = %peer_addr, "New connection");

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let mut connection = Connection::new(
            conn_id,
            peer_addr,
            Arc::clone(&self.config),
            Arc::clone(&self.registry),
            Arc::clone(&self.broadcaster),
            self.shutdown.clone(),
        );

        self.tracker.spawn(async move {
            let _permit = permit;

            if let Err(e) = connection.run(socket).await {
                tracing::debug!(conn_id = conn_id, error = %e, "Connection error");
            }

            tracing::debug!(
                conn_id = conn_id,
                duration_ms = connection.state().duration().as_millis() as u64,
                "Connection closed"
            );
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }
}
