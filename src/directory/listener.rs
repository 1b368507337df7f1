//! TCP listener for the directory service.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use super::registry::RoomRegistry;
use super::session::serve_connection;
use super::sessions::SessionSet;
use crate::config::ServerConfig;
use crate::{Result, RoomcastError};

/// Directory server that accepts control connections.
pub struct DirectoryServer {
    listener: TcpListener,
    semaphore: Arc<Semaphore>,
    max_connections: usize,
    registry: Arc<RoomRegistry>,
    sessions: SessionSet,
}

impl DirectoryServer {
    /// Create a new DirectoryServer bound to the configured address.
    pub async fn bind(config: &ServerConfig, registry: Arc<RoomRegistry>) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            RoomcastError::ConnectionFailure(format!("cannot bind directory to {addr}: {e}"))
        })?;
        let local_addr = listener.local_addr()?;

        info!("Directory server listening on {}", local_addr);

        Ok(Self {
            listener,
            semaphore: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
            registry,
            sessions: SessionSet::new(),
        })
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Get the maximum number of connections allowed.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Get the number of active connections.
    pub fn active_connections(&self) -> usize {
        self.max_connections - self.semaphore.available_permits()
    }

    /// Shared room registry.
    pub fn registry(&self) -> Arc<RoomRegistry> {
        Arc::clone(&self.registry)
    }

    /// Live session set used for broadcast fan-out.
    pub fn sessions(&self) -> SessionSet {
        self.sessions.clone()
    }

    /// Accept a new connection.
    ///
    /// Waits for a free connection slot first when `max_connections` is reached.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit)> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| RoomcastError::Io(std::io::Error::other("semaphore closed")))?;

        let (stream, addr) = self.listener.accept().await?;
        debug!("Accepted connection from {}", addr);

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Run the server, spawning one session task per connection.
    ///
    /// Only returns on an accept failure, which is fatal to the directory.
    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, addr, permit) = match self.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    return Err(e);
                }
            };

            let registry = Arc::clone(&self.registry);
            let sessions = self.sessions.clone();
            tokio::spawn(async move {
                serve_connection(stream, addr, registry, sessions).await;
                drop(permit);
            });
        }
    }
}

/// A permit that represents an active connection slot.
///
/// When this permit is dropped, the connection slot is released.
pub struct ConnectionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}
