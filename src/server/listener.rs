//! TCP listener for line-based chat clients (telnet, netcat).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info};

use crate::app::{ChatApp, SessionHandler, SessionOptions};
use crate::config::ServerConfig;
use crate::server::EchoMode;
use crate::{ChatError, Result};

/// Chat server that accepts plain TCP connections.
pub struct ChatListener {
    listener: TcpListener,
    semaphore: Arc<Semaphore>,
    max_connections: usize,
}

impl ChatListener {
    /// Bind to the configured address.
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        info!("Chat server listening on {}", local_addr);

        Ok(Self {
            listener,
            semaphore: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
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

    /// Accept a new connection.
    ///
    /// Waits for a free connection slot before accepting, so clients beyond
    /// the limit queue in the kernel backlog.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit)> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ChatError::Io(std::io::Error::other("semaphore closed")))?;

        let (stream, addr) = self.listener.accept().await?;
        debug!("Accepted connection from {}", addr);

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Accept connections forever, running a chat session for each.
    pub async fn serve(self, app: ChatApp) -> Result<()> {
        loop {
            match self.accept().await {
                Ok((stream, addr, permit)) => {
                    let app = app.clone();
                    tokio::spawn(async move {
                        let _ = stream.set_nodelay(true);
                        let options = SessionOptions {
                            peer: addr.to_string(),
                            username: None,
                            echo: EchoMode::Off,
                        };
                        if let Err(e) = SessionHandler::run(app, stream, options).await {
                            debug!("Connection {} ended: {}", addr, e);
                        }
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

/// An active connection slot, released on drop.
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
