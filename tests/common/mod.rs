//! Test helpers for end-to-end tests.
//!
//! Provides TestClient, TestServer, and helpers for driving the chat server
//! over real TCP connections.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use roomchat::chat::{ChatParticipant, ConnectionId, Outbox};
use roomchat::config::{Config, ServerConfig};
use roomchat::{ChatApp, ChatListener};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Last line of the help banner.
pub const HELP_TAIL: &str = "Anything else you type while in a room is sent to everyone there.";

/// Test client connected to the chat server.
pub struct TestClient {
    stream: TcpStream,
    buffer: Vec<u8>,
}

impl TestClient {
    /// Connect to the server at the given address.
    pub async fn connect(addr: SocketAddr) -> Result<Self, std::io::Error> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            stream,
            buffer: Vec::with_capacity(4096),
        })
    }

    /// Connect, answer the nickname prompt and wait for the help banner.
    pub async fn login(addr: SocketAddr, nickname: &str) -> Result<Self, std::io::Error> {
        let mut client = Self::connect(addr).await?;
        client.expect("Nickname: ").await?;
        client.send_line(nickname).await?;
        client.expect(HELP_TAIL).await?;
        Ok(client)
    }

    /// Send a line (with CR) to the server.
    pub async fn send_line(&mut self, line: &str) -> Result<(), std::io::Error> {
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.write_all(b"\r").await?;
        self.stream.flush().await
    }

    /// Receive data until a pattern is found.
    pub async fn recv_until(&mut self, pattern: &str) -> Result<String, std::io::Error> {
        self.recv_until_timeout(pattern, DEFAULT_TIMEOUT).await
    }

    /// Receive data until a pattern is found with custom timeout.
    ///
    /// Returns everything received up to and including the pattern.
    pub async fn recv_until_timeout(
        &mut self,
        pattern: &str,
        duration: Duration,
    ) -> Result<String, std::io::Error> {
        self.buffer.clear();
        let mut buf = [0u8; 1];

        let result = timeout(duration, async {
            loop {
                match self.stream.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        self.buffer.push(buf[0]);
                        if self.buffer.ends_with(pattern.as_bytes()) {
                            return Ok(self.decode_buffer());
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(self.decode_buffer())
        })
        .await;

        match result {
            Ok(r) => r,
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("Timeout waiting for pattern: {pattern}"),
            )),
        }
    }

    /// Expect a pattern in the received data.
    pub async fn expect(&mut self, pattern: &str) -> Result<String, std::io::Error> {
        let data = self.recv_until(pattern).await?;
        if data.contains(pattern) {
            Ok(data)
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Pattern not found: {pattern}\nReceived: {data}"),
            ))
        }
    }

    /// Read whatever arrives within `duration`.
    pub async fn drain(&mut self, duration: Duration) -> String {
        self.buffer.clear();
        let mut buf = [0u8; 1024];
        let deadline = tokio::time::Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match timeout(remaining, self.stream.read(&mut buf)).await {
                Ok(Ok(0)) | Ok(Err(_)) | Err(_) => break,
                Ok(Ok(n)) => self.buffer.extend_from_slice(&buf[..n]),
            }
        }
        self.decode_buffer()
    }

    /// Wait for the server to close the connection.
    pub async fn expect_closed(&mut self) -> Result<(), std::io::Error> {
        let mut buf = [0u8; 256];
        timeout(DEFAULT_TIMEOUT, async {
            loop {
                if self.stream.read(&mut buf).await? == 0 {
                    return Ok(());
                }
            }
        })
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "connection still open"))?
    }

    fn decode_buffer(&self) -> String {
        String::from_utf8_lossy(&self.buffer).to_string()
    }
}

/// Chat server on an OS-assigned loopback port, stopped on drop.
pub struct TestServer {
    addr: SocketAddr,
    app: ChatApp,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a server with the test configuration.
    pub async fn start() -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_config(test_config()).await
    }

    /// Start a server with a custom configuration.
    pub async fn with_config(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = ChatListener::bind(&config.server).await?;
        let addr = listener.local_addr()?;
        let app = ChatApp::new(config).await;

        let serving = app.clone();
        let handle = tokio::spawn(async move {
            let _ = listener.serve(serving).await;
        });

        Ok(Self { addr, app, handle })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the shared application state.
    pub fn app(&self) -> &ChatApp {
        &self.app
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Configuration for tests: loopback, random port, no SSH, no log file.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        max_connections: 16,
        idle_timeout_secs: 0,
    };
    config.ssh.enabled = false;
    config.logging.file = String::new();
    config
}

/// A participant with its receiving end, for driving rooms directly.
pub struct Probe {
    pub participant: ChatParticipant,
    pub outbox: Outbox,
    pub receiver: tokio::sync::mpsc::Receiver<Vec<u8>>,
}

impl Probe {
    /// Create a probe with a roomy outbox.
    pub fn new(name: &str) -> Self {
        Self::with_capacity(name, 256)
    }

    /// Create a probe with the given outbox capacity.
    pub fn with_capacity(name: &str, capacity: usize) -> Self {
        let (outbox, receiver) = Outbox::channel(capacity);
        Self {
            participant: ChatParticipant::new(ConnectionId::new(), name),
            outbox,
            receiver,
        }
    }

    /// Take every queued line, without line endings.
    pub fn lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(bytes) = self.receiver.try_recv() {
            let text = String::from_utf8_lossy(&bytes).to_string();
            lines.push(text.trim_end_matches("\r\n").to_string());
        }
        lines
    }
}
