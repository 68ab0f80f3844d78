//! SSH shell server.
//!
//! Accepts any user name without credentials and runs a chat session on
//! each shell channel. The SSH user name becomes the chat nickname
//! (`ssh alice@host -p 2222`).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use russh::keys::PrivateKey;
use russh::server::{Auth, Handler, Msg, Server, Session};
use russh::{Channel, ChannelId, Pty};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::app::{ChatApp, SessionHandler, SessionOptions};
use crate::config::SshConfig;
use crate::server::EchoMode;
use crate::{ChatError, Result};

/// Load an existing SSH host key or generate a new Ed25519 key.
fn load_or_generate_host_key(path: &str) -> Result<PrivateKey> {
    let key_path = Path::new(path);

    if let Some(parent) = key_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ChatError::Config(format!(
                    "cannot create directory for SSH host key '{path}': {e}"
                ))
            })?;
        }
    }

    if key_path.exists() {
        let pem = std::fs::read_to_string(path)
            .map_err(|e| ChatError::Config(format!("cannot read SSH host key '{path}': {e}")))?;
        return PrivateKey::from_openssh(&pem).map_err(|e| {
            ChatError::Config(format!(
                "SSH host key '{path}' is invalid: {e}. Delete the file to regenerate."
            ))
        });
    }

    let key = PrivateKey::random(&mut rand_core::OsRng, russh::keys::Algorithm::Ed25519)
        .map_err(|e| ChatError::Config(format!("cannot generate SSH host key: {e}")))?;
    let pem = key
        .to_openssh(russh::keys::ssh_key::LineEnding::LF)
        .map_err(|e| ChatError::Config(format!("cannot encode SSH host key: {e}")))?;
    std::fs::write(path, pem.as_bytes())
        .map_err(|e| ChatError::Config(format!("cannot write SSH host key '{path}': {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|e| {
            ChatError::Config(format!(
                "cannot set permissions on SSH host key '{path}': {e}"
            ))
        })?;
    }

    info!("SSH host key generated: {}", path);
    Ok(key)
}

/// Creates a handler for each SSH connection.
struct ChatSshServer {
    app: ChatApp,
    semaphore: Arc<Semaphore>,
}

impl Server for ChatSshServer {
    type Handler = ChatSshHandler;

    fn new_client(&mut self, peer_addr: Option<SocketAddr>) -> Self::Handler {
        let permit = match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                warn!(
                    "SSH connection limit reached, rejecting connection from {:?}",
                    peer_addr
                );
                None
            }
        };

        ChatSshHandler {
            app: self.app.clone(),
            peer_addr,
            username: None,
            pending: HashMap::new(),
            _permit: permit,
        }
    }
}

/// Per-connection SSH handler.
struct ChatSshHandler {
    app: ChatApp,
    peer_addr: Option<SocketAddr>,
    /// User name from authentication.
    username: Option<String>,
    /// Session channels opened but not yet started as shells.
    pending: HashMap<ChannelId, Channel<Msg>>,
    /// `None` when the connection arrived over the limit.
    _permit: Option<OwnedSemaphorePermit>,
}

impl ChatSshHandler {
    fn authenticate(&mut self, user: &str) -> Auth {
        if self._permit.is_none() {
            return Auth::Reject {
                proceed_with_methods: None,
                partial_success: false,
            };
        }
        info!("SSH user '{}' connected from {:?}", user, self.peer_addr);
        self.username = Some(user.to_string());
        Auth::Accept
    }
}

impl Handler for ChatSshHandler {
    type Error = russh::Error;

    async fn auth_none(&mut self, user: &str) -> std::result::Result<Auth, Self::Error> {
        Ok(self.authenticate(user))
    }

    async fn auth_password(
        &mut self,
        user: &str,
        _password: &str,
    ) -> std::result::Result<Auth, Self::Error> {
        Ok(self.authenticate(user))
    }

    async fn auth_publickey(
        &mut self,
        user: &str,
        _public_key: &russh::keys::PublicKey,
    ) -> std::result::Result<Auth, Self::Error> {
        Ok(self.authenticate(user))
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> std::result::Result<bool, Self::Error> {
        debug!("SSH session channel {:?} opened", channel.id());
        self.pending.insert(channel.id(), channel);
        Ok(true)
    }

    #[allow(clippy::too_many_arguments)]
    async fn pty_request(
        &mut self,
        channel: ChannelId,
        term: &str,
        col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(Pty, u32)],
        session: &mut Session,
    ) -> std::result::Result<(), Self::Error> {
        debug!(
            "SSH pty requested: term={} size={}x{}",
            term, col_width, row_height
        );
        session.channel_success(channel)?;
        Ok(())
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> std::result::Result<(), Self::Error> {
        let Some(chan) = self.pending.remove(&channel) else {
            session.channel_failure(channel)?;
            return Ok(());
        };
        session.channel_success(channel)?;

        let app = self.app.clone();
        let options = SessionOptions {
            peer: self
                .peer_addr
                .map(|addr| addr.to_string())
                .unwrap_or_else(|| "ssh".to_string()),
            username: self.username.clone(),
            echo: EchoMode::Normal,
        };
        tokio::spawn(async move {
            if let Err(e) = SessionHandler::run(app, chan.into_stream(), options).await {
                debug!("SSH chat session ended: {}", e);
            }
        });
        Ok(())
    }

    async fn channel_close(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> std::result::Result<(), Self::Error> {
        self.pending.remove(&channel);
        Ok(())
    }
}

/// Run the SSH shell server until it fails.
pub async fn run(app: ChatApp, config: SshConfig) -> Result<()> {
    let host_key = load_or_generate_host_key(&config.host_key_path)?;

    let russh_config = russh::server::Config {
        keys: vec![host_key],
        ..Default::default()
    };

    let semaphore = Arc::new(Semaphore::new(config.max_connections));
    let addr = format!("{}:{}", config.host, config.port);

    info!("SSH server listening on {}", addr);

    let mut server = ChatSshServer { app, semaphore };
    server
        .run_on_address(Arc::new(russh_config), &addr)
        .await
        .map_err(|e| ChatError::Config(format!("SSH server error: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_load_or_generate_host_key() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("host_key");
        let key_path_str = key_path.to_str().unwrap();

        let key1 = load_or_generate_host_key(key_path_str).unwrap();
        assert!(key_path.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::metadata(&key_path).unwrap().permissions();
            assert_eq!(perms.mode() & 0o777, 0o600);
        }

        let key2 = load_or_generate_host_key(key_path_str).unwrap();
        assert_eq!(key1.public_key().to_string(), key2.public_key().to_string());
    }

    #[test]
    fn test_load_invalid_host_key() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("invalid_key");
        std::fs::write(&key_path, "this is not a valid key").unwrap();

        let result = load_or_generate_host_key(key_path.to_str().unwrap());
        assert!(result.is_err());
        if let Err(ChatError::Config(msg)) = result {
            assert!(msg.contains("Delete the file"));
        }
    }

    #[test]
    fn test_generate_key_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("sub").join("dir").join("key");

        assert!(load_or_generate_host_key(key_path.to_str().unwrap()).is_ok());
        assert!(key_path.exists());
    }

    #[tokio::test]
    async fn test_auth_accepts_any_user_within_limit() {
        let app = ChatApp::new(Config::default()).await;
        let mut server = ChatSshServer {
            app,
            semaphore: Arc::new(Semaphore::new(1)),
        };

        let mut first = server.new_client(None);
        assert!(matches!(first.authenticate("alice"), Auth::Accept));
        assert_eq!(first.username.as_deref(), Some("alice"));

        let mut second = server.new_client(None);
        assert!(matches!(second.authenticate("bob"), Auth::Reject { .. }));
        assert!(second.username.is_none());
    }
}
