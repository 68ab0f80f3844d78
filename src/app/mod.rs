//! Application module.
//!
//! Provides the state shared by every connection and the per-connection
//! session loop.

mod session_handler;

pub use session_handler::{SessionHandler, SessionOptions};

use std::sync::Arc;

use crate::chat::{RoomDirectory, RoomSettings, SessionRegistry};
use crate::config::Config;

/// Process-wide chat state: configuration, room directory and session registry.
///
/// Cloning is cheap; every clone refers to the same rooms and sessions.
#[derive(Clone)]
pub struct ChatApp {
    config: Arc<Config>,
    directory: Arc<RoomDirectory>,
    registry: Arc<SessionRegistry>,
}

impl ChatApp {
    /// Create the application with the configured seed rooms.
    pub async fn new(config: Config) -> Self {
        let settings = RoomSettings::from_config(&config.chat);
        let directory = RoomDirectory::with_rooms(&config.chat.seed_rooms, settings).await;
        Self::from_parts(config, directory, SessionRegistry::new())
    }

    /// Create the application from already built parts.
    pub fn from_parts(config: Config, directory: RoomDirectory, registry: SessionRegistry) -> Self {
        Self {
            config: Arc::new(config),
            directory: Arc::new(directory),
            registry: Arc::new(registry),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the room directory.
    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    /// Get the session registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}
