//! Room directory for roomchat.
//!
//! This module provides centralized management of chat rooms,
//! allowing multiple sessions to share the same room instances.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use super::room::{ChatRoom, RoomSettings};
use crate::error::{ChatError, Result};

/// Rooms created on startup when no seed list is configured.
pub const DEFAULT_ROOMS: &[&str] = &["Flirt", "Gaming", "Memes"];

/// Maximum length of a room name, in characters.
pub const MAX_ROOM_NAME_LENGTH: usize = 32;

/// Directory of all rooms, in creation order.
///
/// Shared across all sessions. Rooms are never removed.
pub struct RoomDirectory {
    rooms: RwLock<Vec<Arc<ChatRoom>>>,
    settings: RoomSettings,
}

impl RoomDirectory {
    /// Create an empty directory whose rooms use the given settings.
    pub fn new(settings: RoomSettings) -> Self {
        Self {
            rooms: RwLock::new(Vec::new()),
            settings,
        }
    }

    /// Create a directory seeded with the given room names.
    ///
    /// Invalid or duplicate seed names are skipped with a warning.
    pub async fn with_rooms<I, S>(names: I, settings: RoomSettings) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let directory = Self::new(settings);
        for name in names {
            if let Err(e) = directory.create(name.as_ref()).await {
                warn!("Skipping seed room '{}': {}", name.as_ref(), e);
            }
        }
        directory
    }

    /// Create a directory with the default seed rooms.
    pub async fn with_defaults() -> Self {
        Self::with_rooms(DEFAULT_ROOMS.iter().copied(), RoomSettings::default()).await
    }

    /// Create a new empty room.
    ///
    /// Fails if the name is invalid or already taken.
    pub async fn create(&self, name: &str) -> Result<Arc<ChatRoom>> {
        let name = validate_room_name(name)?;
        let mut rooms = self.rooms.write().await;

        if rooms.iter().any(|room| room.name() == name) {
            return Err(ChatError::AlreadyExists(format!("room '{name}'")));
        }

        let room = Arc::new(ChatRoom::with_settings(name, self.settings.clone()));
        rooms.push(Arc::clone(&room));
        info!("Room created: {} (total: {})", name, rooms.len());
        Ok(room)
    }

    /// Find a room by exact, case-sensitive name. Surrounding whitespace is ignored.
    pub async fn find(&self, name: &str) -> Option<Arc<ChatRoom>> {
        let name = name.trim();
        self.rooms
            .read()
            .await
            .iter()
            .find(|room| room.name() == name)
            .cloned()
    }

    /// Look up a room, failing with `NotFound` when no room has that name.
    pub async fn get(&self, name: &str) -> Result<Arc<ChatRoom>> {
        self.find(name)
            .await
            .ok_or_else(|| ChatError::NotFound(format!("room '{}'", name.trim())))
    }

    /// Room names in creation order.
    pub async fn list(&self) -> Vec<String> {
        self.rooms
            .read()
            .await
            .iter()
            .map(|room| room.name().to_string())
            .collect()
    }

    /// Room names with current member counts, in creation order.
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let rooms: Vec<Arc<ChatRoom>> = self.rooms.read().await.clone();
        let mut result = Vec::with_capacity(rooms.len());
        for room in rooms {
            result.push(RoomInfo {
                name: room.name().to_string(),
                member_count: room.member_count().await,
            });
        }
        result
    }

    /// Get the number of rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new(RoomSettings::default())
    }
}

/// Information about a chat room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    /// Room name.
    pub name: String,
    /// Number of members currently in the room.
    pub member_count: usize,
}

/// Validate a room name, returning it trimmed.
pub fn validate_room_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ChatError::Validation("room name is empty".to_string()));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(ChatError::Validation(
            "room name must be a single word".to_string(),
        ));
    }
    if name.chars().count() > MAX_ROOM_NAME_LENGTH {
        return Err(ChatError::Validation(format!(
            "room name is longer than {MAX_ROOM_NAME_LENGTH} characters"
        )));
    }
    Ok(name)
}
