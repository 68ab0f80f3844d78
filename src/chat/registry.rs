//! Session registry for roomchat.
//!
//! Maps each connection to the room it currently occupies. The registry is
//! the only path that moves a connection between rooms, and it keeps its own
//! map and the rooms' member sets in step: `get(id) == Some(room)` exactly
//! when `id` is a member of `room`.
//!
//! Lock order is registry first, then room(s). When a connection moves
//! between two rooms both are locked, in address order, for the transfer.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::member::{ChatParticipant, ConnectionId, Outbox};
use super::room::{ChatRoom, Delivery, RoomState};

/// Registry of the current room of every connection.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<ConnectionId, Arc<ChatRoom>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the room a connection currently occupies.
    pub async fn get(&self, id: &ConnectionId) -> Option<Arc<ChatRoom>> {
        self.sessions.lock().await.get(id).cloned()
    }

    /// Enter a room, leaving the previous one (if any) in the same step.
    ///
    /// The connection is never observable as a member of zero or two rooms.
    pub async fn enter(
        &self,
        room: &Arc<ChatRoom>,
        participant: ChatParticipant,
        outbox: Outbox,
    ) -> Delivery {
        let id = participant.id;
        let mut sessions = self.sessions.lock().await;

        let delivery = match sessions.get(&id) {
            Some(previous) if !Arc::ptr_eq(previous, room) => {
                let (mut from, mut to) = lock_pair(previous, room).await;
                previous.evict(&mut from, &id);
                info!(
                    "{} moved from room {} to room {}",
                    participant.name,
                    previous.name(),
                    room.name()
                );
                room.admit(&mut to, participant, outbox)
            }
            _ => {
                info!("{} entered room {}", participant.name, room.name());
                room.enter(participant, outbox).await
            }
        };

        sessions.insert(id, Arc::clone(room));
        delivery
    }

    /// Forget a connection and remove it from its room.
    ///
    /// Returns the room that was left, if any.
    pub async fn clear(&self, id: &ConnectionId) -> Option<Arc<ChatRoom>> {
        let mut sessions = self.sessions.lock().await;
        let room = sessions.remove(id)?;
        room.leave(id).await;
        debug!("Cleared session {} (was in {})", id, room.name());
        Some(room)
    }

    /// Get the number of connections currently in a room.
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Lock two distinct rooms in a global (address) order.
///
/// Returns the guards as `(from, to)` regardless of acquisition order.
async fn lock_pair<'a>(
    from: &'a ChatRoom,
    to: &'a ChatRoom,
) -> (MutexGuard<'a, RoomState>, MutexGuard<'a, RoomState>) {
    if (from as *const ChatRoom) < (to as *const ChatRoom) {
        let from_state = from.lock_state().await;
        let to_state = to.lock_state().await;
        (from_state, to_state)
    } else {
        let to_state = to.lock_state().await;
        let from_state = from.lock_state().await;
        (from_state, to_state)
    }
}
