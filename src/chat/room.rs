//! Chat room implementation for roomchat.
//!
//! A room owns its message history and its member set behind a single
//! mutex. `enter`, `leave` and `broadcast` each hold that lock for their
//! whole duration, so membership changes and broadcasts are linearized and
//! history order is exactly broadcast order.
//!
//! Delivery never blocks: every line is handed to the recipient's bounded
//! [`Outbox`] with `try_send` while the lock is held. Socket writes happen
//! in each connection's writer task.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use super::member::{ChatParticipant, ConnectionId, DeliveryError, Member, Outbox};
use super::message::ChatMessage;
use crate::config::ChatConfig;

/// Default number of messages a room keeps for replay.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Default welcome line sent by a room to each joiner.
pub const DEFAULT_WELCOME_TEXT: &str = "Welcome to my room!";

/// Per-room behaviour settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSettings {
    /// Maximum number of messages retained for replay. Oldest are evicted first.
    pub history_limit: usize,
    /// Text of the welcome message sent to each joiner.
    pub welcome_text: String,
    /// Whether other members are told when someone joins or leaves.
    pub announce_presence: bool,
}

impl RoomSettings {
    /// Build settings from the `[chat]` configuration section.
    pub fn from_config(config: &ChatConfig) -> Self {
        Self {
            history_limit: config.history_limit,
            welcome_text: config.welcome_text.clone(),
            announce_presence: config.announce_presence,
        }
    }
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            welcome_text: DEFAULT_WELCOME_TEXT.to_string(),
            announce_presence: false,
        }
    }
}

/// Outcome of handing lines to members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Number of lines accepted by recipients' queues.
    pub delivered: usize,
    /// One entry per line that could not be queued, naming its recipient.
    pub failed: Vec<ConnectionId>,
}

impl Delivery {
    /// True when no line was lost.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, room: &str, member: &Member, result: Result<(), DeliveryError>) {
        match result {
            Ok(()) => self.delivered += 1,
            Err(e) => {
                warn!(
                    "Delivery to {} ({}) in room {} failed: {}",
                    member.participant.name, member.participant.id, room, e
                );
                self.failed.push(member.participant.id);
            }
        }
    }
}

/// Mutable state of a room, guarded by the room's mutex.
#[derive(Debug, Default)]
pub(crate) struct RoomState {
    history: VecDeque<ChatMessage>,
    members: HashMap<ConnectionId, Member>,
    joins: u64,
}

impl RoomState {
    pub(crate) fn contains(&self, id: &ConnectionId) -> bool {
        self.members.contains_key(id)
    }
}

/// A chat room with history replay and broadcast messaging.
#[derive(Debug)]
pub struct ChatRoom {
    name: String,
    settings: RoomSettings,
    state: Mutex<RoomState>,
}

impl ChatRoom {
    /// Create a new room with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_settings(name, RoomSettings::default())
    }

    /// Create a new room with the given settings.
    pub fn with_settings(name: impl Into<String>, settings: RoomSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            state: Mutex::new(RoomState::default()),
        }
    }

    /// Get the room name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the room settings.
    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    /// Get the number of members.
    pub async fn member_count(&self) -> usize {
        self.state.lock().await.members.len()
    }

    /// Get the members in join order.
    pub async fn members(&self) -> Vec<ChatParticipant> {
        let state = self.state.lock().await;
        let mut members: Vec<&Member> = state.members.values().collect();
        members.sort_by_key(|m| m.seq);
        members.into_iter().map(|m| m.participant.clone()).collect()
    }

    /// Get member names in join order.
    pub async fn member_names(&self) -> Vec<String> {
        self.members().await.into_iter().map(|p| p.name).collect()
    }

    /// Check if a connection is a member of this room.
    pub async fn is_member(&self, id: &ConnectionId) -> bool {
        self.state.lock().await.contains(id)
    }

    /// Get a copy of the retained history, oldest first.
    pub async fn history(&self) -> Vec<ChatMessage> {
        self.state.lock().await.history.iter().cloned().collect()
    }

    /// Enter the room.
    ///
    /// The joiner gets the welcome line and then the full history, oldest
    /// first, before anything broadcast after this call. A line that cannot
    /// be queued is logged and skipped; the join itself always succeeds.
    /// Entering again with the same identity replaces the earlier entry.
    pub async fn enter(&self, participant: ChatParticipant, outbox: Outbox) -> Delivery {
        let mut state = self.state.lock().await;
        self.admit(&mut state, participant, outbox)
    }

    /// Leave the room.
    ///
    /// Returns true if the connection was removed, false if it was not a member.
    pub async fn leave(&self, id: &ConnectionId) -> bool {
        let mut state = self.state.lock().await;
        self.evict(&mut state, id)
    }

    /// Append a message to history and deliver it to every member except the sender.
    pub async fn broadcast(&self, sender: &ChatParticipant, text: impl Into<String>) -> Delivery {
        let message = ChatMessage::chat(&sender.name, text);
        let mut state = self.state.lock().await;

        state.history.push_back(message.clone());
        while state.history.len() > self.settings.history_limit {
            state.history.pop_front();
        }

        let mut delivery = Delivery::default();
        for member in state.members.values() {
            if member.participant.id == sender.id {
                continue;
            }
            delivery.record(&self.name, member, member.outbox.deliver(&message));
        }
        delivery
    }

    pub(crate) async fn lock_state(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().await
    }

    /// Add a member while the caller holds this room's lock.
    pub(crate) fn admit(
        &self,
        state: &mut RoomState,
        mut participant: ChatParticipant,
        outbox: Outbox,
    ) -> Delivery {
        let id = participant.id;
        let reentry = state.members.remove(&id).is_some();
        participant.joined_at = Utc::now();

        if self.settings.announce_presence && !reentry {
            self.announce(state, &ChatMessage::join(&participant.name), &id);
        }

        state.joins += 1;
        let member = Member {
            participant,
            outbox,
            seq: state.joins,
        };

        let mut delivery = Delivery::default();
        let welcome = ChatMessage::system(&self.name, &self.settings.welcome_text);
        delivery.record(&self.name, &member, member.outbox.deliver(&welcome));
        for message in &state.history {
            delivery.record(&self.name, &member, member.outbox.deliver(message));
        }

        debug!(
            "{} ({}) entered room {} ({} history lines replayed)",
            member.participant.name,
            id,
            self.name,
            state.history.len()
        );
        state.members.insert(id, member);
        delivery
    }

    /// Remove a member while the caller holds this room's lock.
    pub(crate) fn evict(&self, state: &mut RoomState, id: &ConnectionId) -> bool {
        match state.members.remove(id) {
            Some(member) => {
                debug!(
                    "{} ({}) left room {}",
                    member.participant.name, id, self.name
                );
                if self.settings.announce_presence {
                    self.announce(state, &ChatMessage::leave(&member.participant.name), id);
                }
                true
            }
            None => false,
        }
    }

    fn announce(&self, state: &RoomState, message: &ChatMessage, subject: &ConnectionId) {
        let mut delivery = Delivery::default();
        for member in state.members.values() {
            if &member.participant.id != subject {
                delivery.record(&self.name, member, member.outbox.deliver(message));
            }
        }
    }
}
