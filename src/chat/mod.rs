//! Chat module for roomchat.
//!
//! This module provides the room/session broadcast subsystem:
//! - Chat rooms with history replay and broadcast messaging
//! - Member management keyed by connection identity
//! - The room directory and the session registry
//! - Chat commands (/enter, /leave, /exit, /list, /create, /who, /help)

mod command;
mod directory;
mod member;
mod message;
mod registry;
mod room;

pub use command::{
    format_help, format_room_list, format_who, get_command_help, parse_input, ChatCommand,
    ChatInput, CommandInfo,
};
pub use directory::{
    validate_room_name, RoomDirectory, RoomInfo, DEFAULT_ROOMS, MAX_ROOM_NAME_LENGTH,
};
pub use member::{ChatParticipant, ConnectionId, DeliveryError, Outbox, LINE_ENDING};
pub use message::ChatMessage;
pub use registry::SessionRegistry;
pub use room::{
    ChatRoom, Delivery, RoomSettings, DEFAULT_HISTORY_LIMIT, DEFAULT_WELCOME_TEXT,
};
