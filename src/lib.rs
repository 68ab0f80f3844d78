//! roomchat - a multi-room chat server.
//!
//! Clients connect over plain TCP or SSH, pick a nickname, and move between
//! named rooms. Each room replays its recent history to joiners and relays
//! every message to the other members.

pub mod app;
pub mod chat;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;

pub use app::{ChatApp, SessionHandler, SessionOptions};
pub use chat::{
    ChatCommand, ChatInput, ChatMessage, ChatParticipant, ChatRoom, ConnectionId, Delivery,
    DeliveryError, Outbox, RoomDirectory, RoomInfo, RoomSettings, SessionRegistry,
};
pub use config::Config;
pub use error::{ChatError, Result};
pub use server::{ChatListener, EchoMode, InputResult, LineBuffer};
