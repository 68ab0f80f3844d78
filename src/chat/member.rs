//! Room members and their outbound queues.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use super::message::ChatMessage;

/// Line terminator used for every outbound line.
pub const LINE_ENDING: &str = "\r\n";

/// Unique identity of one active connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Allocate a fresh identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A chat participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatParticipant {
    /// Connection identity.
    pub id: ConnectionId,
    /// Display name.
    pub name: String,
    /// Time the participant entered its current room.
    pub joined_at: DateTime<Utc>,
}

impl ChatParticipant {
    /// Create a new participant.
    pub fn new(id: ConnectionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            joined_at: Utc::now(),
        }
    }
}

/// Reason a line could not be handed to a member.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The member's outbound queue is full (slow client).
    #[error("outbound queue full")]
    Full,
    /// The member's writer has gone away.
    #[error("recipient disconnected")]
    Closed,
}

impl<T> From<TrySendError<T>> for DeliveryError {
    fn from(e: TrySendError<T>) -> Self {
        match e {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        }
    }
}

/// Bounded outbound queue of one connection.
///
/// Rooms only ever use the non-blocking `push_*`/`deliver` methods, so a slow
/// reader can lose lines but can never stall the room.
#[derive(Debug, Clone)]
pub struct Outbox {
    sender: mpsc::Sender<Vec<u8>>,
}

impl Outbox {
    /// Create an outbox and the receiver its writer task drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Hand a message to the queue without waiting.
    pub fn deliver(&self, message: &ChatMessage) -> Result<(), DeliveryError> {
        self.push_line(&message.format())
    }

    /// Queue one line without waiting.
    pub fn push_line(&self, line: &str) -> Result<(), DeliveryError> {
        self.sender.try_send(terminated(line))?;
        Ok(())
    }

    /// Queue one line, waiting for capacity.
    ///
    /// Used by a connection for replies to its own commands.
    pub async fn send_line(&self, line: &str) -> Result<(), DeliveryError> {
        self.send_raw(terminated(line)).await
    }

    /// Queue raw bytes (prompts, echo), waiting for capacity.
    pub async fn send_raw(&self, bytes: Vec<u8>) -> Result<(), DeliveryError> {
        self.sender
            .send(bytes)
            .await
            .map_err(|_| DeliveryError::Closed)
    }

    /// Check whether the writer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

fn terminated(line: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(line.len() + LINE_ENDING.len());
    bytes.extend_from_slice(line.as_bytes());
    bytes.extend_from_slice(LINE_ENDING.as_bytes());
    bytes
}

/// A participant paired with its outbound queue.
#[derive(Debug, Clone)]
pub(crate) struct Member {
    pub(crate) participant: ChatParticipant,
    pub(crate) outbox: Outbox,
    /// Position in the room's join sequence.
    pub(crate) seq: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string(), a.as_uuid().to_string());
    }

    #[test]
    fn test_participant_new() {
        let id = ConnectionId::new();
        let participant = ChatParticipant::new(id, "alice");
        assert_eq!(participant.id, id);
        assert_eq!(participant.name, "alice");
    }

    #[tokio::test]
    async fn test_outbox_deliver_appends_line_ending() {
        let (outbox, mut rx) = Outbox::channel(4);
        outbox.deliver(&ChatMessage::chat("B", "hello")).unwrap();
        assert_eq!(rx.recv().await.unwrap(), b"B>hello\r\n".to_vec());
    }

    #[tokio::test]
    async fn test_outbox_full() {
        let (outbox, _rx) = Outbox::channel(1);
        outbox.push_line("one").unwrap();
        assert_eq!(outbox.push_line("two"), Err(DeliveryError::Full));
    }

    #[tokio::test]
    async fn test_outbox_closed() {
        let (outbox, rx) = Outbox::channel(4);
        drop(rx);
        assert!(outbox.is_closed());
        assert_eq!(outbox.push_line("hello"), Err(DeliveryError::Closed));
        assert_eq!(outbox.send_line("hello").await, Err(DeliveryError::Closed));
    }

    #[tokio::test]
    async fn test_outbox_send_raw_is_verbatim() {
        let (outbox, mut rx) = Outbox::channel(4);
        outbox.send_raw(b"Nickname: ".to_vec()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), b"Nickname: ".to_vec());
    }
}
