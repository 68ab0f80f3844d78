//! Chat message records.

/// Type of chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageType {
    /// Regular chat message.
    Chat,
    /// Message originating from the room itself (e.g. the welcome line).
    System,
    /// Member joined notification.
    Join,
    /// Member left notification.
    Leave,
}

/// A chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    from: String,
    text: String,
    kind: MessageType,
}

impl ChatMessage {
    /// Create a regular chat message.
    pub fn chat(from: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_kind(MessageType::Chat, from, text)
    }

    /// Create a message sent by a room itself.
    pub fn system(room_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_kind(MessageType::System, room_name, text)
    }

    /// Create a join notification.
    pub fn join(name: impl Into<String>) -> Self {
        let name = name.into();
        let text = format!("{name} joined");
        Self::with_kind(MessageType::Join, name, text)
    }

    /// Create a leave notification.
    pub fn leave(name: impl Into<String>) -> Self {
        let name = name.into();
        let text = format!("{name} left");
        Self::with_kind(MessageType::Leave, name, text)
    }

    fn with_kind(kind: MessageType, from: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            text: text.into(),
            kind,
        }
    }

    /// Sender display name, or the room name for system messages.
    pub fn from(&self) -> &str {
        &self.from
    }

    /// Raw message content.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Format the message as a single display line (without terminator).
    pub fn format(&self) -> String {
        match self.kind {
            MessageType::Chat | MessageType::System => format!("{}>{}", self.from, self.text),
            MessageType::Join | MessageType::Leave => format!("*** {}", self.text),
        }
    }
}
