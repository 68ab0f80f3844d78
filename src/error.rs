//! Error types for roomchat.

use thiserror::Error;

use crate::chat::DeliveryError;

/// Common error type for roomchat.
#[derive(Error, Debug)]
pub enum ChatError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Resource already exists.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// A line could not be handed to a member's outbound queue.
    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for roomchat operations.
pub type Result<T> = std::result::Result<T, ChatError>;
