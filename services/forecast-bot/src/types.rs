//! Core types shared across the forecast bot
//!
//! Identities, feed rounds, and the crate error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Telegram chat identifier (private chat, group, or channel)
///
/// Kept as a string: the Bot API accepts both numeric ids and `@channel`
/// usernames, and the allow-list is configured from environment text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ChatId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// An operator is identified by its private chat with the bot
pub type OperatorId = ChatId;

/// Handle to a sent message, needed to edit it in place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: i64,
}

/// Latest round reported by the result feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    /// Round identifier, decimal-string-like
    pub issue: String,
    /// Outcome number (a digit 0..=9 in practice)
    pub number: u32,
}

impl Round {
    pub fn new(issue: impl Into<String>, number: u32) -> Self {
        Self {
            issue: issue.into(),
            number,
        }
    }
}

/// Error types for the forecast bot
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("Result feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("Messaging gateway error: {0}")]
    Gateway(String),

    #[error("Unknown operator: {0}")]
    UnknownOperator(ChatId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid session transition: {0}")]
    InvalidTransition(String),
}

/// Result type for forecast bot operations
pub type Result<T> = std::result::Result<T, BotError>;
