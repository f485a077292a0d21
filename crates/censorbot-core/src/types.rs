//! Core types for censorbot

use serde::{Deserialize, Serialize};

/// Chat platform user identifier (a QQ number)
pub type UserId = i64;

/// Chat platform group identifier
pub type GroupId = i64;

/// Message type tag attached to every chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    /// Plain text (`TextMsg`)
    Text,
    /// Anything else: pictures, voice, stickers, ...
    Other(String),
}

impl MessageKind {
    /// Wire tag for plain text messages
    pub const TEXT_TAG: &'static str = "TextMsg";

    /// Whether this is a plain text message
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text)
    }

    /// Wire tag of this message kind
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => Self::TEXT_TAG,
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for MessageKind {
    fn from(tag: String) -> Self {
        if tag == Self::TEXT_TAG {
            Self::Text
        } else {
            Self::Other(tag)
        }
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Reference to a posted group message, needed to retract it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    /// Group the message was posted in
    pub group_id: GroupId,

    /// Per-group sequence number
    pub seq: i64,

    /// Random nonce paired with the sequence number
    pub random: i64,
}

/// A message posted in a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMessage {
    pub group_id: GroupId,
    pub group_name: String,
    pub sender_id: UserId,
    pub sender_nick: String,
    pub content: String,
    pub kind: MessageKind,
    pub seq: i64,
    pub random: i64,
}

impl GroupMessage {
    /// Create a plain text group message
    pub fn text(group_id: GroupId, sender_id: UserId, content: impl Into<String>) -> Self {
        Self {
            group_id,
            group_name: String::new(),
            sender_id,
            sender_nick: String::new(),
            content: content.into(),
            kind: MessageKind::Text,
            seq: 0,
            random: 0,
        }
    }

    /// Attach group and sender display names
    pub fn with_names(mut self, group_name: impl Into<String>, sender_nick: impl Into<String>) -> Self {
        self.group_name = group_name.into();
        self.sender_nick = sender_nick.into();
        self
    }

    /// Attach the sequence/nonce pair used for retraction
    pub fn with_seq(mut self, seq: i64, random: i64) -> Self {
        self.seq = seq;
        self.random = random;
        self
    }

    /// Reference used to retract this message
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            group_id: self.group_id,
            seq: self.seq,
            random: self.random,
        }
    }

    /// Length of the content in characters
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// A direct (friend) message sent to the bot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateMessage {
    pub sender_id: UserId,
    pub content: String,
    pub kind: MessageKind,
}

impl PrivateMessage {
    /// Create a plain text private message
    pub fn text(sender_id: UserId, content: impl Into<String>) -> Self {
        Self {
            sender_id,
            content: content.into(),
            kind: MessageKind::Text,
        }
    }
}

/// Any other platform notification (joins, recalls, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherEvent {
    /// Platform event name
    pub name: String,

    /// Raw event payload
    pub payload: serde_json::Value,
}

/// An event delivered by the chat transport
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Group(GroupMessage),
    Private(PrivateMessage),
    Other(OtherEvent),
}

impl InboundEvent {
    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Group(_) => "group",
            Self::Private(_) => "private",
            Self::Other(_) => "other",
        }
    }
}
