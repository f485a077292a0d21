//! censorbot Core
//!
//! Core types, traits, and utilities shared across censorbot components.
//!
//! This crate provides:
//! - Chat event types (group, private, other) and identifiers
//! - Classification verdicts
//! - Error types and result handling
//! - Collaborator traits for the classifier and the chat gateway

pub mod classifier;
pub mod error;
pub mod gateway;
pub mod types;
pub mod verdict;

pub use classifier::ModerationClassifier;
pub use error::{Error, Result};
pub use gateway::{ChatGateway, GatewayReply};
pub use types::{
    GroupId, GroupMessage, InboundEvent, MessageKind, MessageRef, OtherEvent, PrivateMessage,
    UserId,
};
pub use verdict::{ComplianceLevel, Verdict};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::classifier::ModerationClassifier;
    pub use crate::error::{Error, Result};
    pub use crate::gateway::{ChatGateway, GatewayReply};
    pub use crate::types::{GroupMessage, InboundEvent, MessageKind, PrivateMessage, UserId};
    pub use crate::verdict::{ComplianceLevel, Verdict};
}
