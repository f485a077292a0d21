//! Moderation actions

use censorbot_core::{GroupMessage, MessageRef, UserId};
use serde::{Deserialize, Serialize};

/// What happens to an offending message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Operator is told, message stays
    NotifyOnly,
    /// Operator is told and the message is retracted
    Retract,
}

impl Disposition {
    /// Operator-facing label
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotifyOnly => "无",
            Self::Retract => "撤回",
        }
    }

    /// Label used for metrics
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::NotifyOnly => "notify",
            Self::Retract => "retract",
        }
    }
}

/// Action produced for one classified group message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Report to the operator
    pub notify: bool,

    /// Retract the message
    pub retract: bool,

    /// Operator notification text
    pub reason_text: String,

    /// Author of the message
    pub sender: UserId,

    /// Message to retract
    pub target: MessageRef,
}

impl Action {
    /// Build the action for `message`
    pub fn new(message: &GroupMessage, reason: &str, retract: bool) -> Self {
        let disposition = if retract {
            Disposition::Retract
        } else {
            Disposition::NotifyOnly
        };

        Self {
            notify: true,
            retract,
            reason_text: compose_report(message, reason, disposition),
            sender: message.sender_id,
            target: message.message_ref(),
        }
    }

    pub fn disposition(&self) -> Disposition {
        if self.retract {
            Disposition::Retract
        } else {
            Disposition::NotifyOnly
        }
    }
}

/// Operator report for an offending message
pub fn compose_report(message: &GroupMessage, reason: &str, disposition: Disposition) -> String {
    format!(
        "{}({})发表于{}({})的内容不合规。原因：{}；原文：\n{}\n处理方式：{}",
        message.sender_nick,
        message.sender_id,
        message.group_name,
        message.group_id,
        reason,
        message.content,
        disposition.label()
    )
}
