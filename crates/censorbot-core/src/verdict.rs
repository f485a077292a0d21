//! Classification verdicts

use serde::{Deserialize, Serialize};

/// Three-tier outcome of content classification
///
/// The vocabulary is owned by the remote service and may grow, so values
/// this crate does not know about are kept as [`ComplianceLevel::Unrecognized`]
/// and never lead to an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplianceLevel {
    Compliant,
    Suspected,
    NonCompliant,
    Unrecognized(String),
}

impl ComplianceLevel {
    /// Whether the level may lead to a notification at all
    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::Suspected | Self::NonCompliant)
    }
}

/// Verdict returned by a moderation classifier for one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub level: ComplianceLevel,

    /// Human readable reason; present iff the level is not compliant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Verdict {
    pub fn compliant() -> Self {
        Self {
            level: ComplianceLevel::Compliant,
            reason: None,
        }
    }

    pub fn suspected(reason: impl Into<String>) -> Self {
        Self {
            level: ComplianceLevel::Suspected,
            reason: Some(reason.into()),
        }
    }

    pub fn non_compliant(reason: impl Into<String>) -> Self {
        Self {
            level: ComplianceLevel::NonCompliant,
            reason: Some(reason.into()),
        }
    }

    pub fn unrecognized(level: impl Into<String>, reason: Option<String>) -> Self {
        Self {
            level: ComplianceLevel::Unrecognized(level.into()),
            reason,
        }
    }

    /// Reason text, or an empty string when none was given
    pub fn reason_text(&self) -> &str {
        self.reason.as_deref().unwrap_or_default()
    }
}
