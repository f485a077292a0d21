//! Mutable moderation policy

use censorbot_core::UserId;
use std::collections::BTreeSet;

/// The moderation settings an operator can change at runtime
///
/// Defaults come from the command table (see [`crate::CommandRegistry::defaults`]),
/// so a new setting only needs a new command descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyState {
    /// Senders exempt from moderation
    pub whitelist: BTreeSet<UserId>,

    /// Whether offending messages may be retracted (otherwise notify only)
    pub revoke: bool,

    /// Retract every offending category, not only the signature categories
    pub censor_all: bool,

    /// Treat "suspected" verdicts like "non-compliant" ones
    pub more_sensitive: bool,

    /// Messages shorter than this many characters are not classified
    pub min_length: i64,
}

impl PolicyState {
    /// State with every field zeroed, before defaults are applied
    pub(crate) fn blank() -> Self {
        Self {
            whitelist: BTreeSet::new(),
            revoke: false,
            censor_all: false,
            more_sensitive: false,
            min_length: 0,
        }
    }

    /// Whether `user` is exempt from moderation
    pub fn is_whitelisted(&self, user: UserId) -> bool {
        self.whitelist.contains(&user)
    }

    /// Add `user` if absent, remove it if present
    pub fn toggle_whitelist(&mut self, user: UserId) {
        if !self.whitelist.remove(&user) {
            self.whitelist.insert(user);
        }
    }
}

impl Default for PolicyState {
    fn default() -> Self {
        crate::CommandRegistry::builtin().defaults()
    }
}
