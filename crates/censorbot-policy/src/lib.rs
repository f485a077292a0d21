//! censorbot Policy
//!
//! Moderation policy, the operator settings protocol, and the decision
//! engine.
//!
//! - [`PolicyStore`] owns the mutable [`PolicyState`] and persists it after
//!   every change
//! - [`CommandRegistry`] is the declarative table of operator settings
//! - [`DecisionEngine`] maps a verdict plus policy to an [`Action`]
//! - [`ActionExecutor`] carries actions out through a chat gateway

pub mod action;
pub mod command;
pub mod engine;
pub mod executor;
pub mod signature;
pub mod state;
pub mod store;

pub use action::{Action, Disposition};
pub use command::{CommandInput, CommandRegistry, CommandReply, CommandSpec, ReplyKind};
pub use engine::{Decision, DecisionEngine, Exemption, DEFAULT_NOT_RETRACTABLE_CODE};
pub use executor::{ActionExecutor, ActionOutcome};
pub use signature::{SignatureSet, DEFAULT_SIGNATURES};
pub use state::PolicyState;
pub use store::{JsonFileSink, MemorySink, PersistenceSink, PolicyStore, SharedPolicyStore};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::action::Action;
    pub use crate::command::{CommandRegistry, CommandReply};
    pub use crate::engine::{Decision, DecisionEngine};
    pub use crate::executor::{ActionExecutor, ActionOutcome};
    pub use crate::state::PolicyState;
    pub use crate::store::{PersistenceSink, PolicyStore, SharedPolicyStore};
}
