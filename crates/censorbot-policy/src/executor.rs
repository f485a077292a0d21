//! Action executor
//!
//! Carries out an [`Action`] against the chat gateway. The operator is
//! notified first so they hear about the message even when retraction fails;
//! a notification failure never prevents the retraction attempt. Delivery is
//! best effort with a single attempt per call.

use censorbot_core::{ChatGateway, UserId};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::action::Action;
use crate::engine::DecisionEngine;
use crate::store::SharedPolicyStore;

/// Result of executing one action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Operator notification was accepted by the gateway
    pub notified: bool,

    /// Retraction was attempted
    pub retract_attempted: bool,

    /// Retraction was accepted by the gateway
    pub retracted: bool,

    /// Sender was whitelisted after a "not retractable" reply
    pub learned: bool,
}

impl ActionOutcome {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Executes actions on behalf of the event router
pub struct ActionExecutor {
    operator: UserId,
    engine: Arc<DecisionEngine>,
}

impl ActionExecutor {
    /// Create an executor reporting to `operator`
    pub fn new(operator: UserId, engine: Arc<DecisionEngine>) -> Self {
        Self { operator, engine }
    }

    pub fn operator(&self) -> UserId {
        self.operator
    }

    /// Notify, then retract if requested, then learn from the retraction reply
    pub async fn execute(
        &self,
        action: &Action,
        gateway: &dyn ChatGateway,
        store: &SharedPolicyStore,
    ) -> ActionOutcome {
        let mut outcome = ActionOutcome::new();
        let group = action.target.group_id;

        if action.notify {
            match gateway
                .send_message(self.operator, Some(group), &action.reason_text)
                .await
            {
                Ok(reply) if reply.is_success() => {
                    outcome.notified = true;
                    info!(operator = self.operator, group, "Operator notified");
                }
                Ok(reply) => warn!(
                    operator = self.operator,
                    ret = ?reply.ret,
                    msg = ?reply.msg,
                    "Operator notification rejected"
                ),
                Err(e) => warn!(operator = self.operator, error = %e, "Operator notification failed"),
            }
        }

        if !action.retract {
            return outcome;
        }

        outcome.retract_attempted = true;
        match gateway.retract_message(action.target).await {
            Ok(reply) if reply.is_success() => {
                outcome.retracted = true;
                info!(
                    sender = action.sender,
                    group,
                    seq = action.target.seq,
                    "Offending message retracted"
                );
            }
            Ok(reply) => {
                warn!(
                    sender = action.sender,
                    group,
                    ret = ?reply.ret,
                    msg = ?reply.msg,
                    "Retraction rejected"
                );
                if self.engine.learn_from_retraction(action.sender, &reply, store) {
                    info!(sender = action.sender, "Sender whitelisted after unretractable message");
                    outcome.learned = true;
                } else {
                    debug!(sender = action.sender, "Retraction failure not learned from");
                }
            }
            Err(e) => warn!(sender = action.sender, group, error = %e, "Retraction failed"),
        }

        outcome
    }
}
