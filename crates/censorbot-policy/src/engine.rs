//! Moderation decision engine
//!
//! Turns one group message plus the current policy into at most one
//! [`Action`]:
//!
//! 1. short messages and whitelisted senders are exempt (no classifier call)
//! 2. the classifier produces a verdict
//! 3. compliant or unrecognized verdicts are ignored
//! 4. anything else notifies; retraction needs `revoke`, an actionable level
//!    and either `censor_all` or a signature match on the reason
//!
//! The engine also owns the learning step: a retraction the gateway reports
//! as "not retractable" whitelists the sender.

use censorbot_core::{
    ComplianceLevel, GatewayReply, GroupMessage, ModerationClassifier, Result, UserId, Verdict,
};
use std::time::Instant;
use tracing::{debug, info};

use crate::action::Action;
use crate::signature::SignatureSet;
use crate::state::PolicyState;
use crate::store::SharedPolicyStore;

/// IOTQQ `Ret` code for "No message meets the requirements"
pub const DEFAULT_NOT_RETRACTABLE_CODE: i64 = 1001;

/// Why a message was not classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exemption {
    /// Shorter than `min_length` characters
    TooShort,
    /// Sender is whitelisted
    Whitelisted,
}

impl Exemption {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TooShort => "too_short",
            Self::Whitelisted => "whitelisted",
        }
    }
}

/// Outcome of evaluating one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Not classified
    Exempt(Exemption),
    /// Classified, nothing to do
    Ignore(ComplianceLevel),
    /// Classified as offending
    Act(Action),
}

impl Decision {
    /// The action, if any
    pub fn action(&self) -> Option<&Action> {
        match self {
            Self::Act(action) => Some(action),
            _ => None,
        }
    }

    pub fn into_action(self) -> Option<Action> {
        match self {
            Self::Act(action) => Some(action),
            _ => None,
        }
    }
}

/// Decision engine configuration
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    signatures: SignatureSet,
    not_retractable_code: i64,
}

impl DecisionEngine {
    /// Create an engine with the given signatures
    pub fn new(signatures: SignatureSet) -> Self {
        Self {
            signatures,
            not_retractable_code: DEFAULT_NOT_RETRACTABLE_CODE,
        }
    }

    /// Override the gateway status code that triggers whitelist learning
    pub fn with_not_retractable_code(mut self, code: i64) -> Self {
        self.not_retractable_code = code;
        self
    }

    pub fn signatures(&self) -> &SignatureSet {
        &self.signatures
    }

    pub fn not_retractable_code(&self) -> i64 {
        self.not_retractable_code
    }

    /// Exemption that applies to `message`, if any
    pub fn exemption(&self, message: &GroupMessage, state: &PolicyState) -> Option<Exemption> {
        let len = i64::try_from(message.char_len()).unwrap_or(i64::MAX);
        if len < state.min_length {
            Some(Exemption::TooShort)
        } else if state.is_whitelisted(message.sender_id) {
            Some(Exemption::Whitelisted)
        } else {
            None
        }
    }

    /// Whether a verdict leads to retraction under `state`
    pub fn should_retract(&self, verdict: &Verdict, state: &PolicyState) -> bool {
        let level_qualifies = match verdict.level {
            ComplianceLevel::NonCompliant => true,
            ComplianceLevel::Suspected => state.more_sensitive,
            ComplianceLevel::Compliant | ComplianceLevel::Unrecognized(_) => false,
        };

        state.revoke
            && level_qualifies
            && (state.censor_all || self.signatures.matches(verdict.reason_text()))
    }

    /// Map a verdict to a decision
    pub fn decide(&self, message: &GroupMessage, verdict: &Verdict, state: &PolicyState) -> Decision {
        if !verdict.level.is_actionable() {
            return Decision::Ignore(verdict.level.clone());
        }

        let retract = self.should_retract(verdict, state);
        Decision::Act(Action::new(message, verdict.reason_text(), retract))
    }

    /// Check exemptions, classify, and decide
    ///
    /// Works on a snapshot of the policy so no lock is held while the
    /// classifier runs. Classifier failures are returned to the caller.
    pub async fn evaluate(
        &self,
        message: &GroupMessage,
        store: &SharedPolicyStore,
        classifier: &dyn ModerationClassifier,
    ) -> Result<Decision> {
        let state = { store.read().state().clone() };

        if let Some(exemption) = self.exemption(message, &state) {
            debug!(
                sender = message.sender_id,
                reason = exemption.as_str(),
                "Message exempt from moderation"
            );
            return Ok(Decision::Exempt(exemption));
        }

        let start = Instant::now();
        let verdict = classifier.classify(&message.content).await?;
        info!(
            classifier = classifier.name(),
            sender = message.sender_id,
            group = message.group_id,
            level = ?verdict.level,
            reason = verdict.reason_text(),
            latency_us = start.elapsed().as_micros() as u64,
            "Message classified"
        );

        Ok(self.decide(message, &verdict, &state))
    }

    /// Whether a retraction reply is the "not retractable" signal
    pub fn is_not_retractable(&self, reply: &GatewayReply) -> bool {
        reply.has_status(self.not_retractable_code)
    }

    /// Whitelist `sender` if the retraction reply is the "not retractable" signal
    ///
    /// Returns whether the sender was newly whitelisted. Persistence failures
    /// are logged by the store and leave the in-memory whitelist updated.
    pub fn learn_from_retraction(
        &self,
        sender: UserId,
        reply: &GatewayReply,
        store: &SharedPolicyStore,
    ) -> bool {
        if !self.is_not_retractable(reply) {
            return false;
        }

        let mut guard = store.write();
        match guard.whitelist_add(sender) {
            Ok(added) => added,
            Err(_) => guard.state().is_whitelisted(sender),
        }
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(SignatureSet::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: &str) -> GroupMessage {
        GroupMessage::text(100, 12345, text)
    }

    fn state() -> PolicyState {
        PolicyState::default()
    }

    #[test]
    fn test_exemptions() {
        let engine = DecisionEngine::default();
        let mut state = state();
        assert_eq!(engine.exemption(&message("短消息"), &state), Some(Exemption::TooShort));
        assert_eq!(engine.exemption(&message("long enough message"), &state), None);

        state.whitelist.insert(12345);
        assert_eq!(
            engine.exemption(&message("long enough message"), &state),
            Some(Exemption::Whitelisted)
        );

        state.min_length = -1;
        state.whitelist.clear();
        assert_eq!(engine.exemption(&message(""), &state), None);
    }

    #[test]
    fn test_compliant_and_unrecognized_ignored() {
        let engine = DecisionEngine::default();
        let msg = message("buy cheap followers now");
        assert_eq!(
            engine.decide(&msg, &Verdict::compliant(), &state()),
            Decision::Ignore(ComplianceLevel::Compliant)
        );
        let decision = engine.decide(
            &msg,
            &Verdict::unrecognized("审核失败", Some("恶意推广".into())),
            &state(),
        );
        assert!(decision.action().is_none());
    }

    #[test]
    fn test_signature_controls_retraction() {
        let engine = DecisionEngine::default();
        let msg = message("buy cheap followers now");

        let action = engine
            .decide(&msg, &Verdict::non_compliant("malicious promotion"), &state())
            .into_action()
            .unwrap();
        assert!(action.notify && action.retract);

        let action = engine
            .decide(&msg, &Verdict::non_compliant("off-topic spam"), &state())
            .into_action()
            .unwrap();
        assert!(action.notify);
        assert!(!action.retract);
    }

    #[test]
    fn test_censor_all_retracts_every_category() {
        let engine = DecisionEngine::default();
        let mut state = state();
        state.censor_all = true;
        assert!(engine.should_retract(&Verdict::non_compliant("off-topic spam"), &state));
    }

    #[test]
    fn test_revoke_off_never_retracts() {
        let engine = DecisionEngine::default();
        let mut state = state();
        state.revoke = false;
        state.censor_all = true;
        let action = engine
            .decide(&message("buy cheap followers now"), &Verdict::non_compliant("恶意推广"), &state)
            .into_action()
            .unwrap();
        assert!(action.notify);
        assert!(!action.retract);
    }

    #[test]
    fn test_suspected_needs_more_sensitive() {
        let engine = DecisionEngine::default();
        let mut state = state();
        state.censor_all = true;
        let verdict = Verdict::suspected("疑似存在恶意推广不合规");

        assert!(!engine.should_retract(&verdict, &state));
        state.more_sensitive = true;
        assert!(engine.should_retract(&verdict, &state));
    }

    #[test]
    fn test_not_retractable_signal() {
        let engine = DecisionEngine::default();
        assert!(engine.is_not_retractable(&GatewayReply::status(1001, "No message meets the requirements")));
        assert!(!engine.is_not_retractable(&GatewayReply::status(1002, "other")));
        assert!(!engine.is_not_retractable(&GatewayReply::ok()));

        let engine = engine.with_not_retractable_code(34);
        assert!(engine.is_not_retractable(&GatewayReply::status(34, "")));
    }
}
