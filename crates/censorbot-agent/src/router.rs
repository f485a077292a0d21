//! Event router
//!
//! Consumes inbound events from the ingress channel and dispatches each one
//! on its own task. Group messages go through the decision engine and the
//! action executor; operator direct messages are settings commands.

use censorbot_core::{
    ChatGateway, GroupMessage, InboundEvent, ModerationClassifier, OtherEvent, PrivateMessage,
    UserId,
};
use censorbot_policy::{ActionExecutor, Decision, DecisionEngine, SharedPolicyStore};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Routes inbound events to moderation or the settings protocol
pub struct EventRouter {
    store: SharedPolicyStore,
    engine: Arc<DecisionEngine>,
    executor: ActionExecutor,
    classifier: Arc<dyn ModerationClassifier>,
    gateway: Arc<dyn ChatGateway>,
}

impl EventRouter {
    pub fn new(
        operator: UserId,
        store: SharedPolicyStore,
        engine: Arc<DecisionEngine>,
        classifier: Arc<dyn ModerationClassifier>,
        gateway: Arc<dyn ChatGateway>,
    ) -> Self {
        Self {
            executor: ActionExecutor::new(operator, engine.clone()),
            store,
            engine,
            classifier,
            gateway,
        }
    }

    pub fn operator(&self) -> UserId {
        self.executor.operator()
    }

    /// Handle events until the channel closes, then wait for in-flight tasks
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<InboundEvent>) {
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        let router = Arc::clone(&self);
                        tasks.spawn(async move { router.dispatch(event).await });
                    }
                    None => break,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Event task failed");
                    }
                }
            }
        }

        info!(in_flight = tasks.len(), "Event channel closed, draining");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Event task failed");
            }
        }
    }

    /// Handle one event
    pub async fn dispatch(&self, event: InboundEvent) {
        metrics::counter!("censorbot_events_total", "kind" => event.kind()).increment(1);
        match event {
            InboundEvent::Group(message) => self.on_group_event(message).await,
            InboundEvent::Private(message) => self.on_private_event(message).await,
            InboundEvent::Other(event) => self.on_other_event(event),
        }
    }

    /// Moderate a group message
    pub async fn on_group_event(&self, message: GroupMessage) {
        if !message.kind.is_text() {
            debug!(kind = message.kind.as_str(), "Skipping non-text group message");
            return;
        }

        let start = Instant::now();
        let decision = self
            .engine
            .evaluate(&message, &self.store, self.classifier.as_ref())
            .await;

        let action = match decision {
            Ok(Decision::Act(action)) => {
                metrics::histogram!("censorbot_classifier_latency_us")
                    .record(start.elapsed().as_micros() as f64);
                action
            }
            Ok(Decision::Ignore(level)) => {
                metrics::histogram!("censorbot_classifier_latency_us")
                    .record(start.elapsed().as_micros() as f64);
                debug!(sender = message.sender_id, level = ?level, "No action");
                return;
            }
            Ok(Decision::Exempt(_)) => return,
            Err(e) => {
                metrics::counter!("censorbot_errors_total", "kind" => e.kind()).increment(1);
                warn!(
                    sender = message.sender_id,
                    group = message.group_id,
                    error = %e,
                    "Classification failed, no action taken"
                );
                return;
            }
        };

        metrics::counter!("censorbot_actions_total", "disposition" => action.disposition().metric_label())
            .increment(1);
        let outcome = self
            .executor
            .execute(&action, self.gateway.as_ref(), &self.store)
            .await;
        if action.notify && !outcome.notified {
            metrics::counter!("censorbot_errors_total", "kind" => "notify").increment(1);
        }
        if outcome.retract_attempted && !outcome.retracted {
            metrics::counter!("censorbot_errors_total", "kind" => "retract").increment(1);
        }
    }

    /// Apply an operator settings command and reply with the result
    pub async fn on_private_event(&self, message: PrivateMessage) {
        if message.sender_id != self.operator() {
            debug!(sender = message.sender_id, "Ignoring direct message from non-operator");
            return;
        }
        if !message.kind.is_text() {
            debug!(kind = message.kind.as_str(), "Ignoring non-text operator message");
            return;
        }

        let reply = self.store.write().handle_command(&message.content);
        info!(kind = ?reply.kind, "Operator command handled");

        match self.gateway.send_message(message.sender_id, None, &reply.text).await {
            Ok(status) if status.is_success() => {}
            Ok(status) => {
                metrics::counter!("censorbot_errors_total", "kind" => "reply").increment(1);
                warn!(ret = ?status.ret, msg = ?status.msg, "Command reply rejected");
            }
            Err(e) => {
                metrics::counter!("censorbot_errors_total", "kind" => e.kind()).increment(1);
                warn!(error = %e, "Command reply failed");
            }
        }
    }

    pub fn on_other_event(&self, event: OtherEvent) {
        debug!(name = %event.name, payload = %event.payload, "Other event");
    }
}
