//! Moderation classifier trait

use async_trait::async_trait;

use crate::{Result, Verdict};

/// Remote (or local) content classification oracle
///
/// Implementations return [`crate::Error::Classifier`] on transport or
/// remote failures. Callers do not retry.
#[async_trait]
pub trait ModerationClassifier: Send + Sync {
    /// Classify the given text
    async fn classify(&self, text: &str) -> Result<Verdict>;

    /// Get the classifier name
    fn name(&self) -> &str;
}
