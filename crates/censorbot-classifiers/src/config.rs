//! Classifier configuration

use censorbot_core::{ModerationClassifier, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::baidu::{BaiduConfig, BaiduTextCensor};
use crate::keywords::{KeywordClassifier, KeywordRule};

/// Which classifier backs moderation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "lowercase")]
pub enum ClassifierConfig {
    /// Baidu AIP text censor
    Baidu(BaiduConfig),

    /// Local keyword list
    Keywords {
        #[serde(default)]
        rules: Vec<KeywordRule>,
    },
}

impl ClassifierConfig {
    /// Instantiate the configured classifier
    pub fn build(&self) -> Result<Arc<dyn ModerationClassifier>> {
        let classifier: Arc<dyn ModerationClassifier> = match self {
            Self::Baidu(config) => Arc::new(BaiduTextCensor::new(config.clone())?),
            Self::Keywords { rules } => Arc::new(KeywordClassifier::new(rules.clone())?),
        };
        info!(classifier = classifier.name(), "Classifier initialized");
        Ok(classifier)
    }
}
