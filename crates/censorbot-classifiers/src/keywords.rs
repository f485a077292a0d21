//! Keyword classifier
//!
//! Offline classifier matching configured phrases with Aho-Corasick. Useful
//! when no censor service credentials are available.

use aho_corasick::AhoCorasick;
use async_trait::async_trait;
use censorbot_core::{Error, ModerationClassifier, Result, Verdict};
use serde::{Deserialize, Serialize};

/// Verdict tier a keyword maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeywordLevel {
    #[default]
    NonCompliant,
    Suspected,
}

/// One keyword rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Phrase to look for (ASCII case-insensitive)
    pub pattern: String,

    /// Reason reported when the phrase matches
    pub reason: String,

    #[serde(default)]
    pub level: KeywordLevel,
}

impl KeywordRule {
    pub fn new(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            reason: reason.into(),
            level: KeywordLevel::NonCompliant,
        }
    }

    pub fn suspected(mut self) -> Self {
        self.level = KeywordLevel::Suspected;
        self
    }
}

/// Promotion phrases used when no other rules are configured
pub fn builtin_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule::new("恶意推广", "存在恶意推广"),
        KeywordRule::new("加我微信", "存在恶意推广"),
        KeywordRule::new("兼职刷单", "存在恶意推广"),
        KeywordRule::new("刷单返利", "存在恶意推广"),
        KeywordRule::new("cheap followers", "malicious promotion"),
        KeywordRule::new("加微信", "疑似恶意推广").suspected(),
        KeywordRule::new("代刷", "疑似恶意推广").suspected(),
    ]
}

/// Classifier reporting the first matching keyword rule
pub struct KeywordClassifier {
    matcher: AhoCorasick,
    rules: Vec<KeywordRule>,
}

impl KeywordClassifier {
    /// Build a classifier from rules
    ///
    /// Rules with an empty pattern are dropped. A classifier left without
    /// rules is rejected, it could never flag a message.
    pub fn new(rules: Vec<KeywordRule>) -> Result<Self> {
        let rules: Vec<KeywordRule> = rules.into_iter().filter(|r| !r.pattern.is_empty()).collect();
        if rules.is_empty() {
            return Err(Error::config("keyword classifier has no rules"));
        }

        let matcher = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(rules.iter().map(|r| r.pattern.as_str()))
            .map_err(|e| Error::classifier(format!("Failed to build keyword matcher: {}", e)))?;

        Ok(Self { matcher, rules })
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }
}

#[async_trait]
impl ModerationClassifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Result<Verdict> {
        let Some(hit) = self.matcher.find(text) else {
            return Ok(Verdict::compliant());
        };

        let rule = &self.rules[hit.pattern().as_usize()];
        Ok(match rule.level {
            KeywordLevel::NonCompliant => Verdict::non_compliant(rule.reason.clone()),
            KeywordLevel::Suspected => Verdict::suspected(rule.reason.clone()),
        })
    }

    fn name(&self) -> &str {
        "keywords"
    }
}
