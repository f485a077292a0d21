//! High-confidence category signatures
//!
//! Reason texts from the censor service are free-form. A verdict whose reason
//! contains one of the configured signatures is retracted even when
//! `censor_all` is off.

use aho_corasick::AhoCorasick;
use censorbot_core::{Error, Result};

/// Signatures used when none are configured
pub const DEFAULT_SIGNATURES: &[&str] = &["恶意推广", "malicious promotion"];

/// Set of substrings matched against verdict reasons (ASCII case-insensitive)
#[derive(Debug, Clone)]
pub struct SignatureSet {
    patterns: Vec<String>,
    matcher: AhoCorasick,
}

impl SignatureSet {
    /// Build a matcher for the given signatures
    pub fn new<I, S>(signatures: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = signatures
            .into_iter()
            .map(Into::into)
            .filter(|s| !s.is_empty())
            .collect();

        let matcher = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&patterns)
            .map_err(|e| Error::config(format!("Failed to build signature matcher: {}", e)))?;

        Ok(Self { patterns, matcher })
    }

    /// Configured signatures
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Signature found in `reason`, if any
    pub fn find<'a>(&'a self, reason: &str) -> Option<&'a str> {
        self.matcher
            .find(reason)
            .map(|m| self.patterns[m.pattern().as_usize()].as_str())
    }

    /// Whether `reason` contains any signature
    pub fn matches(&self, reason: &str) -> bool {
        self.find(reason).is_some()
    }
}

impl Default for SignatureSet {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNATURES.iter().copied())
            .expect("built-in signatures are valid patterns")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_signatures() {
        let set = SignatureSet::default();
        assert!(set.matches("疑似存在恶意推广不合规"));
        assert!(set.matches("Malicious Promotion detected"));
        assert!(!set.matches("off-topic spam"));
        assert_eq!(set.find("存在恶意推广"), Some("恶意推广"));
    }

    #[test]
    fn test_empty_set_matches_nothing() {
        let set = SignatureSet::new(Vec::<String>::new()).unwrap();
        assert!(!set.matches("恶意推广"));
        let set = SignatureSet::new([""]).unwrap();
        assert!(set.patterns().is_empty());
    }
}
