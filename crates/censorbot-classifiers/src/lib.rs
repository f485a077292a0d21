//! censorbot Classifiers
//!
//! Implementations of [`censorbot_core::ModerationClassifier`]:
//! - [`BaiduTextCensor`]: the Baidu AIP user-defined text censor service
//! - [`KeywordClassifier`]: offline phrase matching

pub mod baidu;
pub mod config;
pub mod keywords;

pub use baidu::{BaiduConfig, BaiduTextCensor, CensorResponse};
pub use config::ClassifierConfig;
pub use keywords::{builtin_rules, KeywordClassifier, KeywordLevel, KeywordRule};
