//! Agent configuration

use censorbot_classifiers::{builtin_rules, BaiduConfig, ClassifierConfig, KeywordRule};
use censorbot_core::UserId;
use censorbot_policy::{DEFAULT_NOT_RETRACTABLE_CODE, DEFAULT_SIGNATURES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Bot framework connection
    pub iotqq: IotqqConfig,

    /// Classifier backing moderation
    #[serde(default = "default_classifier")]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub moderation: ModerationConfig,

    /// Where operator settings are persisted
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,
}

impl BotConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &crate::Cli) -> anyhow::Result<Self> {
        if !Path::new(config_path).exists() {
            anyhow::bail!("Configuration file not found: {}", config_path);
        }
        let content = std::fs::read_to_string(config_path)?;
        let mut config: Self = serde_yaml::from_str(&content)?;
        config.apply_overrides(cli);
        Ok(config)
    }

    fn apply_overrides(&mut self, cli: &crate::Cli) {
        if let Some(settings) = &cli.settings {
            self.settings_path = settings.clone();
        }

        if let ClassifierConfig::Baidu(baidu) = &mut self.classifier {
            if let Some(api_key) = &cli.baidu_api_key {
                baidu.api_key = api_key.clone();
            }
            if let Some(secret_key) = &cli.baidu_secret_key {
                baidu.secret_key = secret_key.clone();
            }
        }

        self.fallback_without_credentials();
    }

    /// Switch to the fallback keyword rules when Baidu has no credentials
    ///
    /// An empty `fallback_rules` list makes the classifier fail to build, so
    /// startup stops instead of running without moderation.
    fn fallback_without_credentials(&mut self) {
        if let ClassifierConfig::Baidu(baidu) = &self.classifier {
            if baidu.api_key.is_empty() || baidu.secret_key.is_empty() {
                warn!(
                    rules = self.moderation.fallback_rules.len(),
                    "No Baidu credentials configured, using the fallback keyword rules"
                );
                self.classifier = ClassifierConfig::Keywords {
                    rules: self.moderation.fallback_rules.clone(),
                };
            }
        }
    }

    /// Ids that can never leave the whitelist
    pub fn pinned_ids(&self) -> [UserId; 2] {
        [self.iotqq.report_qq, self.iotqq.login_qq]
    }
}

/// IOTQQ Web API connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IotqqConfig {
    /// Base URL of the Web API, e.g. `http://127.0.0.1:8888/v1`
    pub web_api: String,

    /// QQ number the bot is logged in as
    pub login_qq: UserId,

    /// Operator receiving reports and allowed to send commands
    pub report_qq: UserId,

    #[serde(default)]
    pub auth: Option<BasicAuth>,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_gateway_timeout_ms")]
    pub timeout_ms: u64,
}

/// HTTP basic credentials for the Web API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// Moderation tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Reason substrings that always lead to retraction
    #[serde(default = "default_signatures")]
    pub signatures: Vec<String>,

    /// Gateway status code meaning "message cannot be retracted"
    #[serde(default = "default_not_retractable_code")]
    pub not_retractable_code: i64,

    /// Capacity of the inbound event queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Keyword rules used when the Baidu classifier has no credentials
    #[serde(default = "builtin_rules")]
    pub fallback_rules: Vec<KeywordRule>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            signatures: default_signatures(),
            not_retractable_code: default_not_retractable_code(),
            queue_capacity: default_queue_capacity(),
            fallback_rules: builtin_rules(),
        }
    }
}

fn default_classifier() -> ClassifierConfig {
    ClassifierConfig::Baidu(BaiduConfig {
        app_id: String::new(),
        api_key: String::new(),
        secret_key: String::new(),
        endpoint: censorbot_classifiers::baidu::DEFAULT_ENDPOINT.to_string(),
        timeout_ms: 5000,
    })
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("settings.json")
}

fn default_gateway_timeout_ms() -> u64 {
    10_000
}

fn default_signatures() -> Vec<String> {
    DEFAULT_SIGNATURES.iter().map(|s| s.to_string()).collect()
}

fn default_not_retractable_code() -> i64 {
    DEFAULT_NOT_RETRACTABLE_CODE
}

fn default_queue_capacity() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const MINIMAL: &str = r#"
iotqq:
  web_api: http://127.0.0.1:8888/v1
  login_qq: 20002
  report_qq: 10001
"#;

    fn cli(args: &[&str]) -> crate::Cli {
        let mut argv = vec!["censorbot"];
        argv.extend_from_slice(args);
        crate::Cli::parse_from(argv)
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config: BotConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.settings_path, PathBuf::from("settings.json"));
        assert_eq!(config.moderation.not_retractable_code, 1001);
        assert_eq!(config.moderation.signatures, vec!["恶意推广", "malicious promotion"]);
        assert_eq!(config.iotqq.timeout_ms, 10_000);
        assert!(config.iotqq.auth.is_none());
        assert_eq!(config.pinned_ids(), [10001, 20002]);
    }

    #[tokio::test]
    async fn test_missing_credentials_still_moderate() {
        let mut config: BotConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.apply_overrides(&cli(&[]));
        assert!(matches!(config.classifier, ClassifierConfig::Keywords { .. }));

        let classifier = config.classifier.build().unwrap();
        let verdict = classifier
            .classify("加我微信领红包 恶意推广 buy cheap followers now")
            .await
            .unwrap();
        assert!(verdict.level.is_actionable());
    }

    #[test]
    fn test_configured_fallback_rules() {
        let yaml = format!(
            "{}moderation:\n  fallback_rules:\n    - pattern: 代开发票\n      reason: 恶意推广\n",
            MINIMAL
        );
        let mut config: BotConfig = serde_yaml::from_str(&yaml).unwrap();
        config.apply_overrides(&cli(&[]));
        match &config.classifier {
            ClassifierConfig::Keywords { rules } => {
                assert_eq!(rules.len(), 1);
                assert_eq!(rules[0].pattern, "代开发票");
            }
            _ => panic!("Wrong classifier type"),
        }
    }

    #[test]
    fn test_empty_fallback_rules_fail_to_build() {
        let yaml = format!("{}moderation:\n  fallback_rules: []\n", MINIMAL);
        let mut config: BotConfig = serde_yaml::from_str(&yaml).unwrap();
        config.apply_overrides(&cli(&[]));
        assert!(config.classifier.build().is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let mut config: BotConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.apply_overrides(&cli(&[
            "--settings",
            "/var/lib/censorbot/settings.json",
            "--baidu-api-key",
            "ak",
            "--baidu-secret-key",
            "sk",
        ]));

        assert_eq!(config.settings_path, PathBuf::from("/var/lib/censorbot/settings.json"));
        match config.classifier {
            ClassifierConfig::Baidu(baidu) => {
                assert_eq!(baidu.api_key, "ak");
                assert_eq!(baidu.secret_key, "sk");
            }
            _ => panic!("Wrong classifier type"),
        }
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
iotqq:
  web_api: http://bot.local:8888/v1
  login_qq: 20002
  report_qq: 10001
  auth:
    username: admin
    password: secret
classifier:
  type: keywords
  rules:
    - pattern: 加我微信
      reason: 恶意推广
moderation:
  signatures: [广告]
  not_retractable_code: 34
settings_path: data/settings.json
"#;
        let mut config: BotConfig = serde_yaml::from_str(yaml).unwrap();
        config.apply_overrides(&cli(&[]));

        assert_eq!(config.iotqq.auth.as_ref().unwrap().username, "admin");
        assert_eq!(config.moderation.signatures, vec!["广告"]);
        assert_eq!(config.moderation.not_retractable_code, 34);
        assert_eq!(config.moderation.queue_capacity, 256);
        match config.classifier {
            ClassifierConfig::Keywords { rules } => assert_eq!(rules.len(), 1),
            _ => panic!("Wrong classifier type"),
        }
    }
}
