//! Baidu AIP text censor client
//!
//! Uses the user-defined text censor endpoint. Access tokens come from the
//! OAuth client-credentials flow and are cached until shortly before they
//! expire.

use async_trait::async_trait;
use censorbot_core::{Error, ModerationClassifier, Result, Verdict};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Public Baidu AIP endpoint
pub const DEFAULT_ENDPOINT: &str = "https://aip.baidubce.com";

const TOKEN_PATH: &str = "/oauth/2.0/token";
const CENSOR_PATH: &str = "/rest/2.0/solution/v1/text_censor/v2/user_defined";

/// Tokens are refreshed this long before the advertised expiry
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Error codes meaning the access token is invalid or expired
const TOKEN_ERROR_CODES: &[i64] = &[110, 111];

/// Credentials and transport settings for the Baidu client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaiduConfig {
    /// Application id (informational, not sent by the v2 API)
    #[serde(default)]
    pub app_id: String,

    pub api_key: String,

    pub secret_key: String,

    /// Base URL of the AIP service
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Text censor response
#[derive(Debug, Clone, Deserialize)]
pub struct CensorResponse {
    #[serde(default)]
    pub log_id: Option<u64>,

    /// 合规, 不合规, 疑似, 审核失败
    #[serde(default)]
    pub conclusion: Option<String>,

    /// 1 compliant, 2 non-compliant, 3 suspected, 4 review failed
    #[serde(rename = "conclusionType", default)]
    pub conclusion_type: Option<i64>,

    #[serde(default)]
    pub data: Vec<CensorHit>,

    #[serde(default)]
    pub error_code: Option<i64>,

    #[serde(default)]
    pub error_msg: Option<String>,
}

/// One hit in a censor response
#[derive(Debug, Clone, Deserialize)]
pub struct CensorHit {
    #[serde(default)]
    pub msg: Option<String>,

    #[serde(default)]
    pub conclusion: Option<String>,
}

impl CensorResponse {
    /// Map the response to a verdict
    ///
    /// `conclusionType` wins over the textual conclusion. Anything outside the
    /// three known tiers becomes an unrecognized verdict.
    pub fn into_verdict(self) -> Result<Verdict> {
        if let Some(code) = self.error_code {
            return Err(Error::classifier(format!(
                "censor service error {}: {}",
                code,
                self.error_msg.unwrap_or_default()
            )));
        }

        let label = self.conclusion.clone().unwrap_or_default();
        let reason = self
            .data
            .into_iter()
            .find_map(|hit| hit.msg.filter(|m| !m.is_empty()))
            .unwrap_or_else(|| label.clone());

        let verdict = match (self.conclusion_type, label.as_str()) {
            (Some(1), _) | (None, "合规") => Verdict::compliant(),
            (Some(2), _) | (None, "不合规") => Verdict::non_compliant(reason),
            (Some(3), _) | (None, "疑似") => Verdict::suspected(reason),
            (code, _) => {
                let level = match code {
                    Some(code) => format!("{}:{}", code, label),
                    None => label.clone(),
                };
                Verdict::unrecognized(level, Some(reason).filter(|r| !r.is_empty()))
            }
        };
        Ok(verdict)
    }
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Baidu text censor classifier
pub struct BaiduTextCensor {
    config: BaiduConfig,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl BaiduTextCensor {
    /// Create a client from configuration
    pub fn new(config: BaiduConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http,
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting Baidu access token");
        let response: TokenResponse = self
            .http
            .post(self.url(TOKEN_PATH))
            .query(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.api_key.as_str()),
                ("client_secret", self.config.secret_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::classifier(format!("token request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| Error::classifier(format!("invalid token response: {}", e)))?;

        let Some(value) = response.access_token else {
            return Err(Error::classifier(format!(
                "token request rejected: {} {}",
                response.error.unwrap_or_default(),
                response.error_description.unwrap_or_default()
            )));
        };

        let lifetime = Duration::from_secs(response.expires_in.unwrap_or(0));
        info!(expires_in_secs = lifetime.as_secs(), "Obtained Baidu access token");
        *cached = Some(CachedToken {
            value: value.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        });
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }
}

#[async_trait]
impl ModerationClassifier for BaiduTextCensor {
    async fn classify(&self, text: &str) -> Result<Verdict> {
        let token = self.access_token().await?;

        let response: CensorResponse = self
            .http
            .post(self.url(CENSOR_PATH))
            .query(&[("access_token", token.as_str())])
            .form(&[("text", text)])
            .send()
            .await
            .map_err(|e| Error::classifier(format!("censor request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| Error::classifier(format!("invalid censor response: {}", e)))?;

        debug!(
            log_id = ?response.log_id,
            conclusion = ?response.conclusion,
            conclusion_type = ?response.conclusion_type,
            "Baidu censor response"
        );

        if let Some(code) = response.error_code {
            if TOKEN_ERROR_CODES.contains(&code) {
                warn!(code, "Baidu rejected access token, dropping cached token");
                self.invalidate_token().await;
            }
        }

        response.into_verdict()
    }

    fn name(&self) -> &str {
        "baidu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use censorbot_core::ComplianceLevel;

    fn parse(json: &str) -> Result<Verdict> {
        serde_json::from_str::<CensorResponse>(json).unwrap().into_verdict()
    }

    #[test]
    fn test_suspected_response() {
        let verdict = parse(
            r#"{"conclusion":"疑似","log_id":15758897400554284,"data":[{"msg":"疑似存在恶意推广不合规","conclusion":"疑似","hits":[{"probability":0.9293495,"datasetName":"百度默认文本反作弊库","words":[]}],"subType":4,"conclusionType":3,"type":12}],"conclusionType":3}"#,
        )
        .unwrap();
        assert_eq!(verdict, Verdict::suspected("疑似存在恶意推广不合规"));
    }

    #[test]
    fn test_compliant_response() {
        let verdict = parse(r#"{"conclusion":"合规","log_id":1,"conclusionType":1}"#).unwrap();
        assert_eq!(verdict, Verdict::compliant());
    }

    #[test]
    fn test_non_compliant_without_hits_uses_conclusion() {
        let verdict = parse(r#"{"conclusion":"不合规","conclusionType":2}"#).unwrap();
        assert_eq!(verdict, Verdict::non_compliant("不合规"));
    }

    #[test]
    fn test_textual_conclusion_without_type() {
        let verdict = parse(r#"{"conclusion":"不合规","data":[{"msg":"存在恶意推广"}]}"#).unwrap();
        assert_eq!(verdict, Verdict::non_compliant("存在恶意推广"));
    }

    #[test]
    fn test_review_failed_is_unrecognized() {
        let verdict = parse(r#"{"conclusion":"审核失败","conclusionType":4}"#).unwrap();
        assert!(matches!(verdict.level, ComplianceLevel::Unrecognized(_)));
        assert!(!verdict.level.is_actionable());
    }

    #[test]
    fn test_error_response() {
        let err = parse(r#"{"error_code":18,"error_msg":"Open api qps request limit reached"}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Classifier(msg) if msg.contains("qps")));
    }

    #[test]
    fn test_config_defaults() {
        let config: BaiduConfig =
            serde_yaml::from_str("api_key: ak\nsecret_key: sk\n").unwrap();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.timeout_ms, 5000);
    }
}
