//! Baidu client against a local fake of the AIP service

use axum::extract::{Form, Query, State};
use axum::routing::post;
use axum::{Json, Router};
use censorbot_classifiers::{BaiduConfig, BaiduTextCensor};
use censorbot_core::{ComplianceLevel, Error, ModerationClassifier};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct FakeAip {
    token_requests: AtomicU32,
    censor_requests: AtomicU32,
}

#[derive(Deserialize)]
struct TokenQuery {
    grant_type: String,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct CensorQuery {
    access_token: String,
}

#[derive(Deserialize)]
struct CensorForm {
    text: String,
}

async fn token(State(fake): State<Arc<FakeAip>>, Query(q): Query<TokenQuery>) -> Json<Value> {
    fake.token_requests.fetch_add(1, Ordering::SeqCst);
    if q.grant_type != "client_credentials" || q.client_id != "ak" || q.client_secret != "sk" {
        return Json(json!({"error": "invalid_client", "error_description": "unknown client id"}));
    }
    Json(json!({"access_token": "token-1", "expires_in": 2592000}))
}

async fn censor(
    State(fake): State<Arc<FakeAip>>,
    Query(q): Query<CensorQuery>,
    Form(form): Form<CensorForm>,
) -> Json<Value> {
    fake.censor_requests.fetch_add(1, Ordering::SeqCst);
    if q.access_token != "token-1" {
        return Json(json!({"error_code": 110, "error_msg": "Access token invalid or no longer valid"}));
    }
    if form.text.contains("followers") {
        Json(json!({
            "log_id": 1,
            "conclusion": "不合规",
            "conclusionType": 2,
            "data": [{"msg": "存在恶意推广不合规", "conclusion": "不合规", "conclusionType": 2}]
        }))
    } else {
        Json(json!({"log_id": 2, "conclusion": "合规", "conclusionType": 1}))
    }
}

async fn spawn_fake() -> (String, Arc<FakeAip>) {
    let fake = Arc::new(FakeAip::default());
    let app = Router::new()
        .route("/oauth/2.0/token", post(token))
        .route("/rest/2.0/solution/v1/text_censor/v2/user_defined", post(censor))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), fake)
}

fn config(endpoint: String, api_key: &str) -> BaiduConfig {
    BaiduConfig {
        app_id: "1234".to_string(),
        api_key: api_key.to_string(),
        secret_key: "sk".to_string(),
        endpoint,
        timeout_ms: 2000,
    }
}

#[tokio::test]
async fn classifies_and_caches_token() {
    let (endpoint, fake) = spawn_fake().await;
    let client = BaiduTextCensor::new(config(endpoint, "ak")).unwrap();

    let verdict = client.classify("buy cheap followers now").await.unwrap();
    assert_eq!(verdict.level, ComplianceLevel::NonCompliant);
    assert_eq!(verdict.reason_text(), "存在恶意推广不合规");

    let verdict = client.classify("good morning everyone").await.unwrap();
    assert_eq!(verdict.level, ComplianceLevel::Compliant);

    assert_eq!(fake.token_requests.load(Ordering::SeqCst), 1);
    assert_eq!(fake.censor_requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rejected_credentials_are_classifier_errors() {
    let (endpoint, fake) = spawn_fake().await;
    let client = BaiduTextCensor::new(config(endpoint, "wrong")).unwrap();

    let err = client.classify("buy cheap followers now").await.unwrap_err();
    assert!(matches!(err, Error::Classifier(msg) if msg.contains("invalid_client")));
    assert_eq!(fake.censor_requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unreachable_service_is_classifier_error() {
    let client = BaiduTextCensor::new(config("http://127.0.0.1:9".to_string(), "ak")).unwrap();
    let err = client.classify("buy cheap followers now").await.unwrap_err();
    assert!(matches!(err, Error::Classifier(_)));
}
