//! IOTQQ Web API gateway
//!
//! Outbound calls go through `LuaApiCaller`, which takes the function name
//! in the query string and a JSON body. Every call answers `{Ret, Msg}`.

use async_trait::async_trait;
use censorbot_core::{ChatGateway, Error, GatewayReply, GroupId, MessageRef, Result, UserId};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::config::{BasicAuth, IotqqConfig};

/// Server-side timeout, in seconds, passed to the bot framework
const CALL_TIMEOUT_SECS: &str = "10";

/// Friend (direct) message target type
const SEND_TO_FRIEND: i64 = 1;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMsgBody<'a> {
    to_user: UserId,
    send_to_type: i64,
    send_msg_type: &'static str,
    content: &'a str,
    groupid: GroupId,
    at_user: i64,
    replay_info: Option<()>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RevokeMsgBody {
    #[serde(rename = "GroupID")]
    group_id: GroupId,
    msg_seq: i64,
    msg_random: i64,
}

/// [`ChatGateway`] backed by the IOTQQ Web API
pub struct IotqqGateway {
    http: reqwest::Client,
    web_api: String,
    login_qq: UserId,
    auth: Option<BasicAuth>,
}

impl IotqqGateway {
    pub fn new(config: &IotqqConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            web_api: config.web_api.trim_end_matches('/').to_string(),
            login_qq: config.login_qq,
            auth: config.auth.clone(),
        })
    }

    async fn call<B: Serialize + Sync>(&self, funcname: &str, body: &B) -> Result<GatewayReply> {
        let mut request = self
            .http
            .post(format!("{}/LuaApiCaller", self.web_api))
            .query(&[
                ("qq", self.login_qq.to_string().as_str()),
                ("funcname", funcname),
                ("timeout", CALL_TIMEOUT_SECS),
            ])
            .json(body);
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::gateway(format!("{} request failed: {}", funcname, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::gateway(format!("{} returned HTTP {}", funcname, status)));
        }

        let reply: GatewayReply = response
            .json()
            .await
            .map_err(|e| Error::gateway(format!("invalid {} reply: {}", funcname, e)))?;
        debug!(funcname, ret = ?reply.ret, msg = ?reply.msg, "Web API reply");
        Ok(reply)
    }
}

#[async_trait]
impl ChatGateway for IotqqGateway {
    async fn send_message(
        &self,
        to_user: UserId,
        origin_group: Option<GroupId>,
        text: &str,
    ) -> Result<GatewayReply> {
        let body = SendMsgBody {
            to_user,
            send_to_type: SEND_TO_FRIEND,
            send_msg_type: "TextMsg",
            content: text,
            groupid: origin_group.unwrap_or(0),
            at_user: 0,
            replay_info: None,
        };
        self.call("SendMsg", &body).await
    }

    async fn retract_message(&self, target: MessageRef) -> Result<GatewayReply> {
        let body = RevokeMsgBody {
            group_id: target.group_id,
            msg_seq: target.seq,
            msg_random: target.random,
        };
        self.call("RevokeMsg", &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(HashMap<String, String>, Option<String>, Value)>>>;

    async fn lua_api_caller(
        State(seen): State<Seen>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let reply = if query.get("funcname").map(String::as_str) == Some("RevokeMsg") {
            json!({"Ret": 1001, "Msg": "No message meets the requirements"})
        } else {
            json!({"Ret": 0, "Msg": ""})
        };
        seen.lock().unwrap().push((query, auth, body));
        Json(reply)
    }

    async fn fake_web_api() -> (String, Seen) {
        let seen = Seen::default();
        let app = Router::new()
            .route("/v1/LuaApiCaller", post(lua_api_caller))
            .with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/v1/", addr), seen)
    }

    fn gateway(web_api: String, auth: Option<BasicAuth>) -> IotqqGateway {
        IotqqGateway::new(&IotqqConfig {
            web_api,
            login_qq: 20002,
            report_qq: 10001,
            auth,
            timeout_ms: 2000,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_message_body() {
        let (web_api, seen) = fake_web_api().await;
        let gateway = gateway(web_api, None);

        let reply = gateway.send_message(10001, Some(9001), "报告").await.unwrap();
        assert!(reply.is_success());

        let seen = seen.lock().unwrap();
        let (query, auth, body) = &seen[0];
        assert_eq!(query["qq"], "20002");
        assert_eq!(query["funcname"], "SendMsg");
        assert_eq!(query["timeout"], "10");
        assert!(auth.is_none());
        assert_eq!(
            body,
            &json!({
                "toUser": 10001,
                "sendToType": 1,
                "sendMsgType": "TextMsg",
                "content": "报告",
                "groupid": 9001,
                "atUser": 0,
                "replayInfo": null
            })
        );
    }

    #[tokio::test]
    async fn test_retract_message_reports_status() {
        let (web_api, seen) = fake_web_api().await;
        let gateway = gateway(
            web_api,
            Some(BasicAuth {
                username: "admin".into(),
                password: "secret".into(),
            }),
        );

        let target = MessageRef {
            group_id: 9001,
            seq: 314,
            random: 159,
        };
        let reply = gateway.retract_message(target).await.unwrap();
        assert!(reply.has_status(1001));

        let seen = seen.lock().unwrap();
        let (query, auth, body) = &seen[0];
        assert_eq!(query["funcname"], "RevokeMsg");
        assert!(auth.as_deref().unwrap().starts_with("Basic "));
        assert_eq!(body, &json!({"GroupID": 9001, "MsgSeq": 314, "MsgRandom": 159}));
    }

    #[tokio::test]
    async fn test_unreachable_web_api() {
        let gateway = gateway("http://127.0.0.1:9/v1".to_string(), None);
        let err = gateway.send_message(10001, None, "hi").await.unwrap_err();
        assert!(matches!(err, Error::Gateway(_)));
    }
}
