//! Chat gateway trait and reply types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{GroupId, MessageRef, Result, UserId};

/// Status reported by the bot framework for an outbound call
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GatewayReply {
    /// Provider status code; `0` or absent means success
    #[serde(rename = "Ret", default, skip_serializing_if = "Option::is_none")]
    pub ret: Option<i64>,

    /// Provider message
    #[serde(rename = "Msg", default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl GatewayReply {
    /// A successful reply
    pub fn ok() -> Self {
        Self::default()
    }

    /// A reply carrying the given status code
    pub fn status(ret: i64, msg: impl Into<String>) -> Self {
        Self {
            ret: Some(ret),
            msg: Some(msg.into()),
        }
    }

    /// Whether the provider reported success
    pub fn is_success(&self) -> bool {
        matches!(self.ret, None | Some(0))
    }

    /// Whether the reply carries exactly this status code
    pub fn has_status(&self, code: i64) -> bool {
        self.ret == Some(code)
    }
}

/// Outbound side of the chat transport
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Send a direct message to `to_user`, optionally in the context of a group
    async fn send_message(
        &self,
        to_user: UserId,
        origin_group: Option<GroupId>,
        text: &str,
    ) -> Result<GatewayReply>;

    /// Retract a previously posted group message
    async fn retract_message(&self, target: MessageRef) -> Result<GatewayReply>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_success() {
        assert!(GatewayReply::ok().is_success());
        let reply: GatewayReply = serde_json::from_str(r#"{"Ret":0,"Msg":""}"#).unwrap();
        assert!(reply.is_success());
    }

    #[test]
    fn test_reply_status() {
        let reply: GatewayReply =
            serde_json::from_str(r#"{"Msg":"No message meets the requirements","Ret":1001}"#)
                .unwrap();
        assert!(!reply.is_success());
        assert!(reply.has_status(1001));
        assert!(!reply.has_status(1002));
    }
}
