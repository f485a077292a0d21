//! IOTQQ event decoding
//!
//! The bot framework wraps every event as
//! `{"CurrentQQ": .., "CurrentPacket": {"WebConnId": .., "Data": {..}}}`.
//! Only the `Data` object matters here.

use censorbot_core::{
    GroupId, GroupMessage, InboundEvent, MessageKind, OtherEvent, PrivateMessage, Result, UserId,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Group message event name
pub const ON_GROUP_MSGS: &str = "OnGroupMsgs";

/// Friend message event name
pub const ON_FRIEND_MSGS: &str = "OnFriendMsgs";

/// Generic notification event name
pub const ON_EVENTS: &str = "OnEvents";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Packet<T> {
    current_packet: CurrentPacket<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CurrentPacket<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GroupMsgData {
    from_group_id: GroupId,
    #[serde(default)]
    from_group_name: String,
    from_user_id: UserId,
    #[serde(default)]
    from_nick_name: String,
    #[serde(default)]
    content: String,
    msg_type: MessageKind,
    #[serde(default)]
    msg_seq: i64,
    #[serde(default)]
    msg_random: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FriendMsgData {
    from_uin: UserId,
    #[serde(default)]
    content: String,
    msg_type: MessageKind,
}

fn data<T: DeserializeOwned>(payload: Value) -> Result<T> {
    let packet: Packet<T> = serde_json::from_value(payload)?;
    Ok(packet.current_packet.data)
}

/// Decode a webhook payload delivered under `name`
///
/// Unknown event names become [`InboundEvent::Other`] carrying the raw
/// payload. Malformed message packets are errors.
pub fn decode_event(name: &str, payload: Value) -> Result<InboundEvent> {
    let event = match name {
        ON_GROUP_MSGS => {
            let data: GroupMsgData = data(payload)?;
            InboundEvent::Group(GroupMessage {
                group_id: data.from_group_id,
                group_name: data.from_group_name,
                sender_id: data.from_user_id,
                sender_nick: data.from_nick_name,
                content: data.content,
                kind: data.msg_type,
                seq: data.msg_seq,
                random: data.msg_random,
            })
        }
        ON_FRIEND_MSGS => {
            let data: FriendMsgData = data(payload)?;
            InboundEvent::Private(PrivateMessage {
                sender_id: data.from_uin,
                content: data.content,
                kind: data.msg_type,
            })
        }
        _ => InboundEvent::Other(OtherEvent {
            name: name.to_string(),
            payload,
        }),
    };
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_group_message() {
        let payload = json!({
            "CurrentPacket": {
                "WebConnId": "abc",
                "Data": {
                    "FromGroupId": 9001,
                    "FromGroupName": "闲聊群",
                    "FromUserId": 12345,
                    "FromNickName": "spammer",
                    "Content": "加我微信领红包",
                    "MsgType": "TextMsg",
                    "MsgTime": 1600000000,
                    "MsgSeq": 314,
                    "MsgRandom": 159,
                    "RedBaginfo": null
                }
            },
            "CurrentQQ": 20002
        });

        let event = decode_event(ON_GROUP_MSGS, payload).unwrap();
        let expected = GroupMessage::text(9001, 12345, "加我微信领红包")
            .with_names("闲聊群", "spammer")
            .with_seq(314, 159);
        assert_eq!(event, InboundEvent::Group(expected));
    }

    #[test]
    fn test_picture_group_message_keeps_kind() {
        let payload = json!({
            "CurrentPacket": {"Data": {
                "FromGroupId": 9001,
                "FromUserId": 12345,
                "Content": "{\"Url\":\"http://...\"}",
                "MsgType": "PicMsg"
            }}
        });

        match decode_event(ON_GROUP_MSGS, payload).unwrap() {
            InboundEvent::Group(msg) => {
                assert_eq!(msg.kind, MessageKind::Other("PicMsg".to_string()));
                assert_eq!(msg.seq, 0);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_friend_message() {
        let payload = json!({
            "CurrentPacket": {"Data": {
                "FromUin": 10001,
                "ToUin": 20002,
                "MsgType": "TextMsg",
                "MsgSeq": 7,
                "Content": "执行撤回 关"
            }}
        });

        let event = decode_event(ON_FRIEND_MSGS, payload).unwrap();
        assert_eq!(event, InboundEvent::Private(PrivateMessage::text(10001, "执行撤回 关")));
    }

    #[test]
    fn test_other_events_keep_payload() {
        let payload = json!({"CurrentPacket": {"Data": {"EventName": "ON_EVENT_GROUP_JOIN"}}});
        let event = decode_event(ON_EVENTS, payload.clone()).unwrap();
        assert_eq!(event.kind(), "other");
        assert_eq!(
            event,
            InboundEvent::Other(OtherEvent {
                name: ON_EVENTS.to_string(),
                payload
            })
        );
    }

    #[test]
    fn test_malformed_group_packet() {
        let err = decode_event(ON_GROUP_MSGS, json!({"CurrentPacket": {"Data": {}}})).unwrap_err();
        assert_eq!(err.kind(), "serialization");
    }
}
