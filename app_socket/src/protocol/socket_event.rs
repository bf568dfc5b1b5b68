//! 推送通道协议
//!
//! 每个 TCP 帧（长度前缀分帧）承载一个 JSON 对象：`{"event": "<name>", "data": ...}`。

use biz_service::entitys::message_entity::{MessageType, ParticipantKind};
use biz_service::entitys::message_view::{MessageView, ParticipantRef};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// 一条连接所代表的在线身份
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceIdentity {
    pub user_id: String,
    pub role: ParticipantKind,
    pub name: String,
    pub tenant_id: String,
}

/// 私聊提醒，客户端据此刷新未读角标
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrivateNotification {
    pub sender_identity: ParticipantRef,
    pub text: String,
    pub message_type: MessageType,
    pub recipient_id: String,
}

/// 服务端 -> 客户端
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    PresenceUpdated { users: Vec<PresenceIdentity> },
    MessageCreated(MessageView),
    PrivateNotification(PrivateNotification),
    Error { msg: String },
}

impl ServerEvent {
    pub fn encode(&self) -> Result<Bytes, serde_json::Error> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }
}

/// 客户端 -> 服务端
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    Register(PresenceIdentity),
    /// 草稿仅作提示，不落库；正式消息走 HTTP 创建接口
    DraftMessage(serde_json::Value),
    Ping,
}

impl ClientEvent {
    pub fn decode(frame: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(frame)
    }
}
