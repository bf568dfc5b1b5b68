use crate::entitys::message_entity::{MessageEntity, MessageType, ParticipantKind};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 参与者对外展示信息（管理员名称统一为 "Admin"）
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRef {
    pub id: String,
    pub name: String,
    pub kind: ParticipantKind,
}

/// 返回给客户端、推送给连接的消息视图
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub text: String,
    pub sender: ParticipantRef,
    pub recipient_id: Option<String>,
    /// 接收方无法解析时为空，`recipientId` 仍然标识私聊
    pub recipient: Option<ParticipantRef>,
    pub message_type: MessageType,
    pub is_visible: bool,
    pub is_resolved: bool,
    pub parent_id: Option<String>,
    pub reply_ids: Vec<String>,
    pub last_reply_at: Option<i64>,
    /// 当前查看者是否已读
    pub is_read: bool,
    pub created_at: i64,
}

impl MessageView {
    pub fn build(entity: MessageEntity, sender: ParticipantRef, recipient: Option<ParticipantRef>, viewer_id: &str) -> Self {
        let is_read = entity.is_read_by(viewer_id);
        Self {
            id: entity.id,
            text: entity.text,
            sender,
            recipient_id: entity.recipient_id,
            recipient,
            message_type: entity.message_type,
            is_visible: entity.is_visible,
            is_resolved: entity.is_resolved,
            parent_id: entity.parent_id,
            reply_ids: entity.reply_ids,
            last_reply_at: entity.last_reply_at,
            is_read,
            created_at: entity.created_at,
        }
    }
}

/// 场馆消息统计
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MessageStats {
    /// 可见消息总数
    pub total: u64,
    pub common: u64,
    pub private: u64,
    pub doubts: u64,
    pub clarities: u64,
    pub resolved: u64,
}
