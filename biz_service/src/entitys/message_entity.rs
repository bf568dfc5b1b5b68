use common::index_trait::MongoIndexModelProvider;
use mongodb::IndexModel;
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// 参与者类型：管理员 / 会员（学员）
///
/// 同一个枚举也用作请求方角色，管理员负责解答，会员负责提问。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, AsRefStr, Display, EnumString)]
pub enum ParticipantKind {
    Admin,
    Member,
}

impl ParticipantKind {
    pub fn is_admin(&self) -> bool {
        matches!(self, ParticipantKind::Admin)
    }
}

/// 消息类型：doubt（提问）/ clarity（解答）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Default, AsRefStr, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageType {
    #[default]
    Doubt,
    Clarity,
}

impl MessageType {
    /// 私聊消息的类型由发送方角色决定，不接受客户端指定
    pub fn for_private_sender(sender_role: ParticipantKind) -> Self {
        match sender_role {
            ParticipantKind::Admin => MessageType::Clarity,
            ParticipantKind::Member => MessageType::Doubt,
        }
    }
}

/// 答疑消息，集合 `messages`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageEntity {
    #[serde(rename = "_id")]
    pub id: String,
    /// 去除首尾空白后的正文，1..=2000 字符
    pub text: String,
    /// 所属场馆（租户），创建后不可变
    pub tenant_id: String,
    pub sender_id: String,
    pub sender_kind: ParticipantKind,
    /// 为空表示公共消息，否则为私聊
    pub recipient_id: Option<String>,
    pub recipient_kind: Option<ParticipantKind>,
    pub message_type: MessageType,
    pub is_visible: bool,
    pub is_resolved: bool,
    pub parent_id: Option<String>,
    /// 子回复 ID 冗余列表，尽力维护；以子消息的 parentId 为准
    #[serde(default)]
    pub reply_ids: Vec<String>,
    pub last_reply_at: Option<i64>,
    #[serde(default)]
    pub read_by: Vec<String>,
    /// 创建时间（UTC 毫秒）
    pub created_at: i64,
}

impl MessageEntity {
    pub fn is_read_by(&self, user_id: &str) -> bool {
        self.read_by.iter().any(|u| u == user_id)
    }
}

impl MongoIndexModelProvider for MessageEntity {
    fn index_models() -> Vec<IndexModel> {
        vec![
            IndexModel::builder().keys(doc! { "tenantId": 1, "createdAt": 1 }).build(),
            IndexModel::builder().keys(doc! { "tenantId": 1, "recipientId": 1, "senderId": 1 }).build(),
            IndexModel::builder().keys(doc! { "tenantId": 1, "parentId": 1 }).build(),
        ]
    }
}
