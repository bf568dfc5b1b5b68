use crate::biz_service::participant_service::ParticipantService;
use crate::entitys::message_entity::{MessageEntity, MessageType, ParticipantKind};
use crate::entitys::message_view::{MessageStats, MessageView, ParticipantRef};
use crate::events::{MessageEvent, MessageOutbox};
use common::errors::AppError;
use common::query_builder::QueryBuilder;
use common::repository_util::Repository;
use common::tenant_filter::TenantScoped;
use common::util::common_utils::build_id;
use common::util::date_util::now_millis;
use common::util::validate::validate_message_text;
use log::{debug, warn};
use mongodb::bson::{Bson, Document, doc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// 新建消息的输入
#[derive(Debug, Clone, Default)]
pub struct CreateMessage {
    pub text: String,
    pub recipient_id: Option<String>,
    /// 仅对公共消息生效，私聊由发送方角色决定
    pub message_type: Option<MessageType>,
    pub parent_id: Option<String>,
}

/// 答疑消息服务
///
/// 所有读写都通过 [`TenantScoped`] 绑定调用方租户，跨租户访问表现为“不存在”。
/// 父消息的 `replyIds` 与级联删除都是尽力而为：失败只记日志，不影响主操作结果。
pub struct MessageService {
    dao: Arc<dyn Repository<MessageEntity>>,
    participants: Arc<ParticipantService>,
    outbox: MessageOutbox,
}

impl MessageService {
    pub fn new(dao: Arc<dyn Repository<MessageEntity>>, participants: Arc<ParticipantService>, outbox: MessageOutbox) -> Self {
        Self { dao, participants, outbox }
    }

    fn scoped<'a>(&'a self, tenant_id: &'a str) -> TenantScoped<'a, MessageEntity> {
        TenantScoped::new(self.dao.as_ref(), tenant_id)
    }

    /// 公共消息 + 与自己相关的私聊，按创建时间正序
    pub async fn list_for_user(&self, user_id: &str, role: ParticipantKind, tenant_id: &str) -> Result<Vec<MessageView>, AppError> {
        let mut filter = QueryBuilder::new()
            .is_null("recipientId")
            .or()
            .eq("senderId", user_id)
            .or()
            .eq("recipientId", user_id)
            .build();
        if !role.is_admin() {
            filter.insert("isVisible", true);
        }
        let messages = self.scoped(tenant_id).query(filter, Some(doc! { "createdAt": 1 })).await?;
        self.enrich_all(tenant_id, messages, user_id).await
    }

    pub async fn create(&self, sender_id: &str, sender_role: ParticipantKind, tenant_id: &str, input: CreateMessage) -> Result<MessageView, AppError> {
        let text = validate_message_text(&input.text).map_err(|e| AppError::Validation(validation_message(&e)))?;

        // 显式给出的接收方（包括空白 ID）必须能解析，不能退化为公共消息
        let recipient = match input.recipient_id.as_deref().map(str::trim) {
            Some("") => return Err(AppError::Validation("Recipient not found".to_string())),
            Some(recipient_id) => Some(
                self.participants
                    .identify_kind(tenant_id, recipient_id)
                    .await?
                    .ok_or_else(|| AppError::Validation("Recipient not found".to_string()))?,
            ),
            None => None,
        };
        let sender = self
            .participants
            .resolve(tenant_id, sender_id, sender_role)
            .await?
            .ok_or_else(|| AppError::Validation("Sender not found".to_string()))?;

        let message_type = match recipient {
            Some(_) => MessageType::for_private_sender(sender_role),
            None => input.message_type.unwrap_or_default(),
        };

        let message = MessageEntity {
            id: build_id(),
            text: text.to_string(),
            tenant_id: tenant_id.to_string(),
            sender_id: sender_id.to_string(),
            sender_kind: sender_role,
            recipient_id: recipient.as_ref().map(|r| r.id.clone()),
            recipient_kind: recipient.as_ref().map(|r| r.kind),
            message_type,
            is_visible: true,
            is_resolved: false,
            parent_id: input.parent_id.filter(|id| !id.trim().is_empty()),
            reply_ids: vec![],
            last_reply_at: None,
            read_by: vec![],
            created_at: now_millis(),
        };
        let scoped = self.scoped(tenant_id);
        scoped.insert(&message).await?;

        if let Some(parent_id) = &message.parent_id {
            self.append_reply(&scoped, parent_id, &message).await;
        }

        let view = MessageView::build(message, sender, recipient, sender_id);
        self.outbox.publish(MessageEvent::Created { tenant_id: tenant_id.to_string(), message: view.clone() });
        Ok(view)
    }

    /// 在父消息上追加回复索引，失败不影响新消息
    async fn append_reply(&self, scoped: &TenantScoped<'_, MessageEntity>, parent_id: &str, reply: &MessageEntity) {
        let update = doc! {
            "$push": { "replyIds": reply.id.as_str() },
            "$set": { "lastReplyAt": reply.created_at },
        };
        match scoped.update_one(doc! { "_id": parent_id }, update).await {
            Ok(0) => warn!("reply {} references missing parent {} in tenant {}", reply.id, parent_id, scoped.tenant_id()),
            Ok(_) => {}
            Err(e) => warn!("failed to index reply {} on parent {}: {:?}", reply.id, parent_id, e),
        }
    }

    /// 切换可见性，仅发送者或管理员可操作，返回新的可见状态
    pub async fn toggle_visibility(&self, message_id: &str, caller_id: &str, caller_role: ParticipantKind, tenant_id: &str) -> Result<bool, AppError> {
        let scoped = self.scoped(tenant_id);
        let message = scoped.find_by_id(message_id).await?.ok_or(AppError::NotFound)?;
        if !caller_role.is_admin() && message.sender_id != caller_id {
            return Err(AppError::Forbidden);
        }
        let is_visible = !message.is_visible;
        scoped.update_one(doc! { "_id": message_id }, doc! { "$set": { "isVisible": is_visible } }).await?;
        Ok(is_visible)
    }

    pub async fn resolve(&self, message_id: &str, caller_role: ParticipantKind, tenant_id: &str) -> Result<(), AppError> {
        require_admin(caller_role)?;
        let scoped = self.scoped(tenant_id);
        scoped.find_by_id(message_id).await?.ok_or(AppError::NotFound)?;
        scoped.update_one(doc! { "_id": message_id }, doc! { "$set": { "isResolved": true } }).await?;
        Ok(())
    }

    /// 删除消息并级联删除其直接回复（只展开一层）
    pub async fn delete(&self, message_id: &str, caller_role: ParticipantKind, tenant_id: &str) -> Result<(), AppError> {
        require_admin(caller_role)?;
        let scoped = self.scoped(tenant_id);
        let message = scoped.find_by_id(message_id).await?.ok_or(AppError::NotFound)?;
        scoped.delete(doc! { "_id": message_id }).await?;

        if let Some(parent_id) = &message.parent_id {
            if let Err(e) = scoped.update_one(doc! { "_id": parent_id.as_str() }, doc! { "$pull": { "replyIds": message_id } }).await {
                warn!("failed to unlink reply {} from parent {}: {:?}", message_id, parent_id, e);
            }
        }

        // replyIds 可能滞后，同时按 parentId 兜底
        let replies = QueryBuilder::new()
            .in_array("_id", message.reply_ids.clone())
            .or()
            .eq("parentId", message_id)
            .build();
        match scoped.delete(replies).await {
            Ok(removed) if (removed as usize) < message.reply_ids.len() => {
                warn!("cascade for {} removed {} of {} indexed replies", message_id, removed, message.reply_ids.len())
            }
            Ok(removed) => debug!("cascade for {} removed {} replies", message_id, removed),
            Err(e) => warn!("cascade delete for {} failed: {:?}", message_id, e),
        }
        Ok(())
    }

    /// 标记已读，幂等
    pub async fn mark_read(&self, message_id: &str, user_id: &str, tenant_id: &str) -> Result<(), AppError> {
        let scoped = self.scoped(tenant_id);
        let message = scoped.find_by_id(message_id).await?.ok_or(AppError::NotFound)?;
        if message.is_read_by(user_id) {
            return Ok(());
        }
        scoped.update_one(doc! { "_id": message_id }, doc! { "$addToSet": { "readBy": user_id } }).await?;
        Ok(())
    }

    /// 把与对方的私聊（双向、可见）全部标记为已读，返回更新条数
    pub async fn mark_chat_read(&self, caller_id: &str, other_user_id: &str, tenant_id: &str) -> Result<u64, AppError> {
        if other_user_id.trim().is_empty() {
            return Err(AppError::Validation("Peer user id is required".to_string()));
        }
        let mut filter = direct_chat_filter(caller_id, other_user_id);
        filter.insert("isVisible", true);
        filter.insert("readBy", doc! { "$ne": caller_id });
        let updated = self.scoped(tenant_id).update(filter, doc! { "$addToSet": { "readBy": caller_id } }).await?;
        Ok(updated)
    }

    /// 发给自己且未读的可见消息，按发送者分组计数
    pub async fn unread_counts(&self, user_id: &str, tenant_id: &str) -> Result<BTreeMap<String, u64>, AppError> {
        let filter = doc! {
            "recipientId": user_id,
            "isVisible": true,
            "readBy": { "$ne": user_id },
        };
        let unread = self.scoped(tenant_id).query(filter, None).await?;
        let mut counts = BTreeMap::new();
        for message in unread.into_iter().filter(|m| !m.is_read_by(user_id)) {
            *counts.entry(message.sender_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    pub async fn stats(&self, tenant_id: &str) -> Result<MessageStats, AppError> {
        let scoped = self.scoped(tenant_id);
        let (total, common, private, doubts, clarities, resolved) = futures::try_join!(
            scoped.count(doc! { "isVisible": true }),
            scoped.count(doc! { "recipientId": Bson::Null }),
            scoped.count(doc! { "recipientId": { "$ne": Bson::Null } }),
            scoped.count(doc! { "messageType": MessageType::Doubt.as_ref() }),
            scoped.count(doc! { "messageType": MessageType::Clarity.as_ref() }),
            scoped.count(doc! { "isResolved": true }),
        )?;
        Ok(MessageStats { total, common, private, doubts, clarities, resolved })
    }

    /// 按 parentId 查询回复，不依赖父消息上的 replyIds
    pub async fn list_replies(&self, message_id: &str, user_id: &str, role: ParticipantKind, tenant_id: &str) -> Result<Vec<MessageView>, AppError> {
        let scoped = self.scoped(tenant_id);
        scoped.find_by_id(message_id).await?.ok_or(AppError::NotFound)?;
        let mut filter = doc! { "parentId": message_id };
        if !role.is_admin() {
            filter.insert("isVisible", true);
        }
        let replies = scoped.query(filter, Some(doc! { "createdAt": 1 })).await?;
        let replies = replies
            .into_iter()
            .filter(|m| role.is_admin() || m.recipient_id.is_none() || m.sender_id == user_id || m.recipient_id.as_deref() == Some(user_id))
            .collect();
        self.enrich_all(tenant_id, replies, user_id).await
    }

    /// 以子消息为准重建父消息的 replyIds / lastReplyAt
    pub async fn rebuild_reply_index(&self, message_id: &str, caller_role: ParticipantKind, tenant_id: &str) -> Result<Vec<String>, AppError> {
        require_admin(caller_role)?;
        let scoped = self.scoped(tenant_id);
        scoped.find_by_id(message_id).await?.ok_or(AppError::NotFound)?;
        let children = scoped.query(doc! { "parentId": message_id }, Some(doc! { "createdAt": 1 })).await?;
        let reply_ids: Vec<String> = children.iter().map(|c| c.id.clone()).collect();
        let last_reply_at = children.last().map(|c| Bson::Int64(c.created_at)).unwrap_or(Bson::Null);
        scoped
            .update_one(doc! { "_id": message_id }, doc! { "$set": { "replyIds": reply_ids.clone(), "lastReplyAt": last_reply_at } })
            .await?;
        Ok(reply_ids)
    }

    async fn enrich_all(&self, tenant_id: &str, messages: Vec<MessageEntity>, viewer_id: &str) -> Result<Vec<MessageView>, AppError> {
        let mut views = Vec::with_capacity(messages.len());
        for message in messages {
            if let Some(view) = self.enrich(tenant_id, message, viewer_id).await? {
                views.push(view);
            }
        }
        Ok(views)
    }

    /// 发送者无法解析的消息返回 `None`，由调用方丢弃
    async fn enrich(&self, tenant_id: &str, message: MessageEntity, viewer_id: &str) -> Result<Option<MessageView>, AppError> {
        let Some(sender) = self.participants.resolve(tenant_id, &message.sender_id, message.sender_kind).await? else {
            debug!("dropping message {} with orphaned sender {}", message.id, message.sender_id);
            return Ok(None);
        };
        let recipient = self.resolve_recipient(tenant_id, &message).await?;
        Ok(Some(MessageView::build(message, sender, recipient, viewer_id)))
    }

    async fn resolve_recipient(&self, tenant_id: &str, message: &MessageEntity) -> Result<Option<ParticipantRef>, AppError> {
        match (&message.recipient_id, message.recipient_kind) {
            (Some(id), Some(kind)) => self.participants.resolve(tenant_id, id, kind).await,
            (Some(id), None) => self.participants.identify_kind(tenant_id, id).await,
            (None, _) => Ok(None),
        }
    }
}

fn require_admin(role: ParticipantKind) -> Result<(), AppError> {
    if role.is_admin() { Ok(()) } else { Err(AppError::Forbidden) }
}

/// 双方之间的私聊（任一方向）
fn direct_chat_filter(a: &str, b: &str) -> Document {
    QueryBuilder::new()
        .eq("senderId", a)
        .eq("recipientId", b)
        .or()
        .eq("senderId", b)
        .eq("recipientId", a)
        .build()
}

fn validation_message(error: &validator::ValidationError) -> String {
    error.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| error.code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitys::participant_entity::{AdminEntity, MemberEntity};
    use common::config::CacheConfig;
    use common::memory_repository::MemoryRepository;

    const GYM: &str = "gym-a";
    const OTHER_GYM: &str = "gym-b";

    struct Fixture {
        service: MessageService,
        outbox: MessageOutbox,
    }

    async fn fixture() -> Fixture {
        let admins = MemoryRepository::<AdminEntity>::new();
        for (id, tenant, name) in [("admin-1", GYM, "Coach Carter"), ("admin-2", GYM, "Coach Taylor"), ("admin-b", OTHER_GYM, "Coach B")] {
            admins.insert(&AdminEntity { id: id.into(), tenant_id: tenant.into(), name: name.into(), ..Default::default() }).await.unwrap();
        }
        let members = MemoryRepository::<MemberEntity>::new();
        for (id, tenant, name) in [("member-1", GYM, "Alice"), ("member-2", GYM, "Bob"), ("member-b", OTHER_GYM, "Zed")] {
            members.insert(&MemberEntity { id: id.into(), tenant_id: tenant.into(), name: name.into(), ..Default::default() }).await.unwrap();
        }
        let participants = Arc::new(ParticipantService::new(Arc::new(admins), Arc::new(members), &CacheConfig::default()));
        let outbox = MessageOutbox::new(16);
        let service = MessageService::new(Arc::new(MemoryRepository::<MessageEntity>::new()), participants, outbox.clone());
        Fixture { service, outbox }
    }

    fn text(body: &str) -> CreateMessage {
        CreateMessage { text: body.to_string(), ..Default::default() }
    }

    fn private(body: &str, to: &str) -> CreateMessage {
        CreateMessage { text: body.to_string(), recipient_id: Some(to.to_string()), ..Default::default() }
    }

    async fn find(service: &MessageService, tenant: &str, id: &str) -> Option<MessageEntity> {
        service.scoped(tenant).find_by_id(id).await.unwrap()
    }

    #[tokio::test]
    async fn test_text_bounds() {
        let f = fixture().await;
        let s = &f.service;
        let too_long = "x".repeat(2001);
        for bad in ["", "   ", too_long.as_str()] {
            let err = s.create("member-1", ParticipantKind::Member, GYM, text(bad)).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        let ok = s.create("member-1", ParticipantKind::Member, GYM, text(&"x".repeat(2000))).await.unwrap();
        assert_eq!(ok.text.chars().count(), 2000);
    }

    #[tokio::test]
    async fn test_private_type_forced_by_role() {
        let f = fixture().await;
        let s = &f.service;
        let mut input = private("here is the answer", "member-1");
        input.message_type = Some(MessageType::Doubt);
        let from_admin = s.create("admin-1", ParticipantKind::Admin, GYM, input).await.unwrap();
        assert_eq!(from_admin.message_type, MessageType::Clarity);

        let mut input = private("question", "admin-1");
        input.message_type = Some(MessageType::Clarity);
        let from_member = s.create("member-1", ParticipantKind::Member, GYM, input).await.unwrap();
        assert_eq!(from_member.message_type, MessageType::Doubt);
        assert_eq!(from_member.recipient.unwrap().name, "Admin");
    }

    #[tokio::test]
    async fn test_common_type_defaults_to_doubt() {
        let f = fixture().await;
        let s = &f.service;
        let plain = s.create("member-1", ParticipantKind::Member, GYM, text("hello")).await.unwrap();
        assert_eq!(plain.message_type, MessageType::Doubt);
        let mut input = text("fyi");
        input.message_type = Some(MessageType::Clarity);
        let chosen = s.create("admin-1", ParticipantKind::Admin, GYM, input).await.unwrap();
        assert_eq!(chosen.message_type, MessageType::Clarity);
        assert!(chosen.recipient_id.is_none());
    }

    #[tokio::test]
    async fn test_unknown_or_foreign_recipient_rejected() {
        let f = fixture().await;
        let s = &f.service;
        for to in ["ghost", "member-b"] {
            let err = s.create("member-1", ParticipantKind::Member, GYM, private("hi", to)).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_blank_recipient_is_not_published_as_common() {
        let f = fixture().await;
        let s = &f.service;
        let mut events = f.outbox.subscribe();
        for to in ["", "   "] {
            let err = s.create("member-1", ParticipantKind::Member, GYM, private("my private injury details", to)).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        assert!(s.list_for_user("member-2", ParticipantKind::Member, GYM).await.unwrap().is_empty());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reply_scenario() {
        let f = fixture().await;
        let s = &f.service;
        let question = s.create("member-1", ParticipantKind::Member, GYM, private("Why is my form wrong?", "admin-1")).await.unwrap();
        assert_eq!(question.message_type, MessageType::Doubt);
        assert_eq!(question.recipient_id.as_deref(), Some("admin-1"));

        let reply = CreateMessage {
            text: "Keep your elbows in".into(),
            recipient_id: Some("member-1".into()),
            message_type: Some(MessageType::Doubt),
            parent_id: Some(question.id.clone()),
        };
        let answer = s.create("admin-1", ParticipantKind::Admin, GYM, reply).await.unwrap();
        assert_eq!(answer.message_type, MessageType::Clarity);

        let parent = find(s, GYM, &question.id).await.unwrap();
        assert_eq!(parent.reply_ids, vec![answer.id.clone()]);
        assert_eq!(parent.last_reply_at, Some(answer.created_at));
    }

    #[tokio::test]
    async fn test_reply_to_missing_parent_still_created() {
        let f = fixture().await;
        let s = &f.service;
        let mut input = text("orphan reply");
        input.parent_id = Some("does-not-exist".into());
        let created = s.create("member-1", ParticipantKind::Member, GYM, input).await.unwrap();
        assert!(find(s, GYM, &created.id).await.is_some());
    }

    #[tokio::test]
    async fn test_create_publishes_event() {
        let f = fixture().await;
        let mut rx = f.outbox.subscribe();
        let created = f.service.create("member-1", ParticipantKind::Member, GYM, text("ping")).await.unwrap();
        let MessageEvent::Created { tenant_id, message } = rx.recv().await.unwrap();
        assert_eq!(tenant_id, GYM);
        assert_eq!(message, created);
    }

    #[tokio::test]
    async fn test_create_without_subscribers_succeeds() {
        let f = fixture().await;
        assert!(f.service.create("member-1", ParticipantKind::Member, GYM, text("nobody listening")).await.is_ok());
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let f = fixture().await;
        let s = &f.service;
        let m = s.create("member-1", ParticipantKind::Member, GYM, text("secret")).await.unwrap();

        assert!(matches!(s.toggle_visibility(&m.id, "admin-b", ParticipantKind::Admin, OTHER_GYM).await, Err(AppError::NotFound)));
        assert!(matches!(s.resolve(&m.id, ParticipantKind::Admin, OTHER_GYM).await, Err(AppError::NotFound)));
        assert!(matches!(s.delete(&m.id, ParticipantKind::Admin, OTHER_GYM).await, Err(AppError::NotFound)));
        assert!(matches!(s.mark_read(&m.id, "member-b", OTHER_GYM).await, Err(AppError::NotFound)));
        assert!(s.list_for_user("member-b", ParticipantKind::Member, OTHER_GYM).await.unwrap().is_empty());
        assert_eq!(s.stats(OTHER_GYM).await.unwrap(), MessageStats::default());

        let untouched = find(s, GYM, &m.id).await.unwrap();
        assert!(untouched.is_visible);
        assert!(!untouched.is_resolved);
    }

    #[tokio::test]
    async fn test_toggle_visibility_permissions() {
        let f = fixture().await;
        let s = &f.service;
        let m = s.create("member-1", ParticipantKind::Member, GYM, text("hide me")).await.unwrap();

        assert!(matches!(s.toggle_visibility(&m.id, "member-2", ParticipantKind::Member, GYM).await, Err(AppError::Forbidden)));
        assert!(!s.toggle_visibility(&m.id, "member-1", ParticipantKind::Member, GYM).await.unwrap());
        assert!(s.toggle_visibility(&m.id, "admin-1", ParticipantKind::Admin, GYM).await.unwrap());
        assert!(matches!(s.toggle_visibility("missing", "admin-1", ParticipantKind::Admin, GYM).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn test_hidden_messages_only_listed_for_admins() {
        let f = fixture().await;
        let s = &f.service;
        let m = s.create("member-1", ParticipantKind::Member, GYM, text("oops")).await.unwrap();
        s.toggle_visibility(&m.id, "member-1", ParticipantKind::Member, GYM).await.unwrap();

        assert!(s.list_for_user("member-2", ParticipantKind::Member, GYM).await.unwrap().is_empty());
        assert_eq!(s.list_for_user("admin-1", ParticipantKind::Admin, GYM).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_requires_admin() {
        let f = fixture().await;
        let s = &f.service;
        let m = s.create("member-1", ParticipantKind::Member, GYM, text("q")).await.unwrap();
        assert!(matches!(s.resolve(&m.id, ParticipantKind::Member, GYM).await, Err(AppError::Forbidden)));
        s.resolve(&m.id, ParticipantKind::Admin, GYM).await.unwrap();
        assert!(find(s, GYM, &m.id).await.unwrap().is_resolved);
        assert!(matches!(s.resolve("missing", ParticipantKind::Admin, GYM).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_replies() {
        let f = fixture().await;
        let s = &f.service;
        let parent = s.create("member-1", ParticipantKind::Member, GYM, text("parent")).await.unwrap();
        let mut reply_ids = vec![];
        for i in 0..3 {
            let mut input = text(&format!("reply {}", i));
            input.parent_id = Some(parent.id.clone());
            reply_ids.push(s.create("admin-1", ParticipantKind::Admin, GYM, input).await.unwrap().id);
        }
        let bystander = s.create("member-2", ParticipantKind::Member, GYM, text("unrelated")).await.unwrap();

        assert!(matches!(s.delete(&parent.id, ParticipantKind::Member, GYM).await, Err(AppError::Forbidden)));
        s.delete(&parent.id, ParticipantKind::Admin, GYM).await.unwrap();

        assert!(find(s, GYM, &parent.id).await.is_none());
        for id in &reply_ids {
            assert!(find(s, GYM, id).await.is_none());
        }
        assert!(find(s, GYM, &bystander.id).await.is_some());
    }

    #[tokio::test]
    async fn test_delete_reply_unlinks_from_parent() {
        let f = fixture().await;
        let s = &f.service;
        let parent = s.create("member-1", ParticipantKind::Member, GYM, text("parent")).await.unwrap();
        let mut input = text("reply");
        input.parent_id = Some(parent.id.clone());
        let reply = s.create("admin-1", ParticipantKind::Admin, GYM, input).await.unwrap();

        s.delete(&reply.id, ParticipantKind::Admin, GYM).await.unwrap();
        let parent = find(s, GYM, &parent.id).await.unwrap();
        assert!(parent.reply_ids.is_empty());
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let f = fixture().await;
        let s = &f.service;
        let m = s.create("admin-1", ParticipantKind::Admin, GYM, private("answer", "member-1")).await.unwrap();
        s.mark_read(&m.id, "member-1", GYM).await.unwrap();
        s.mark_read(&m.id, "member-1", GYM).await.unwrap();
        let stored = find(s, GYM, &m.id).await.unwrap();
        assert_eq!(stored.read_by, vec!["member-1".to_string()]);

        let listed = s.list_for_user("member-1", ParticipantKind::Member, GYM).await.unwrap();
        assert!(listed[0].is_read);
        assert!(matches!(s.mark_read("missing", "member-1", GYM).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn test_unread_counts_and_mark_chat_read() {
        let f = fixture().await;
        let s = &f.service;
        s.create("admin-1", ParticipantKind::Admin, GYM, private("one", "member-1")).await.unwrap();
        s.create("admin-1", ParticipantKind::Admin, GYM, private("two", "member-1")).await.unwrap();
        s.create("member-2", ParticipantKind::Member, GYM, private("hey", "member-1")).await.unwrap();
        s.create("member-1", ParticipantKind::Member, GYM, private("mine", "admin-1")).await.unwrap();

        let counts = s.unread_counts("member-1", GYM).await.unwrap();
        assert_eq!(counts.get("admin-1"), Some(&2));
        assert_eq!(counts.get("member-2"), Some(&1));

        // 双向共三条，包括自己发出的那条
        assert_eq!(s.mark_chat_read("member-1", "admin-1", GYM).await.unwrap(), 3);
        assert_eq!(s.mark_chat_read("member-1", "admin-1", GYM).await.unwrap(), 0);
        let counts = s.unread_counts("member-1", GYM).await.unwrap();
        assert_eq!(counts.get("admin-1"), None);
        assert_eq!(counts.get("member-2"), Some(&1));

        assert!(matches!(s.mark_chat_read("member-1", " ", GYM).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_hidden_private_messages_excluded_from_unread() {
        let f = fixture().await;
        let s = &f.service;
        let hidden = s.create("admin-1", ParticipantKind::Admin, GYM, private("wrong member", "member-1")).await.unwrap();
        s.create("admin-1", ParticipantKind::Admin, GYM, private("your plan renews monday", "member-1")).await.unwrap();
        assert!(!s.toggle_visibility(&hidden.id, "admin-1", ParticipantKind::Admin, GYM).await.unwrap());

        let counts = s.unread_counts("member-1", GYM).await.unwrap();
        assert_eq!(counts.get("admin-1"), Some(&1));

        assert_eq!(s.mark_chat_read("member-1", "admin-1", GYM).await.unwrap(), 1);
        assert!(!find(s, GYM, &hidden.id).await.unwrap().is_read_by("member-1"));
        assert!(s.unread_counts("member-1", GYM).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unread_scenario_single_private_message() {
        let f = fixture().await;
        let s = &f.service;
        s.create("admin-1", ParticipantKind::Admin, GYM, private("see me after class", "member-2")).await.unwrap();
        let counts = s.unread_counts("member-2", GYM).await.unwrap();
        assert_eq!(counts.into_iter().collect::<Vec<_>>(), vec![("admin-1".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_stats_scenario() {
        let f = fixture().await;
        let s = &f.service;
        for who in ["member-1", "member-2"] {
            let mut input = text("is the gym open on sunday?");
            input.message_type = Some(MessageType::Doubt);
            s.create(who, ParticipantKind::Member, GYM, input).await.unwrap();
        }
        let stats = s.stats(GYM).await.unwrap();
        assert_eq!(stats, MessageStats { total: 2, common: 2, private: 0, doubts: 2, clarities: 0, resolved: 0 });
    }

    #[tokio::test]
    async fn test_list_scoped_to_participants_and_ordered() {
        let f = fixture().await;
        let s = &f.service;
        let first = s.create("member-1", ParticipantKind::Member, GYM, text("first")).await.unwrap();
        let dm = s.create("member-2", ParticipantKind::Member, GYM, private("private to admin", "admin-1")).await.unwrap();
        let last = s.create("admin-2", ParticipantKind::Admin, GYM, text("last")).await.unwrap();

        let for_alice = s.list_for_user("member-1", ParticipantKind::Member, GYM).await.unwrap();
        assert_eq!(for_alice.iter().map(|m| m.id.clone()).collect::<Vec<_>>(), vec![first.id.clone(), last.id.clone()]);
        assert_eq!(for_alice[1].sender.name, "Admin");

        let for_admin = s.list_for_user("admin-1", ParticipantKind::Admin, GYM).await.unwrap();
        assert!(for_admin.iter().any(|m| m.id == dm.id));
    }

    #[tokio::test]
    async fn test_list_drops_orphaned_sender() {
        let f = fixture().await;
        let s = &f.service;
        let orphan = MessageEntity {
            id: "orphan".into(),
            text: "from a deleted account".into(),
            tenant_id: GYM.into(),
            sender_id: "deleted-member".into(),
            sender_kind: ParticipantKind::Member,
            recipient_id: None,
            recipient_kind: None,
            message_type: MessageType::Doubt,
            is_visible: true,
            is_resolved: false,
            parent_id: None,
            reply_ids: vec![],
            last_reply_at: None,
            read_by: vec![],
            created_at: 1,
        };
        s.scoped(GYM).insert(&orphan).await.unwrap();
        s.create("member-1", ParticipantKind::Member, GYM, text("still here")).await.unwrap();
        let listed = s.list_for_user("member-1", ParticipantKind::Member, GYM).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].text, "still here");
    }

    #[tokio::test]
    async fn test_rebuild_reply_index_repairs_drift() {
        let f = fixture().await;
        let s = &f.service;
        let parent = s.create("member-1", ParticipantKind::Member, GYM, text("parent")).await.unwrap();
        let mut input = text("reply");
        input.parent_id = Some(parent.id.clone());
        let reply = s.create("admin-1", ParticipantKind::Admin, GYM, input).await.unwrap();

        // 模拟并发追加丢失
        s.scoped(GYM).update_one(doc! { "_id": parent.id.as_str() }, doc! { "$set": { "replyIds": [] } }).await.unwrap();

        assert!(matches!(s.rebuild_reply_index(&parent.id, ParticipantKind::Member, GYM).await, Err(AppError::Forbidden)));
        let rebuilt = s.rebuild_reply_index(&parent.id, ParticipantKind::Admin, GYM).await.unwrap();
        assert_eq!(rebuilt, vec![reply.id.clone()]);
        assert_eq!(find(s, GYM, &parent.id).await.unwrap().reply_ids, vec![reply.id.clone()]);

        let replies = s.list_replies(&parent.id, "member-1", ParticipantKind::Member, GYM).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].sender.name, "Admin");
    }
}
