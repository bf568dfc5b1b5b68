use crate::auth::AuthUser;
use crate::result::result;
use actix_web::{HttpResponse, Responder, delete, get, post, put, web};
use biz_service::biz_service::message_service::{CreateMessage, MessageService};
use biz_service::entitys::message_entity::MessageType;
use biz_service::entitys::message_view::{MessageStats, MessageView};
use common::errors::AppError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use validator::Validate;

pub fn configure(cfg: &mut web::ServiceConfig) {
    // 固定路径先于 {id} 路径注册
    cfg.service(message_stats)
        .service(message_unread_counts)
        .service(message_mark_chat_read)
        .service(message_list)
        .service(message_create)
        .service(message_toggle)
        .service(message_resolve)
        .service(message_delete)
        .service(message_mark_read)
        .service(message_replies)
        .service(message_reindex);
}

/// 新建消息请求体
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageDto {
    /// 消息正文，去除首尾空白后 1..=2000 字符
    #[schema(example = "Is the pool open on Sunday?")]
    #[validate(length(min = 1, message = "Message text is required"))]
    pub text: String,
    /// 私聊接收方（管理员或会员 ID），为空表示公共消息
    #[validate(length(min = 1, message = "recipientId must not be blank"))]
    pub recipient_id: Option<String>,
    /// 公共消息类型，默认 doubt；私聊忽略
    pub message_type: Option<MessageType>,
    /// 回复的父消息
    #[validate(length(min = 1, message = "parentId must not be blank"))]
    pub parent_id: Option<String>,
}

impl From<CreateMessageDto> for CreateMessage {
    fn from(dto: CreateMessageDto) -> Self {
        CreateMessage { text: dto.text, recipient_id: dto.recipient_id, message_type: dto.message_type, parent_id: dto.parent_id }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MarkChatReadDto {
    /// 会话对方 ID
    #[validate(length(min = 1, message = "otherUserId is required"))]
    pub other_user_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResult {
    pub is_visible: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CountResult {
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplyIndexResult {
    pub reply_ids: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/messages",
    summary = "消息列表",
    tag = "答疑消息",
    responses(
        (status = 200, description = "当前用户可见的消息，按创建时间正序", body = Vec<MessageView>)
    )
)]
#[get("/messages")]
pub async fn message_list(user: AuthUser, service: web::Data<MessageService>) -> Result<impl Responder, AppError> {
    let list = service.list_for_user(&user.user_id, user.role, &user.tenant_id).await?;
    Ok(web::Json(list))
}

#[utoipa::path(
    post,
    path = "/messages",
    summary = "发送消息",
    tag = "答疑消息",
    request_body = CreateMessageDto,
    responses(
        (status = 201, description = "已创建", body = MessageView),
        (status = 400, description = "参数错误")
    )
)]
#[post("/messages")]
pub async fn message_create(user: AuthUser, dto: web::Json<CreateMessageDto>, service: web::Data<MessageService>) -> Result<impl Responder, AppError> {
    dto.validate()?;
    let created = service.create(&user.user_id, user.role, &user.tenant_id, dto.into_inner().into()).await?;
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    put,
    path = "/messages/{id}/toggle",
    summary = "切换可见性（发送者或管理员）",
    tag = "答疑消息",
    params(("id" = String, Path, description = "消息 ID")),
    responses(
        (status = 200, description = "切换后的可见性", body = ToggleResult),
        (status = 403, description = "无权限"),
        (status = 404, description = "消息不存在")
    )
)]
#[put("/messages/{id}/toggle")]
pub async fn message_toggle(user: AuthUser, id: web::Path<String>, service: web::Data<MessageService>) -> Result<impl Responder, AppError> {
    let is_visible = service.toggle_visibility(&id, &user.user_id, user.role, &user.tenant_id).await?;
    Ok(web::Json(ToggleResult { is_visible }))
}

#[utoipa::path(
    put,
    path = "/messages/{id}/resolve",
    summary = "标记已解决（管理员）",
    tag = "答疑消息",
    params(("id" = String, Path, description = "消息 ID")),
    responses(
        (status = 200, description = "成功"),
        (status = 403, description = "无权限"),
        (status = 404, description = "消息不存在")
    )
)]
#[put("/messages/{id}/resolve")]
pub async fn message_resolve(user: AuthUser, id: web::Path<String>, service: web::Data<MessageService>) -> Result<impl Responder, AppError> {
    service.resolve(&id, user.role, &user.tenant_id).await?;
    Ok(web::Json(result()))
}

#[utoipa::path(
    delete,
    path = "/messages/{id}",
    summary = "删除消息及其回复（管理员）",
    tag = "答疑消息",
    params(("id" = String, Path, description = "消息 ID")),
    responses(
        (status = 200, description = "成功"),
        (status = 403, description = "无权限"),
        (status = 404, description = "消息不存在")
    )
)]
#[delete("/messages/{id}")]
pub async fn message_delete(user: AuthUser, id: web::Path<String>, service: web::Data<MessageService>) -> Result<impl Responder, AppError> {
    service.delete(&id, user.role, &user.tenant_id).await?;
    Ok(web::Json(result()))
}

#[utoipa::path(
    get,
    path = "/messages/stats",
    summary = "场馆消息统计（管理员）",
    tag = "答疑消息",
    responses(
        (status = 200, description = "统计结果", body = MessageStats),
        (status = 403, description = "无权限")
    )
)]
#[get("/messages/stats")]
pub async fn message_stats(user: AuthUser, service: web::Data<MessageService>) -> Result<impl Responder, AppError> {
    if !user.role.is_admin() {
        return Err(AppError::Forbidden);
    }
    let stats = service.stats(&user.tenant_id).await?;
    Ok(web::Json(stats))
}

#[utoipa::path(
    post,
    path = "/messages/{id}/read",
    summary = "标记单条已读",
    tag = "答疑消息",
    params(("id" = String, Path, description = "消息 ID")),
    responses(
        (status = 200, description = "成功"),
        (status = 404, description = "消息不存在")
    )
)]
#[post("/messages/{id}/read")]
pub async fn message_mark_read(user: AuthUser, id: web::Path<String>, service: web::Data<MessageService>) -> Result<impl Responder, AppError> {
    service.mark_read(&id, &user.user_id, &user.tenant_id).await?;
    Ok(web::Json(result()))
}

#[utoipa::path(
    post,
    path = "/messages/mark-chat-read",
    summary = "会话全部标记已读",
    tag = "答疑消息",
    request_body = MarkChatReadDto,
    responses(
        (status = 200, description = "本次新标记的条数", body = CountResult),
        (status = 400, description = "参数错误")
    )
)]
#[post("/messages/mark-chat-read")]
pub async fn message_mark_chat_read(user: AuthUser, dto: web::Json<MarkChatReadDto>, service: web::Data<MessageService>) -> Result<impl Responder, AppError> {
    dto.validate()?;
    let count = service.mark_chat_read(&user.user_id, &dto.other_user_id, &user.tenant_id).await?;
    Ok(web::Json(CountResult { count }))
}

#[utoipa::path(
    get,
    path = "/messages/unread-counts",
    summary = "按发送方统计未读私聊",
    tag = "答疑消息",
    responses(
        (status = 200, description = "发送方 ID -> 未读数", body = BTreeMap<String, u64>)
    )
)]
#[get("/messages/unread-counts")]
pub async fn message_unread_counts(user: AuthUser, service: web::Data<MessageService>) -> Result<impl Responder, AppError> {
    let counts = service.unread_counts(&user.user_id, &user.tenant_id).await?;
    Ok(web::Json(counts))
}

#[utoipa::path(
    get,
    path = "/messages/{id}/replies",
    summary = "回复列表",
    tag = "答疑消息",
    params(("id" = String, Path, description = "父消息 ID")),
    responses(
        (status = 200, description = "按时间正序的回复", body = Vec<MessageView>),
        (status = 404, description = "消息不存在")
    )
)]
#[get("/messages/{id}/replies")]
pub async fn message_replies(user: AuthUser, id: web::Path<String>, service: web::Data<MessageService>) -> Result<impl Responder, AppError> {
    let replies = service.list_replies(&id, &user.user_id, user.role, &user.tenant_id).await?;
    Ok(web::Json(replies))
}

#[utoipa::path(
    put,
    path = "/messages/{id}/reindex",
    summary = "重建回复索引（管理员）",
    tag = "答疑消息",
    params(("id" = String, Path, description = "父消息 ID")),
    responses(
        (status = 200, description = "重建后的回复 ID", body = ReplyIndexResult),
        (status = 403, description = "无权限"),
        (status = 404, description = "消息不存在")
    )
)]
#[put("/messages/{id}/reindex")]
pub async fn message_reindex(user: AuthUser, id: web::Path<String>, service: web::Data<MessageService>) -> Result<impl Responder, AppError> {
    let reply_ids = service.rebuild_reply_index(&id, user.role, &user.tenant_id).await?;
    Ok(web::Json(ReplyIndexResult { reply_ids }))
}
