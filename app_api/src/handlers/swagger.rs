use crate::handlers::message_handler::*;
use actix_web::{HttpResponse, Responder, get, web};
use biz_service::entitys::message_entity::{MessageType, ParticipantKind};
use biz_service::entitys::message_view::{MessageStats, MessageView, ParticipantRef};
use common::errors::AppError;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        //答疑消息
        message_list,
        message_create,
        message_toggle,
        message_resolve,
        message_delete,
        message_stats,
        message_mark_read,
        message_mark_chat_read,
        message_unread_counts,
        message_replies,
        message_reindex,
    ),
    components(schemas(
        MessageView,
        MessageStats,
        ParticipantRef,
        ParticipantKind,
        MessageType,
        CreateMessageDto,
        MarkChatReadDto,
        ToggleResult,
        CountResult,
        ReplyIndexResult,
    )),
    tags(
        (name = "答疑消息", description = "Doubts / Clarity messaging")
    )
)]
struct ApiDoc;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(openapi_json);
}

#[get("/api-doc/openapi.json")]
async fn openapi_json() -> Result<impl Responder, AppError> {
    let json = ApiDoc::openapi().to_json()?;
    Ok(HttpResponse::Ok().content_type("application/json").body(json))
}
