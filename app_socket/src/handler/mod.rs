use crate::manager::socket_error::SendError;
use crate::manager::socket_manager::{ConnectionId, SocketManager};
use crate::protocol::socket_event::{ClientEvent, PresenceIdentity};
use biz_service::biz_service::participant_service::ParticipantService;

/// 处理客户端上行事件
pub async fn handle_client_event(manager: &SocketManager, participants: &ParticipantService, conn_id: &ConnectionId, event: ClientEvent) -> Result<(), SendError> {
    match event {
        ClientEvent::Register(identity) => {
            let verified = verify_identity(participants, identity).await?;
            manager.register(conn_id, verified)
        }
        ClientEvent::DraftMessage(draft) => {
            // 草稿不落库，也不转发
            log::debug!("📝 收到草稿 {:?}: {}", conn_id, draft);
            manager.touch(conn_id);
            Ok(())
        }
        ClientEvent::Ping => {
            manager.touch(conn_id);
            log::debug!("🫀 收到客户端心跳 {:?}", conn_id);
            Ok(())
        }
    }
}

/// 用户必须以声明的角色存在于声明的租户中，展示名以目录为准
async fn verify_identity(participants: &ParticipantService, identity: PresenceIdentity) -> Result<PresenceIdentity, SendError> {
    let participant = participants
        .resolve(&identity.tenant_id, &identity.user_id, identity.role)
        .await?
        .ok_or_else(|| SendError::UnknownParticipant(identity.user_id.clone()))?;
    Ok(PresenceIdentity { name: participant.name, ..identity })
}
