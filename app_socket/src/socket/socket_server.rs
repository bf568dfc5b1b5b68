use crate::manager::socket_manager::SocketManager;
use crate::socket::fan_out::start_fan_out;
use crate::socket::socket_connection::handle_connection;
use biz_service::biz_service::participant_service::ParticipantService;
use biz_service::events::MessageOutbox;
use std::sync::Arc;
use tokio::net::TcpListener;

/// 启动 TCP 推送服务 + 消息推送任务
pub async fn start_server(listener: TcpListener, manager: Arc<SocketManager>, participants: Arc<ParticipantService>, outbox: &MessageOutbox) -> anyhow::Result<()> {
    tokio::spawn(start_fan_out(outbox.subscribe(), Arc::clone(&manager)));

    log::info!("✅ 推送服务已启动，监听 {}", listener.local_addr()?);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                log::info!("📡 新连接建立 [{}]", addr);
                let manager = Arc::clone(&manager);
                let participants = Arc::clone(&participants);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, manager, participants).await {
                        log::error!("❌ 连接处理失败 [{}]: {:?}", addr, e);
                    } else {
                        log::info!("🔌 连接处理完成 [{}]", addr);
                    }
                });
            }
            Err(e) => {
                log::error!("❌ TCP 连接接收失败: {:?}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::socket_event::{ClientEvent, PresenceIdentity, ServerEvent};
    use biz_service::biz_service::Repositories;
    use biz_service::entitys::message_entity::{MessageType, ParticipantKind};
    use biz_service::entitys::message_view::{MessageView, ParticipantRef};
    use biz_service::entitys::participant_entity::MemberEntity;
    use biz_service::events::MessageEvent;
    use bytes::Bytes;
    use common::config::CacheConfig;
    use common::repository_util::Repository;
    use common::util::date_util::now_millis;
    use futures::{SinkExt, StreamExt};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio::time::timeout;
    use tokio_util::codec::{Framed, LengthDelimitedCodec};

    type Client = Framed<TcpStream, LengthDelimitedCodec>;

    async fn spawn_server() -> (SocketAddr, Arc<SocketManager>, MessageOutbox) {
        let repos = Repositories::memory();
        repos.members.insert(&MemberEntity { id: "m1".into(), tenant_id: "gym".into(), name: "Apollo".into(), ..Default::default() }).await.unwrap();
        let participants = Arc::new(ParticipantService::new(repos.admins.clone(), repos.members.clone(), &CacheConfig::default()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let manager = Arc::new(SocketManager::new());
        let outbox = MessageOutbox::default();
        let server_outbox = outbox.clone();
        let server_manager = Arc::clone(&manager);
        tokio::spawn(async move { start_server(listener, server_manager, participants, &server_outbox).await });
        (addr, manager, outbox)
    }

    async fn connect(addr: SocketAddr) -> Client {
        Framed::new(TcpStream::connect(addr).await.unwrap(), LengthDelimitedCodec::new())
    }

    async fn next_event(client: &mut Client) -> ServerEvent {
        let frame = timeout(Duration::from_secs(5), client.next()).await.unwrap().unwrap().unwrap();
        serde_json::from_slice(&frame).unwrap()
    }

    async fn send(client: &mut Client, event: &ClientEvent) {
        client.send(Bytes::from(serde_json::to_vec(event).unwrap())).await.unwrap();
    }

    async fn wait_until_empty(manager: &SocketManager) {
        for _ in 0..50 {
            if manager.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(manager.is_empty());
    }

    fn apollo() -> PresenceIdentity {
        PresenceIdentity { user_id: "m1".into(), role: ParticipantKind::Member, name: "Apollo".into(), tenant_id: "gym".into() }
    }

    #[tokio::test]
    async fn test_register_and_receive_message_over_tcp() {
        let (addr, manager, outbox) = spawn_server().await;
        let mut client = connect(addr).await;

        client.send(Bytes::from_static(b"not json")).await.unwrap();
        assert!(matches!(next_event(&mut client).await, ServerEvent::Error { .. }));

        send(&mut client, &ClientEvent::Register(apollo())).await;
        assert_eq!(next_event(&mut client).await, ServerEvent::PresenceUpdated { users: vec![apollo()] });

        let message = MessageView {
            id: "msg1".into(),
            text: "Is the sauna open?".into(),
            sender: ParticipantRef { id: "m2".into(), name: "Ivan".into(), kind: ParticipantKind::Member },
            recipient_id: None,
            recipient: None,
            message_type: MessageType::Doubt,
            is_visible: true,
            is_resolved: false,
            parent_id: None,
            reply_ids: vec![],
            last_reply_at: None,
            is_read: false,
            created_at: 1,
        };
        outbox.publish(MessageEvent::Created { tenant_id: "gym".into(), message: message.clone() });
        assert_eq!(next_event(&mut client).await, ServerEvent::MessageCreated(message));

        drop(client);
        wait_until_empty(&manager).await;
    }

    #[tokio::test]
    async fn test_forged_register_gets_error_and_stays_offline() {
        let (addr, manager, _outbox) = spawn_server().await;
        let mut client = connect(addr).await;

        let forged = PresenceIdentity { tenant_id: "other-gym".into(), ..apollo() };
        send(&mut client, &ClientEvent::Register(forged)).await;
        assert!(matches!(next_event(&mut client).await, ServerEvent::Error { .. }));
        assert!(manager.presence("other-gym").is_empty());
        assert!(manager.presence("gym").is_empty());
    }

    #[tokio::test]
    async fn test_stale_removal_closes_connection() {
        let (addr, manager, _outbox) = spawn_server().await;
        let mut client = connect(addr).await;
        send(&mut client, &ClientEvent::Register(apollo())).await;
        next_event(&mut client).await;

        let removed = manager.remove_stale(now_millis() + 60_000, 0);
        assert_eq!(removed.len(), 1);

        // 服务端关闭连接后客户端读到 EOF
        let end = timeout(Duration::from_secs(5), client.next()).await.unwrap();
        assert!(end.is_none());
        wait_until_empty(&manager).await;
    }
}
