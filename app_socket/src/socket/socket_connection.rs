use crate::handler::handle_client_event;
use crate::manager::socket_error::SendError;
use crate::manager::socket_manager::{ConnectionId, ConnectionInfo, SocketManager};
use crate::protocol::socket_event::{ClientEvent, ServerEvent};
use anyhow::Result;
use biz_service::biz_service::participant_service::ParticipantService;
use common::util::common_utils::build_id;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;

/// 客户端连接处理入口
pub async fn handle_connection(stream: TcpStream, manager: Arc<SocketManager>, participants: Arc<ParticipantService>) -> Result<()> {
    let conn_id = ConnectionId(build_id());
    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(read_half, LengthDelimitedCodec::new());
    let mut writer = FramedWrite::new(write_half, LengthDelimitedCodec::new());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let connection = ConnectionInfo::new(tx);
    let closed = connection.closed.clone();
    manager.insert(conn_id.clone(), connection);

    // 写任务
    let write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = writer.send(msg).await {
                log::warn!("❌ 写入客户端失败: {:?}", e);
                break;
            }
        }
    });

    let result = tokio::select! {
        result = read_loop(&mut reader, &conn_id, &manager, &participants) => result,
        _ = closed.cancelled() => {
            log::info!("🔌 连接已被服务端移除 {:?}", conn_id);
            Ok(())
        }
    };

    manager.remove(&conn_id);
    write_task.abort();
    result
}

/// 读取客户端帧并分发
async fn read_loop(
    reader: &mut FramedRead<OwnedReadHalf, LengthDelimitedCodec>,
    conn_id: &ConnectionId,
    manager: &SocketManager,
    participants: &ParticipantService,
) -> Result<()> {
    while let Some(frame) = reader.next().await {
        let bytes = frame?;
        match ClientEvent::decode(&bytes) {
            Ok(event) => match handle_client_event(manager, participants, conn_id, event).await {
                Ok(()) => {}
                Err(SendError::UnknownParticipant(user_id)) => {
                    log::warn!("⚠️ 拒绝注册 {:?}: {}", conn_id, user_id);
                    manager.send_to_connection(conn_id, &ServerEvent::Error { msg: "unknown participant".to_string() })?;
                }
                Err(e) => log::warn!("⚠️ 事件处理失败 {:?}: {}", conn_id, e),
            },
            Err(e) => {
                log::warn!("⚠️ 无法解析的帧 {:?}: {}", conn_id, e);
                let reply = ServerEvent::Error { msg: format!("invalid frame: {}", e) };
                manager.send_to_connection(conn_id, &reply)?;
            }
        }
    }
    Ok(())
}
