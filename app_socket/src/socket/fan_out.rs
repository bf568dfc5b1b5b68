use crate::manager::socket_manager::SocketManager;
use biz_service::events::MessageEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// 订阅消息事件并推送给在线连接，直到发件箱关闭
pub async fn start_fan_out(mut receiver: broadcast::Receiver<MessageEvent>, manager: Arc<SocketManager>) {
    log::info!("🚀 消息推送任务启动");
    loop {
        match receiver.recv().await {
            Ok(event) => {
                if let Err(e) = manager.dispatch(&event) {
                    log::error!("❌ 消息推送失败 tenant={}: {}", event.tenant_id(), e);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("⚠️ 推送任务落后，丢弃 {} 条事件", skipped);
            }
            Err(RecvError::Closed) => {
                log::info!("消息发件箱已关闭，推送任务退出");
                break;
            }
        }
    }
}
