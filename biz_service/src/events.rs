//! 消息领域事件
//!
//! 持久化成功后由 `MessageService` 投递到 [`MessageOutbox`]，推送层订阅后自行分发；
//! 没有订阅者或订阅者落后都不会影响写操作本身。

use crate::entitys::message_view::MessageView;
use log::{debug, warn};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq)]
pub enum MessageEvent {
    Created { tenant_id: String, message: MessageView },
}

impl MessageEvent {
    pub fn tenant_id(&self) -> &str {
        match self {
            MessageEvent::Created { tenant_id, .. } => tenant_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessageOutbox {
    sender: broadcast::Sender<MessageEvent>,
}

impl MessageOutbox {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MessageEvent> {
        self.sender.subscribe()
    }

    /// 投递事件，失败只记录日志
    pub fn publish(&self, event: MessageEvent) {
        match self.sender.send(event) {
            Ok(receivers) => debug!("message event delivered to {} subscriber(s)", receivers),
            Err(broadcast::error::SendError(event)) => {
                warn!("no subscriber for message event, tenant={}", event.tenant_id());
            }
        }
    }
}

impl Default for MessageOutbox {
    fn default() -> Self {
        Self::new(1024)
    }
}
