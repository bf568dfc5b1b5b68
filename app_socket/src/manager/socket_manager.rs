use crate::manager::socket_error::SendError;
use crate::protocol::socket_event::{PresenceIdentity, PrivateNotification, ServerEvent};
use biz_service::events::MessageEvent;
use biz_service::entitys::message_view::MessageView;
use bytes::Bytes;
use common::util::date_util::now_millis;
use dashmap::DashMap;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct ConnectionInfo {
    /// 注册前为空，未注册的连接不参与任何推送
    pub identity: Option<PresenceIdentity>,
    pub sender: mpsc::UnboundedSender<Bytes>,
    /// 最近一次心跳（毫秒）
    pub last_heartbeat: Arc<AtomicI64>,
    /// 连接被移除时取消，读循环随之退出
    pub closed: CancellationToken,
}

impl ConnectionInfo {
    pub fn new(sender: mpsc::UnboundedSender<Bytes>) -> Self {
        Self { identity: None, sender, last_heartbeat: Arc::new(AtomicI64::new(now_millis())), closed: CancellationToken::new() }
    }

    fn in_tenant(&self, tenant_id: &str) -> bool {
        self.identity.as_ref().is_some_and(|identity| identity.tenant_id == tenant_id)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ConnectionId(pub String);

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        ConnectionId(id)
    }
}

/// 在线连接表，每个推送服务实例一份
#[derive(Default)]
pub struct SocketManager {
    connections: DashMap<ConnectionId, ConnectionInfo>,
}

impl SocketManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: impl Into<ConnectionId>, conn: ConnectionInfo) {
        self.connections.insert(id.into(), conn);
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// 绑定身份并向该租户广播在线列表
    pub fn register(&self, id: &ConnectionId, identity: PresenceIdentity) -> Result<(), SendError> {
        let tenant_id = identity.tenant_id.clone();
        let previous = {
            let mut conn = self.connections.get_mut(id).ok_or(SendError::ConnectionNotFound)?;
            conn.last_heartbeat.store(now_millis(), Ordering::Relaxed);
            conn.identity.replace(identity)
        };
        info!("🟢 连接注册 {:?} tenant={}", id, tenant_id);

        if let Some(previous) = previous.filter(|p| p.tenant_id != tenant_id) {
            self.broadcast_presence(&previous.tenant_id);
        }
        self.broadcast_presence(&tenant_id);
        Ok(())
    }

    /// 移除连接，已注册的连接会触发在线列表广播
    pub fn remove(&self, id: &ConnectionId) {
        let removed = self.connections.remove(id);
        if let Some((_, conn)) = removed {
            conn.closed.cancel();
            if let Some(identity) = conn.identity {
                info!("🔴 连接断开 {:?} user={}", id, identity.user_id);
                self.broadcast_presence(&identity.tenant_id);
            }
        }
    }

    pub fn touch(&self, id: &ConnectionId) {
        if let Some(conn) = self.connections.get(id) {
            conn.last_heartbeat.store(now_millis(), Ordering::Relaxed);
        }
    }

    /// 租户在线用户，同一用户多连接只出现一次
    pub fn presence(&self, tenant_id: &str) -> Vec<PresenceIdentity> {
        let mut seen = HashSet::new();
        let mut users: Vec<PresenceIdentity> = self
            .connections
            .iter()
            .filter_map(|entry| entry.value().identity.clone())
            .filter(|identity| identity.tenant_id == tenant_id)
            .filter(|identity| seen.insert(identity.user_id.clone()))
            .collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        users
    }

    pub fn send_to_connection(&self, id: &ConnectionId, event: &ServerEvent) -> Result<(), SendError> {
        let bytes = event.encode()?;
        let conn = self.connections.get(id).ok_or(SendError::ConnectionNotFound)?;
        conn.sender.send(bytes).map_err(|_| SendError::ChannelClosed)
    }

    /// 推送给满足条件的连接，返回成功投递的连接数
    pub fn send_where<F>(&self, event: &ServerEvent, predicate: F) -> Result<usize, SendError>
    where
        F: Fn(&ConnectionInfo) -> bool,
    {
        let bytes = event.encode()?;
        // 先收集发送端，避免持有 DashMap 读锁期间发送
        let targets: Vec<mpsc::UnboundedSender<Bytes>> = self
            .connections
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().sender.clone())
            .collect();

        let mut delivered = 0;
        for sender in targets {
            if sender.send(bytes.clone()).is_ok() {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// 分发消息事件：公共消息发给整个租户，私聊只发给收发双方
    pub fn dispatch(&self, event: &MessageEvent) -> Result<(), SendError> {
        match event {
            MessageEvent::Created { tenant_id, message } => {
                let created = ServerEvent::MessageCreated(message.clone());
                let delivered = match message.recipient_id.as_deref() {
                    None => self.send_where(&created, |conn| conn.in_tenant(tenant_id))?,
                    Some(recipient_id) => {
                        let sender_id = message.sender.id.as_str();
                        let delivered = self.send_where(&created, |conn| {
                            conn.in_tenant(tenant_id)
                                && conn.identity.as_ref().is_some_and(|i| i.user_id == sender_id || i.user_id == recipient_id)
                        })?;
                        self.notify_recipient(tenant_id, recipient_id, message)?;
                        delivered
                    }
                };
                debug!("📨 消息 {} 推送到 {} 个连接", message.id, delivered);
                Ok(())
            }
        }
    }

    fn notify_recipient(&self, tenant_id: &str, recipient_id: &str, message: &MessageView) -> Result<usize, SendError> {
        let notification = ServerEvent::PrivateNotification(PrivateNotification {
            sender_identity: message.sender.clone(),
            text: message.text.clone(),
            message_type: message.message_type,
            recipient_id: recipient_id.to_string(),
        });
        self.send_where(&notification, |conn| {
            conn.in_tenant(tenant_id) && conn.identity.as_ref().is_some_and(|i| i.user_id == recipient_id)
        })
    }

    fn broadcast_presence(&self, tenant_id: &str) {
        let event = ServerEvent::PresenceUpdated { users: self.presence(tenant_id) };
        if let Err(e) = self.send_where(&event, |conn| conn.in_tenant(tenant_id)) {
            warn!("在线列表广播失败 tenant={}: {}", tenant_id, e);
        }
    }

    /// 清理心跳超时的连接，返回被清理的连接
    pub fn remove_stale(&self, now: i64, timeout_millis: i64) -> Vec<ConnectionId> {
        let stale: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|entry| now.saturating_sub(entry.value().last_heartbeat.load(Ordering::Relaxed)) > timeout_millis)
            .map(|entry| entry.key().clone())
            .collect();
        for id in &stale {
            warn!("⏱️ 心跳超时，关闭连接 {:?}", id);
            self.remove(id);
        }
        stale
    }
}
