use crate::manager::socket_manager::SocketManager;
use common::util::date_util::now_millis;
use std::sync::Arc;
use tokio::time::{Duration, interval};

/// 定期清理心跳超时的连接
pub async fn start_heartbeat_cleaner(manager: Arc<SocketManager>, timeout_secs: u64) {
    let timeout_millis = i64::try_from(timeout_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
    let mut ticker = interval(Duration::from_secs(10));

    loop {
        ticker.tick().await;
        let removed = manager.remove_stale(now_millis(), timeout_millis);
        if !removed.is_empty() {
            log::info!("🧹 清理超时连接 {} 个，剩余 {}", removed.len(), manager.len());
        }
    }
}
