//! 连接路由器
//!
//! 连接到出站通道发送端的映射，事件中枢据此做单播、多播和全局广播。
//! 发送端失效（接收任务已退出）时跳过并记日志，不回传错误。

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use domain::ConnectionId;

use crate::events::ServerEvent;

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// 连接路由器
pub struct ConnectionRouter {
    senders: RwLock<HashMap<ConnectionId, EventSender>>,
}

impl Default for ConnectionRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRouter {
    pub fn new() -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, connection_id: ConnectionId, sender: EventSender) {
        let mut senders = self.senders.write().await;
        senders.insert(connection_id, sender);
        debug!(connection_id = %connection_id, "sender registered");
    }

    pub async fn unregister(&self, connection_id: ConnectionId) {
        let mut senders = self.senders.write().await;
        senders.remove(&connection_id);
        debug!(connection_id = %connection_id, "sender unregistered");
    }

    /// 单播；连接未注册或已断开时静默丢弃
    pub async fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) {
        let senders = self.senders.read().await;
        if let Some(sender) = senders.get(&connection_id) {
            if sender.send(event).is_err() {
                warn!(connection_id = %connection_id, "failed to deliver event, receiver gone");
            }
        }
    }

    /// 多播到给定连接集合
    pub async fn send_to_many(&self, connection_ids: &[ConnectionId], event: ServerEvent) {
        let senders = self.senders.read().await;
        let mut failed = 0usize;

        for connection_id in connection_ids {
            if let Some(sender) = senders.get(connection_id) {
                if sender.send(event.clone()).is_err() {
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            warn!(failed, "fan-out skipped connections with closed receivers");
        }
    }

    /// 广播到所有注册连接
    pub async fn broadcast(&self, event: ServerEvent) {
        let senders = self.senders.read().await;
        let mut failed = 0usize;

        for (connection_id, sender) in senders.iter() {
            if sender.send(event.clone()).is_err() {
                failed += 1;
                debug!(connection_id = %connection_id, "broadcast skipped closed receiver");
            }
        }

        if failed > 0 {
            warn!(failed, "broadcast skipped connections with closed receivers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ErrorNotice;

    fn error_event(message: &str) -> ServerEvent {
        ServerEvent::Error(ErrorNotice {
            event: "test".to_string(),
            message: message.to_string(),
        })
    }

    #[tokio::test]
    async fn send_to_reaches_only_the_target() {
        let router = ConnectionRouter::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        router.register(a, tx_a).await;
        router.register(b, tx_b).await;

        router.send_to(a, error_event("only a")).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_reaches_everyone_and_survives_closed_receivers() {
        let router = ConnectionRouter::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        router.register(a, tx_a).await;
        router.register(b, tx_b).await;
        drop(rx_b);

        router.broadcast(error_event("all")).await;

        assert!(rx_a.try_recv().is_ok());
    }

    #[tokio::test]
    async fn unregister_stops_delivery() {
        let router = ConnectionRouter::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = ConnectionId::generate();
        router.register(id, tx).await;
        router.unregister(id).await;

        router.send_to(id, error_event("gone")).await;
        assert!(rx.try_recv().is_err());
    }
}
