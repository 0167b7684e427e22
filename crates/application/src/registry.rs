//! 连接注册表
//!
//! 内存中权威的在线连接表，每个用户至多一条记录。重连在准入时
//! 原子地顶替旧记录，被顶替连接的房间成员资格不随之迁移。

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use domain::{ConnectionId, ConnectionRecord, PresenceStatus, Timestamp, UserId, UserIdentity};

/// 准入结果
#[derive(Debug, Clone)]
pub struct AdmitOutcome {
    /// 新建的连接记录
    pub record: ConnectionRecord,
    /// 被顶替的旧记录（同一用户重连时出现）
    pub superseded: Option<ConnectionRecord>,
}

/// 在线连接注册表
///
/// 单把写锁串行化全部变更，表很小且操作都是 O(1)，
/// 足以避免同一用户 touch 与 setStatus 之间的丢失更新。
pub struct ConnectionRegistry {
    records: RwLock<HashMap<UserId, ConnectionRecord>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// 准入连接：插入或顶替该用户的记录，状态置为 online
    pub async fn admit(
        &self,
        connection_id: ConnectionId,
        identity: UserIdentity,
        now: Timestamp,
    ) -> AdmitOutcome {
        let record = ConnectionRecord::new(connection_id, identity, now);
        let mut records = self.records.write().await;
        let superseded = records.insert(record.user_id(), record.clone());

        if let Some(old) = &superseded {
            debug!(
                user_id = %record.user_id(),
                old_connection = %old.connection_id,
                new_connection = %connection_id,
                "connection superseded by reconnect"
            );
        }

        AdmitOutcome { record, superseded }
    }

    /// 记录活动时间；用户不在线则为 no-op
    pub async fn touch(&self, user_id: UserId, now: Timestamp) {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&user_id) {
            record.touch(now);
        }
    }

    /// 更新状态，返回之前的状态；用户不在线返回 None
    pub async fn set_status(
        &self,
        user_id: UserId,
        status: PresenceStatus,
    ) -> Option<PresenceStatus> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&user_id)?;
        let previous = record.status;
        record.status = status;
        Some(previous)
    }

    /// 移除记录
    ///
    /// 只有当表中的记录仍属于给定连接时才移除并返回它；被顶替的
    /// 旧连接迟来的断开不会误删新会话。
    pub async fn remove(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> Option<ConnectionRecord> {
        let mut records = self.records.write().await;
        let owned_by_caller = records
            .get(&user_id)
            .is_some_and(|record| record.connection_id == connection_id);

        if owned_by_caller {
            records.remove(&user_id)
        } else {
            None
        }
    }

    /// 清扫器专用：仅当记录仍为 online 且不活跃超过阈值时降级为 idle
    ///
    /// 检查和写入在同一把锁下完成，快照与降级之间用户手动切换的
    /// 状态（如 dnd）不会被覆盖。
    pub async fn demote_stale_online(
        &self,
        user_id: UserId,
        idle_after: chrono::Duration,
        now: Timestamp,
    ) -> bool {
        let mut records = self.records.write().await;
        match records.get_mut(&user_id) {
            Some(record)
                if record.status == PresenceStatus::Online
                    && record.inactive_longer_than(now, idle_after) =>
            {
                record.status = PresenceStatus::Idle;
                true
            }
            _ => false,
        }
    }

    pub async fn get(&self, user_id: UserId) -> Option<ConnectionRecord> {
        let records = self.records.read().await;
        records.get(&user_id).cloned()
    }

    /// 广播用的时点快照，顺序不保证
    pub async fn snapshot(&self) -> Vec<ConnectionRecord> {
        let records = self.records.read().await;
        records.values().cloned().collect()
    }
}
