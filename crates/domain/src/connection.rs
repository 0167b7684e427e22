//! 连接记录
//!
//! 连接注册表中每个在线用户对应的唯一记录，身份快照在准入时采集，
//! 之后不再按事件重新拉取。

use serde::{Deserialize, Serialize};

use crate::presence::PresenceStatus;
use crate::value_objects::{ConnectionId, Timestamp, UserId};

/// 用户身份快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub username: String,
    pub avatar: Option<String>,
}

/// 单个在线连接的记录
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionRecord {
    /// 传输层连接标识
    pub connection_id: ConnectionId,
    /// 准入时采集的身份快照
    pub identity: UserIdentity,
    /// 实时状态
    pub status: PresenceStatus,
    /// 最近一次归属于此连接的入站事件时间
    pub last_activity_at: Timestamp,
}

impl ConnectionRecord {
    pub fn new(connection_id: ConnectionId, identity: UserIdentity, now: Timestamp) -> Self {
        Self {
            connection_id,
            identity,
            status: PresenceStatus::Online,
            last_activity_at: now,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.identity.id
    }

    /// 记录活动
    pub fn touch(&mut self, now: Timestamp) {
        self.last_activity_at = now;
    }

    /// 不活跃时长是否超过阈值
    pub fn inactive_longer_than(&self, now: Timestamp, threshold: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_activity_at) > threshold
    }
}

/// 频道访问事实（每次 join 时从持久化存储读取，不缓存）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccessFact {
    pub channel_id: crate::value_objects::ChannelId,
    pub is_private: bool,
    pub creator_id: UserId,
}

impl ChannelAccessFact {
    /// 用户是否允许订阅该频道
    pub fn allows(&self, user_id: UserId) -> bool {
        !self.is_private || self.creator_id == user_id
    }
}
