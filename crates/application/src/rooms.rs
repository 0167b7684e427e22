//! 房间管理器
//!
//! 维护频道到订阅连接集合的映射。订阅授权在每次 join 时重新查询
//! 频道访问事实，不做缓存：频道的私有标志可能在两次 join 之间被
//! 外部修改，用每次一跳查询换正确性。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use domain::{ChannelDirectory, ChannelId, ConnectionId, EventError, UserId};

#[derive(Default)]
struct RoomState {
    /// 频道 -> 订阅连接
    members: HashMap<ChannelId, HashSet<ConnectionId>>,
    /// 连接 -> 已加入频道
    joined: HashMap<ConnectionId, HashSet<ChannelId>>,
}

/// 房间管理器
pub struct RoomManager {
    channels: Arc<dyn ChannelDirectory>,
    state: RwLock<RoomState>,
}

impl RoomManager {
    pub fn new(channels: Arc<dyn ChannelDirectory>) -> Self {
        Self {
            channels,
            state: RwLock::new(RoomState::default()),
        }
    }

    /// 订阅频道
    ///
    /// 失败时不产生任何成员变更：频道不存在返回 NotFound，
    /// 私有频道非创建者返回 Authorization。
    pub async fn join(
        &self,
        connection_id: ConnectionId,
        user_id: UserId,
        channel_id: ChannelId,
    ) -> Result<(), EventError> {
        let fact = self
            .channels
            .channel_access(channel_id)
            .await?
            .ok_or_else(|| EventError::not_found("Channel"))?;

        if !fact.allows(user_id) {
            return Err(EventError::authorization(
                "Not authorized to access this channel",
            ));
        }

        let mut state = self.state.write().await;
        state.members.entry(channel_id).or_default().insert(connection_id);
        state.joined.entry(connection_id).or_default().insert(channel_id);

        debug!(connection_id = %connection_id, channel_id = %channel_id, "connection joined room");
        Ok(())
    }

    /// 退订频道；幂等，返回是否确实存在该成员资格
    pub async fn leave(&self, connection_id: ConnectionId, channel_id: ChannelId) -> bool {
        let mut state = self.state.write().await;
        let removed = match state.members.get_mut(&channel_id) {
            Some(members) => {
                let removed = members.remove(&connection_id);
                if members.is_empty() {
                    state.members.remove(&channel_id);
                }
                removed
            }
            None => false,
        };

        if let Some(joined) = state.joined.get_mut(&connection_id) {
            joined.remove(&channel_id);
            if joined.is_empty() {
                state.joined.remove(&connection_id);
            }
        }

        removed
    }

    /// 清除连接的全部成员资格（断开时调用），返回涉及的频道
    pub async fn leave_all(&self, connection_id: ConnectionId) -> Vec<ChannelId> {
        let mut state = self.state.write().await;
        let channels: Vec<ChannelId> = state
            .joined
            .remove(&connection_id)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();

        for channel_id in &channels {
            if let Some(members) = state.members.get_mut(channel_id) {
                members.remove(&connection_id);
                if members.is_empty() {
                    state.members.remove(channel_id);
                }
            }
        }

        channels
    }

    /// 扇出用的成员集合，反映调用时点的最新状态
    pub async fn members_of(&self, channel_id: ChannelId) -> Vec<ConnectionId> {
        let state = self.state.read().await;
        state
            .members
            .get(&channel_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn is_member(&self, connection_id: ConnectionId, channel_id: ChannelId) -> bool {
        let state = self.state.read().await;
        state
            .joined
            .get(&connection_id)
            .is_some_and(|joined| joined.contains(&channel_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{ChannelAccessFact, MockChannelDirectory};
    use mockall::predicate::eq;
    use uuid::Uuid;

    fn directory_with(fact: ChannelAccessFact) -> Arc<MockChannelDirectory> {
        let mut channels = MockChannelDirectory::new();
        channels
            .expect_channel_access()
            .with(eq(fact.channel_id))
            .returning(move |_| Ok(Some(fact)));
        Arc::new(channels)
    }

    fn public_channel() -> ChannelAccessFact {
        ChannelAccessFact {
            channel_id: ChannelId::new(Uuid::new_v4()),
            is_private: false,
            creator_id: UserId::new(Uuid::new_v4()),
        }
    }

    #[tokio::test]
    async fn join_registers_membership() {
        let fact = public_channel();
        let rooms = RoomManager::new(directory_with(fact));
        let connection = ConnectionId::generate();

        rooms
            .join(connection, UserId::new(Uuid::new_v4()), fact.channel_id)
            .await
            .expect("join public channel");

        assert!(rooms.is_member(connection, fact.channel_id).await);
        assert_eq!(rooms.members_of(fact.channel_id).await, vec![connection]);
    }

    #[tokio::test]
    async fn join_unknown_channel_fails_not_found() {
        let mut channels = MockChannelDirectory::new();
        channels.expect_channel_access().returning(|_| Ok(None));
        let rooms = RoomManager::new(Arc::new(channels));
        let connection = ConnectionId::generate();
        let channel_id = ChannelId::new(Uuid::new_v4());

        let err = rooms
            .join(connection, UserId::new(Uuid::new_v4()), channel_id)
            .await
            .unwrap_err();

        assert_eq!(err, EventError::not_found("Channel"));
        assert!(rooms.members_of(channel_id).await.is_empty());
    }

    #[tokio::test]
    async fn private_channel_rejects_non_creator_without_membership_change() {
        let creator = UserId::new(Uuid::new_v4());
        let fact = ChannelAccessFact {
            channel_id: ChannelId::new(Uuid::new_v4()),
            is_private: true,
            creator_id: creator,
        };
        let rooms = RoomManager::new(directory_with(fact));
        let connection = ConnectionId::generate();

        let err = rooms
            .join(connection, UserId::new(Uuid::new_v4()), fact.channel_id)
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::Authorization { .. }));
        assert!(rooms.members_of(fact.channel_id).await.is_empty());

        // 创建者可以进入自己的私有频道
        rooms
            .join(connection, creator, fact.channel_id)
            .await
            .expect("creator joins own private channel");
    }

    #[tokio::test]
    async fn authorization_is_rechecked_on_every_join() {
        let channel_id = ChannelId::new(Uuid::new_v4());
        let creator = UserId::new(Uuid::new_v4());
        let mut channels = MockChannelDirectory::new();
        let mut private = false;
        channels.expect_channel_access().returning(move |_| {
            // 第二次查询时频道已被改为私有
            let fact = ChannelAccessFact {
                channel_id,
                is_private: private,
                creator_id: creator,
            };
            private = true;
            Ok(Some(fact))
        });

        let rooms = RoomManager::new(Arc::new(channels));
        let outsider = UserId::new(Uuid::new_v4());
        let first = ConnectionId::generate();
        let second = ConnectionId::generate();

        rooms.join(first, outsider, channel_id).await.expect("public join");
        rooms.leave(first, channel_id).await;

        let err = rooms.join(second, outsider, channel_id).await.unwrap_err();
        assert!(matches!(err, EventError::Authorization { .. }));
    }

    #[tokio::test]
    async fn leave_is_idempotent() {
        let fact = public_channel();
        let rooms = RoomManager::new(directory_with(fact));
        let connection = ConnectionId::generate();

        assert!(!rooms.leave(connection, fact.channel_id).await);

        rooms
            .join(connection, UserId::new(Uuid::new_v4()), fact.channel_id)
            .await
            .unwrap();
        assert!(rooms.leave(connection, fact.channel_id).await);
        assert!(!rooms.leave(connection, fact.channel_id).await);
    }

    #[tokio::test]
    async fn leave_all_clears_every_membership() {
        let first = public_channel();
        let second = public_channel();
        let mut channels = MockChannelDirectory::new();
        channels.expect_channel_access().returning(move |id| {
            Ok(Some(if id == first.channel_id { first } else { second }))
        });

        let rooms = RoomManager::new(Arc::new(channels));
        let connection = ConnectionId::generate();
        let user = UserId::new(Uuid::new_v4());

        rooms.join(connection, user, first.channel_id).await.unwrap();
        rooms.join(connection, user, second.channel_id).await.unwrap();

        let mut left = rooms.leave_all(connection).await;
        left.sort_by_key(|id| id.0);
        let mut expected = vec![first.channel_id, second.channel_id];
        expected.sort_by_key(|id| id.0);
        assert_eq!(left, expected);

        assert!(rooms.members_of(first.channel_id).await.is_empty());
        assert!(rooms.members_of(second.channel_id).await.is_empty());
        assert!(rooms.leave_all(connection).await.is_empty());
    }
}
