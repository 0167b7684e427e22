//! 事件中枢
//!
//! 所有客户端实时事件和服务端广播的唯一出入口。每个处理器遵循同一
//! 模式：校验载荷 → 鉴权 → 更新活动时间 → 计算接收者集合 → 投递。
//! 畸形事件只产生面向来源连接的 error 应答，从不中断中枢或连接。

use std::sync::Arc;

use tracing::{error, info, warn};

use domain::{
    ConnectionId, EventError, PresenceStatus, StatusStore, UserId, UserIdentity,
};

use crate::clock::Clock;
use crate::events::*;
use crate::registry::ConnectionRegistry;
use crate::rooms::RoomManager;
use crate::router::{ConnectionRouter, EventSender};

/// 事件中枢
///
/// 由组合根显式构造并持有，不使用进程级全局状态；测试可以并行
/// 创建互不影响的多个实例。
pub struct EventHub {
    registry: ConnectionRegistry,
    rooms: RoomManager,
    router: ConnectionRouter,
    status_store: Arc<dyn StatusStore>,
    clock: Arc<dyn Clock>,
}

impl EventHub {
    pub fn new(
        channels: Arc<dyn domain::ChannelDirectory>,
        status_store: Arc<dyn StatusStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            rooms: RoomManager::new(channels),
            router: ConnectionRouter::new(),
            status_store,
            clock,
        }
    }

    /// 准入连接
    ///
    /// 注册记录与出站通道并广播全量在线列表。同一用户重连时旧连接
    /// 被顶替：其房间成员资格被清除、出站通道被关闭，新连接依赖
    /// 客户端重新 join。
    pub async fn connect(&self, identity: UserIdentity, sender: EventSender) -> ConnectionId {
        let connection_id = ConnectionId::generate();
        let outcome = self
            .registry
            .admit(connection_id, identity.clone(), self.clock.now())
            .await;

        if let Some(old) = outcome.superseded {
            self.rooms.leave_all(old.connection_id).await;
            self.router.unregister(old.connection_id).await;
            info!(
                user_id = %identity.id,
                old_connection = %old.connection_id,
                "previous session superseded by reconnect"
            );
        }

        self.router.register(connection_id, sender).await;
        self.write_status_through(identity.id, PresenceStatus::Online);
        self.broadcast_active_users().await;

        info!(user_id = %identity.id, connection_id = %connection_id, "user connected");
        connection_id
    }

    /// 断开连接：立即且完整的清理
    ///
    /// 清除全部房间成员资格并向原房间成员发送隐式 leave 通知，
    /// 移除注册表记录，写穿 offline，广播新的在线列表。被顶替的
    /// 旧连接迟来的断开只做本地清理，不影响新会话。
    pub async fn disconnect(&self, connection_id: ConnectionId, user: &UserIdentity) {
        let left = self.rooms.leave_all(connection_id).await;
        self.router.unregister(connection_id).await;

        let now = self.clock.now();
        for channel_id in left {
            let members = self.rooms.members_of(channel_id).await;
            self.router
                .send_to_many(
                    &members,
                    ServerEvent::ChannelLeft(RoomNotice {
                        channel_id,
                        user: user.clone(),
                        timestamp: now,
                    }),
                )
                .await;
        }

        if self.registry.remove(user.id, connection_id).await.is_some() {
            self.write_status_through(user.id, PresenceStatus::Offline);
            self.broadcast_active_users().await;
            info!(user_id = %user.id, connection_id = %connection_id, "user disconnected");
        }
    }

    /// 分发入站事件
    ///
    /// 事件种类到处理器的分发表。任何非终止性错误都转换为仅发往
    /// 来源连接的 error 应答；持久化失败只记日志。
    pub async fn dispatch(&self, connection_id: ConnectionId, user: &UserIdentity, frame: Frame) {
        self.registry.touch(user.id, self.clock.now()).await;

        let result = match frame.kind.as_str() {
            "channel:join" => self.handle_channel_join(connection_id, user, &frame).await,
            "channel:leave" => self.handle_channel_leave(connection_id, user, &frame).await,
            "message:send" => self.handle_message_send(connection_id, user, &frame).await,
            "message:edit" => self.handle_message_edit(user, &frame).await,
            "message:delete" => self.handle_message_delete(user, &frame).await,
            "typing:start" => self.handle_typing(connection_id, user, &frame, true).await,
            "typing:stop" => self.handle_typing(connection_id, user, &frame, false).await,
            "status:update" => self.handle_status_update(user, &frame).await,
            other => Err(EventError::invalid_payload(format!(
                "Unknown event kind: {other}"
            ))),
        };

        if let Err(err) = result {
            match err {
                EventError::Durability { .. } => {
                    error!(event = %frame.kind, error = %err, "durable side effect failed");
                }
                err => {
                    self.router
                        .send_to(
                            connection_id,
                            ServerEvent::Error(ErrorNotice {
                                event: frame.kind,
                                message: err.to_string(),
                            }),
                        )
                        .await;
                }
            }
        }
    }

    async fn handle_channel_join(
        &self,
        connection_id: ConnectionId,
        user: &UserIdentity,
        frame: &Frame,
    ) -> Result<(), EventError> {
        let payload: ChannelPayload = frame.decode()?;
        self.rooms
            .join(connection_id, user.id, payload.channel_id)
            .await?;

        let members = self.rooms.members_of(payload.channel_id).await;
        self.router
            .send_to_many(
                &members,
                ServerEvent::ChannelJoined(RoomNotice {
                    channel_id: payload.channel_id,
                    user: user.clone(),
                    timestamp: self.clock.now(),
                }),
            )
            .await;

        info!(user_id = %user.id, channel_id = %payload.channel_id, "user joined channel");
        Ok(())
    }

    async fn handle_channel_leave(
        &self,
        connection_id: ConnectionId,
        user: &UserIdentity,
        frame: &Frame,
    ) -> Result<(), EventError> {
        let payload: ChannelPayload = frame.decode()?;

        // 幂等：不存在的成员资格直接返回，不产生广播
        if !self.rooms.leave(connection_id, payload.channel_id).await {
            return Ok(());
        }

        let members = self.rooms.members_of(payload.channel_id).await;
        self.router
            .send_to_many(
                &members,
                ServerEvent::ChannelLeft(RoomNotice {
                    channel_id: payload.channel_id,
                    user: user.clone(),
                    timestamp: self.clock.now(),
                }),
            )
            .await;

        info!(user_id = %user.id, channel_id = %payload.channel_id, "user left channel");
        Ok(())
    }

    async fn handle_message_send(
        &self,
        connection_id: ConnectionId,
        user: &UserIdentity,
        frame: &Frame,
    ) -> Result<(), EventError> {
        let payload: SendMessagePayload = frame.decode()?;
        if payload.content.is_empty() {
            return Err(EventError::invalid_payload("content must not be empty"));
        }

        // 必须先成功 join 才能发消息
        if !self.rooms.is_member(connection_id, payload.channel_id).await {
            return Err(EventError::authorization(
                "You must join the channel before sending messages",
            ));
        }

        // 房间级广播，回声也发给发送者
        let members = self.rooms.members_of(payload.channel_id).await;
        self.router
            .send_to_many(
                &members,
                ServerEvent::MessageNew(MessageBroadcast {
                    channel_id: payload.channel_id,
                    content: payload.content,
                    attachment: payload.attachment,
                    user: user.clone(),
                    timestamp: self.clock.now(),
                }),
            )
            .await;

        Ok(())
    }

    async fn handle_message_edit(
        &self,
        user: &UserIdentity,
        frame: &Frame,
    ) -> Result<(), EventError> {
        let payload: EditMessagePayload = frame.decode()?;

        // 归属权已由先行的持久化写入保证，这里不再复查
        let members = self.rooms.members_of(payload.channel_id).await;
        self.router
            .send_to_many(
                &members,
                ServerEvent::MessageUpdated(MessageRevision {
                    id: payload.id,
                    channel_id: payload.channel_id,
                    content: payload.content,
                    user: user.clone(),
                    timestamp: self.clock.now(),
                }),
            )
            .await;

        Ok(())
    }

    async fn handle_message_delete(
        &self,
        user: &UserIdentity,
        frame: &Frame,
    ) -> Result<(), EventError> {
        let payload: DeleteMessagePayload = frame.decode()?;

        let members = self.rooms.members_of(payload.channel_id).await;
        self.router
            .send_to_many(
                &members,
                ServerEvent::MessageDeleted(MessageTombstone {
                    id: payload.id,
                    channel_id: payload.channel_id,
                    user: user.clone(),
                    timestamp: self.clock.now(),
                }),
            )
            .await;

        Ok(())
    }

    async fn handle_typing(
        &self,
        connection_id: ConnectionId,
        user: &UserIdentity,
        frame: &Frame,
        is_typing: bool,
    ) -> Result<(), EventError> {
        let payload: ChannelPayload = frame.decode()?;

        // 无状态转发，过期由消费方处理；发送者自己不需要回声
        let members: Vec<_> = self
            .rooms
            .members_of(payload.channel_id)
            .await
            .into_iter()
            .filter(|id| *id != connection_id)
            .collect();

        self.router
            .send_to_many(
                &members,
                ServerEvent::UserTyping(TypingNotice {
                    channel_id: payload.channel_id,
                    user: user.clone(),
                    is_typing,
                    timestamp: self.clock.now(),
                }),
            )
            .await;

        Ok(())
    }

    async fn handle_status_update(
        &self,
        user: &UserIdentity,
        frame: &Frame,
    ) -> Result<(), EventError> {
        let raw: String = frame
            .decode()
            .map_err(|_| EventError::invalid_payload("Invalid status value"))?;
        let status: PresenceStatus = raw.parse()?;

        self.apply_status(user.id, status, false).await;
        Ok(())
    }

    /// 状态变更的统一路径：内存更新 → 异步写穿 → 全局广播
    ///
    /// status:update 处理器与清扫器都走这里，automatic 标记区分来源。
    async fn apply_status(&self, user_id: UserId, status: PresenceStatus, automatic: bool) {
        if self.registry.set_status(user_id, status).await.is_none() {
            return;
        }

        self.write_status_through(user_id, status);
        self.router
            .broadcast(ServerEvent::UserStatus(StatusNotice {
                user_id,
                status,
                timestamp: self.clock.now(),
                automatic,
            }))
            .await;
    }

    /// 清扫一轮：把不活跃超过阈值的 online 用户降级为 idle
    ///
    /// 检查和降级在注册表锁下原子完成，dnd / idle / offline 不受影响。
    pub async fn sweep_idle(&self, idle_after: chrono::Duration) -> usize {
        let now = self.clock.now();
        let mut demoted = 0usize;

        for record in self.registry.snapshot().await {
            let user_id = record.user_id();
            if self
                .registry
                .demote_stale_online(user_id, idle_after, now)
                .await
            {
                self.write_status_through(user_id, PresenceStatus::Idle);
                self.router
                    .broadcast(ServerEvent::UserStatus(StatusNotice {
                        user_id,
                        status: PresenceStatus::Idle,
                        timestamp: now,
                        automatic: true,
                    }))
                    .await;
                demoted += 1;
            }
        }

        demoted
    }

    /// fire-and-forget 写穿：失败只记日志，绝不阻塞内存路径
    fn write_status_through(&self, user_id: UserId, status: PresenceStatus) {
        let store = Arc::clone(&self.status_store);
        tokio::spawn(async move {
            if let Err(err) = store.set_user_status(user_id, status).await {
                warn!(user_id = %user_id, status = %status, error = %err, "status write-through failed");
            }
        });
    }

    async fn broadcast_active_users(&self) {
        let users: Vec<ActiveUser> = self
            .registry
            .snapshot()
            .await
            .into_iter()
            .map(|record| ActiveUser {
                user_id: record.identity.id,
                username: record.identity.username,
                avatar: record.identity.avatar,
                status: record.status,
                last_activity_at: record.last_activity_at,
            })
            .collect();

        self.router.broadcast(ServerEvent::ActiveUsers(users)).await;
    }
}
