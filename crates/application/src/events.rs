//! 实时事件线协议
//!
//! 入站帧统一为 `{kind, payload}`，先解析信封再按事件种类解析载荷，
//! 这样畸形载荷只产生面向来源连接的 error 应答。出站事件序列化为
//! 相同的 `{kind, payload}` 形状。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use domain::{
    ChannelId, EventError, MessageId, PresenceStatus, Timestamp, UserId, UserIdentity,
};

/// 入站事件信封
#[derive(Debug, Clone, Deserialize)]
pub struct Frame {
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl Frame {
    /// 解析文本帧
    pub fn parse(text: &str) -> Result<Self, EventError> {
        serde_json::from_str(text)
            .map_err(|err| EventError::invalid_payload(format!("Malformed event frame: {err}")))
    }

    /// 把载荷解析为具体事件的类型
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, EventError> {
        serde_json::from_value(self.payload.clone()).map_err(|err| {
            EventError::invalid_payload(format!("Invalid {} payload: {err}", self.kind))
        })
    }
}

/// channel:join / channel:leave / typing:* 的载荷
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelPayload {
    pub channel_id: ChannelId,
}

/// message:send 的载荷
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub channel_id: ChannelId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Value>,
}

/// message:edit 的载荷
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMessagePayload {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub content: String,
}

/// message:delete 的载荷
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessagePayload {
    pub id: MessageId,
    pub channel_id: ChannelId,
}

/// 出站事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum ServerEvent {
    /// 全量在线用户列表，准入和移除时广播给所有连接
    #[serde(rename = "users:active")]
    ActiveUsers(Vec<ActiveUser>),

    #[serde(rename = "channel:join")]
    ChannelJoined(RoomNotice),

    #[serde(rename = "channel:leave")]
    ChannelLeft(RoomNotice),

    #[serde(rename = "message:new")]
    MessageNew(MessageBroadcast),

    #[serde(rename = "message:update")]
    MessageUpdated(MessageRevision),

    #[serde(rename = "message:delete")]
    MessageDeleted(MessageTombstone),

    #[serde(rename = "user:typing")]
    UserTyping(TypingNotice),

    #[serde(rename = "user:status")]
    UserStatus(StatusNotice),

    /// 仅发往来源连接的错误应答
    #[serde(rename = "error")]
    Error(ErrorNotice),
}

/// users:active 列表项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveUser {
    pub user_id: UserId,
    pub username: String,
    pub avatar: Option<String>,
    pub status: PresenceStatus,
    pub last_activity_at: Timestamp,
}

/// 房间进出通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomNotice {
    pub channel_id: ChannelId,
    pub user: UserIdentity,
    pub timestamp: Timestamp,
}

/// 新消息广播（发送者身份快照 + 服务端时间戳）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBroadcast {
    pub channel_id: ChannelId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Value>,
    pub user: UserIdentity,
    pub timestamp: Timestamp,
}

/// 消息编辑广播
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRevision {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub content: String,
    pub user: UserIdentity,
    pub timestamp: Timestamp,
}

/// 消息删除广播
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageTombstone {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub user: UserIdentity,
    pub timestamp: Timestamp,
}

/// 输入中通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    pub channel_id: ChannelId,
    pub user: UserIdentity,
    pub is_typing: bool,
    pub timestamp: Timestamp,
}

/// 状态变更通知；automatic 仅在清扫器降级时出现
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusNotice {
    pub user_id: UserId,
    pub status: PresenceStatus,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "is_false")]
    pub automatic: bool,
}

/// 错误应答
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub event: String,
    pub message: String,
}

fn is_false(value: &bool) -> bool {
    !*value
}
