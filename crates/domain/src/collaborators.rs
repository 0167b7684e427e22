//! 外部协作方接口
//!
//! 实时核心只消费这些接口：凭证校验、用户/频道目录查询、
//! 状态写穿。具体实现位于 infrastructure。

use async_trait::async_trait;

use crate::connection::{ChannelAccessFact, UserIdentity};
use crate::errors::EventError;
use crate::presence::PresenceStatus;
use crate::value_objects::{ChannelId, UserId};

/// 凭证校验器：把承载凭证解析为用户身份
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<UserId, EventError>;
}

/// 用户目录：按 ID 查询身份快照
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_by_id(&self, user_id: UserId) -> Result<Option<UserIdentity>, EventError>;
}

/// 频道目录：按 ID 查询访问事实
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn channel_access(
        &self,
        channel_id: ChannelId,
    ) -> Result<Option<ChannelAccessFact>, EventError>;
}

/// 状态存储：异步写穿用户状态（fire-and-forget，失败只记日志）
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn set_user_status(
        &self,
        user_id: UserId,
        status: PresenceStatus,
    ) -> Result<(), EventError>;
}
