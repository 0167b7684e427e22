//! PostgreSQL 协作方实现
//!
//! 实时核心消费的三个目录/存储接口的数据库实现。查询都是按主键的
//! 单行读写，错误统一映射为持久化失败（只记日志，不进入广播路径）。

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use domain::{
    ChannelAccessFact, ChannelDirectory, ChannelId, EventError, PresenceStatus, StatusStore,
    UserDirectory, UserId, UserIdentity,
};

pub async fn create_pg_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

fn map_sqlx_err(err: sqlx::Error) -> EventError {
    EventError::durability(err.to_string())
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    avatar: Option<String>,
}

impl From<UserRow> for UserIdentity {
    fn from(row: UserRow) -> Self {
        UserIdentity {
            id: UserId::from(row.id),
            username: row.username,
            avatar: row.avatar,
        }
    }
}

/// 用户目录
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn user_by_id(&self, user_id: UserId) -> Result<Option<UserIdentity>, EventError> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, username, avatar FROM users WHERE id = $1")
                .bind(Uuid::from(user_id))
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_err)?;

        Ok(row.map(UserIdentity::from))
    }
}

#[derive(Debug, FromRow)]
struct ChannelRow {
    id: Uuid,
    is_private: bool,
    creator_id: Uuid,
}

/// 频道目录
pub struct PgChannelDirectory {
    pool: PgPool,
}

impl PgChannelDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelDirectory for PgChannelDirectory {
    async fn channel_access(
        &self,
        channel_id: ChannelId,
    ) -> Result<Option<ChannelAccessFact>, EventError> {
        let row: Option<ChannelRow> =
            sqlx::query_as("SELECT id, is_private, creator_id FROM channels WHERE id = $1")
                .bind(Uuid::from(channel_id))
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_err)?;

        Ok(row.map(|row| ChannelAccessFact {
            channel_id: ChannelId::from(row.id),
            is_private: row.is_private,
            creator_id: UserId::from(row.creator_id),
        }))
    }
}

/// 状态存储：把实时状态写穿到 users 表
pub struct PgStatusStore {
    pool: PgPool,
}

impl PgStatusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatusStore for PgStatusStore {
    async fn set_user_status(
        &self,
        user_id: UserId,
        status: PresenceStatus,
    ) -> Result<(), EventError> {
        sqlx::query("UPDATE users SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(Uuid::from(user_id))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        debug!(user_id = %user_id, status = %status, "user status persisted");
        Ok(())
    }
}
