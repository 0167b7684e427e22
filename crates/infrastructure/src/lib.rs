//! 基础设施层
//!
//! 领域协作方接口的具体实现：JWT 凭证校验、PostgreSQL 目录查询
//! 与状态写穿。

pub mod auth;
pub mod db;

pub use auth::{JwtClaims, JwtCredentialVerifier};
pub use db::{create_pg_pool, PgChannelDirectory, PgStatusStore, PgUserDirectory};
