//! 实时子系统错误定义
//!
//! 按恢复语义分类：认证失败是终止性的（拒绝连接），其余错误只产生
//! 面向来源连接的 error 事件，绝不影响其他连接。

use thiserror::Error;

/// 实时事件处理错误类型
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventError {
    /// 凭证缺失或无效，连接被拒绝
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// 权限不足（如私有频道非创建者）
    #[error("{message}")]
    Authorization { message: String },

    /// 资源不存在
    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    /// 载荷缺字段或取值非法
    #[error("{message}")]
    InvalidPayload { message: String },

    /// 持久化写入失败，只记录日志，从不回传给客户端
    #[error("durable write failed: {message}")]
    Durability { message: String },
}

impl EventError {
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    pub fn durability(message: impl Into<String>) -> Self {
        Self::Durability {
            message: message.into(),
        }
    }

    /// 是否为终止性错误（连接级拒绝而非事件级应答）
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_the_resource() {
        assert_eq!(EventError::not_found("Channel").to_string(), "Channel not found");
    }

    #[test]
    fn only_authentication_is_terminal() {
        assert!(EventError::authentication("bad token").is_terminal());
        assert!(!EventError::authorization("private").is_terminal());
        assert!(!EventError::invalid_payload("missing field").is_terminal());
        assert!(!EventError::durability("io").is_terminal());
    }
}
