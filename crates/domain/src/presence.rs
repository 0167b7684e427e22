//! 在线状态枚举
//!
//! 连接注册表跟踪的用户实时状态，与持久化的"最后已知状态"相区分。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::EventError;

/// 用户在线状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Idle,
    Dnd,
    Offline,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Idle => "idle",
            PresenceStatus::Dnd => "dnd",
            PresenceStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresenceStatus {
    type Err = EventError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "online" => Ok(PresenceStatus::Online),
            "idle" => Ok(PresenceStatus::Idle),
            "dnd" => Ok(PresenceStatus::Dnd),
            "offline" => Ok(PresenceStatus::Offline),
            _ => Err(EventError::InvalidPayload {
                message: "Invalid status value".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_known_statuses() {
        assert_eq!("online".parse::<PresenceStatus>().unwrap(), PresenceStatus::Online);
        assert_eq!("idle".parse::<PresenceStatus>().unwrap(), PresenceStatus::Idle);
        assert_eq!("dnd".parse::<PresenceStatus>().unwrap(), PresenceStatus::Dnd);
        assert_eq!("offline".parse::<PresenceStatus>().unwrap(), PresenceStatus::Offline);
    }

    #[test]
    fn rejects_unknown_status() {
        let err = "banana".parse::<PresenceStatus>().unwrap_err();
        assert!(matches!(err, EventError::InvalidPayload { .. }));
        assert_eq!(err.to_string(), "Invalid status value");
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&PresenceStatus::Dnd).unwrap();
        assert_eq!(json, "\"dnd\"");
    }
}
