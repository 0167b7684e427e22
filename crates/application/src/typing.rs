//! 输入状态跟踪
//!
//! user:typing 信号的消费方状态：某频道里谁正在输入，以及各自的
//! 过期时间。信号是建议性的，固定 3 秒窗口内没有刷新或显式停止
//! 就自动过期。中枢本身只转发，不持有该状态。

use std::collections::HashMap;

use domain::{ChannelId, Timestamp, UserId};

/// 无刷新时输入信号的存活窗口
pub const TYPING_EXPIRY_SECS: i64 = 3;

/// 每频道的输入状态表
#[derive(Debug, Default)]
pub struct TypingTracker {
    expiries: HashMap<ChannelId, HashMap<UserId, Timestamp>>,
}

impl TypingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 处理一条 user:typing 通知
    pub fn observe(&mut self, channel_id: ChannelId, user_id: UserId, is_typing: bool, now: Timestamp) {
        if is_typing {
            self.expiries
                .entry(channel_id)
                .or_default()
                .insert(user_id, now + chrono::Duration::seconds(TYPING_EXPIRY_SECS));
        } else if let Some(channel) = self.expiries.get_mut(&channel_id) {
            channel.remove(&user_id);
            if channel.is_empty() {
                self.expiries.remove(&channel_id);
            }
        }
    }

    /// 当前仍在输入的用户；顺带清理已过期的条目
    pub fn typists(&mut self, channel_id: ChannelId, now: Timestamp) -> Vec<UserId> {
        let Some(channel) = self.expiries.get_mut(&channel_id) else {
            return Vec::new();
        };

        channel.retain(|_, expires_at| *expires_at > now);
        let typists = channel.keys().copied().collect();
        if channel.is_empty() {
            self.expiries.remove(&channel_id);
        }
        typists
    }
}
