//! 在线状态清扫器
//!
//! 周期性扫描连接注册表，把不活跃的 online 用户降级为 idle。
//! 这是唯一不经客户端动作而变更在线状态的组件。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::hub::EventHub;

/// 清扫器句柄
///
/// 由组合根持有；`shutdown` 取消定时器并等待任务退出，进程关闭时
/// 无需任何 I/O 排空。
pub struct PresenceSweeper {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PresenceSweeper {
    /// 启动后台清扫任务
    pub fn spawn(hub: Arc<EventHub>, interval: Duration, idle_after: chrono::Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // 第一次 tick 立即触发，此时没有可降级的记录，无害
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let demoted = hub.sweep_idle(idle_after).await;
                        if demoted > 0 {
                            info!(demoted, "presence sweep demoted inactive users to idle");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        break;
                    }
                }
            }

            info!("presence sweeper stopped");
        });

        Self { shutdown_tx, handle }
    }

    /// 取消定时器并等待任务退出
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}
