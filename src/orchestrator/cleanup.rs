//! 定期清理已结束的任务

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::orchestrator::JobManager;

/// 启动后台清理任务
///
/// 第一次清理在一个间隔之后执行，之后每个间隔执行一次
pub fn spawn_cleanup_task(
    manager: JobManager,
    every: Duration,
    retention: chrono::Duration,
) -> JoinHandle<()> {
    let every = every.max(Duration::from_secs(1));

    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 第一次 tick 立即返回
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = manager.cleanup(retention);
            debug!("定期清理完成，删除 {} 个任务", removed);
        }
    })
}
