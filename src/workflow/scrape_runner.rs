//! 抓取执行器接口
//!
//! 任务管理器只通过这个接口运行抓取，拿到的只有配置快照，看不到任务本身

use anyhow::Result;

use crate::models::ScrapeConfig;

/// 一次抓取的结果统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub reviews_count: Option<u64>,
    pub images_count: Option<u64>,
}

/// 抓取执行器
///
/// `run` 是同步阻塞调用，可能耗时很久，也可能一直不返回；
/// 超时和错误处理由调用方负责，实现方无需关心。
pub trait ScrapeRunner: Send + Sync {
    fn run(&self, config: &ScrapeConfig) -> Result<RunOutcome>;
}

impl<F> ScrapeRunner for F
where
    F: Fn(&ScrapeConfig) -> Result<RunOutcome> + Send + Sync,
{
    fn run(&self, config: &ScrapeConfig) -> Result<RunOutcome> {
        self(config)
    }
}
