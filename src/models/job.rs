use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::scrape_config::ScrapeConfig;

/// 任务状态
///
/// COMPLETED / FAILED / CANCELLED 为终态，进入后不再变化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 任务进度快照（只保留最新一次）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobProgress {
    pub stage: String,
    pub message: String,
}

impl JobProgress {
    pub fn new(stage: &str, message: impl Into<String>) -> Self {
        Self {
            stage: stage.to_string(),
            message: message.into(),
        }
    }
}

/// 抓取任务
///
/// 只由任务管理器在持锁期间修改；对外提供的都是克隆出来的快照
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    pub url: String,
    /// 创建时合并好的配置快照，不参与序列化
    #[serde(skip)]
    pub config: Arc<ScrapeConfig>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub reviews_count: Option<u64>,
    pub images_count: Option<u64>,
    pub progress: JobProgress,
    /// 外部抓取调用是否仍在执行（超时或取消后可能仍为 true）
    pub runner_active: bool,
}

impl Job {
    pub fn new(job_id: String, url: String, config: ScrapeConfig) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            url,
            config: Arc::new(config),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
            reviews_count: None,
            images_count: None,
            progress: JobProgress::new("created", "Job created and queued"),
            runner_active: false,
        }
    }
}

/// 任务统计
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub total_jobs: usize,
    pub by_status: BTreeMap<String, usize>,
    pub running_jobs: usize,
    pub max_concurrent_jobs: usize,
    /// 当前被占用的工作槽位
    pub busy_workers: usize,
    /// 任务已结束但外部调用仍未返回的数量
    pub stale_runners: usize,
}
