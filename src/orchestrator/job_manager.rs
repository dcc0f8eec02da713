//! 任务管理器 - 编排层
//!
//! ## 职责
//!
//! 持有全部任务及其状态，控制并发上限，把任务交给工作池执行，
//! 并对每个任务施加超时。
//!
//! ## 状态机
//!
//! ```text
//! PENDING --start--> RUNNING --success--> COMPLETED
//! PENDING --cancel--> CANCELLED
//! RUNNING --cancel--> CANCELLED
//! RUNNING --timeout/error--> FAILED
//! ```
//!
//! 终态不再变化。任务结束后才返回的执行结果会被忽略。
//!
//! ## 超时与取消
//!
//! 抓取调用是不可抢占的阻塞调用。超时后任务立即记为 FAILED，
//! 但调用本身会继续占用工作槽位直到返回；取消运行中的任务同理，
//! 只改变记录的状态。两种情况都会体现在 `runner_active` 和
//! `JobStats::stale_runners` 上。

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{ConfigOverrides, Job, JobProgress, JobStats, JobStatus, ScrapeConfig};
use crate::workflow::{RunOutcome, ScrapeRunner};

/// 任务管理器配置
#[derive(Debug, Clone)]
pub struct JobManagerConfig {
    /// 同时运行的任务上限，也是工作池大小
    pub max_concurrent_jobs: usize,
    /// 单个任务的超时时间
    pub job_timeout: Duration,
}

impl Default for JobManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 3,
            job_timeout: Duration::from_secs(1800),
        }
    }
}

/// 运行失败的原因
#[derive(Debug, Error)]
enum RunFailure {
    #[error("Job timeout: exceeded {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("{0}")]
    Error(String),
    #[error("Scraper panicked: {0}")]
    Panicked(String),
    #[error("Job manager is shutting down")]
    Shutdown,
}

/// 任务管理器
///
/// 可以廉价克隆，所有克隆共享同一份任务表
#[derive(Clone)]
pub struct JobManager {
    shared: Arc<Shared>,
}

struct Shared {
    jobs: Mutex<HashMap<String, Job>>,
    defaults: RwLock<Arc<ScrapeConfig>>,
    runner: Arc<dyn ScrapeRunner>,
    workers: Arc<Semaphore>,
    max_concurrent_jobs: usize,
    job_timeout: Duration,
    runtime: Handle,
}

impl JobManager {
    /// 创建任务管理器
    ///
    /// 必须在 tokio 运行时内调用，后台执行会派发到该运行时
    pub fn new(
        config: JobManagerConfig,
        defaults: ScrapeConfig,
        runner: Arc<dyn ScrapeRunner>,
    ) -> AppResult<Self> {
        if config.max_concurrent_jobs == 0 {
            return Err(AppError::invalid_value("MAX_CONCURRENT_JOBS", "必须大于 0"));
        }
        let runtime = Handle::try_current()
            .map_err(|e| AppError::Other(format!("任务管理器需要在 tokio 运行时中创建: {}", e)))?;

        Ok(Self {
            shared: Arc::new(Shared {
                jobs: Mutex::new(HashMap::new()),
                defaults: RwLock::new(Arc::new(defaults)),
                runner,
                workers: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
                max_concurrent_jobs: config.max_concurrent_jobs,
                job_timeout: config.job_timeout,
                runtime,
            }),
        })
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.shared.max_concurrent_jobs
    }

    /// 当前默认抓取配置
    pub fn default_config(&self) -> Arc<ScrapeConfig> {
        let defaults = self.shared.defaults.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&defaults)
    }

    /// 替换默认抓取配置，已创建的任务不受影响
    pub fn set_default_config(&self, config: ScrapeConfig) {
        let mut defaults = self.shared.defaults.write().unwrap_or_else(PoisonError::into_inner);
        *defaults = Arc::new(config);
        info!("⚙️ 默认抓取配置已更新");
    }

    /// 创建任务，返回任务 ID
    pub fn create_job(&self, url: impl Into<String>, overrides: &ConfigOverrides) -> String {
        let url = url.into();
        let job_id = Uuid::new_v4().to_string();
        let config = self.default_config().merged(&url, overrides);
        let job = Job::new(job_id.clone(), url.clone(), config);

        self.shared.lock_jobs().insert(job_id.clone(), job);

        info!("📝 已创建抓取任务 {}: {}", job_id, url);
        job_id
    }

    /// 启动一个等待中的任务
    ///
    /// 任务不存在、不处于 PENDING，或运行中的任务已达上限时返回 `false`，不改变任何状态。
    /// 上限检查与状态切换在同一次加锁内完成。
    pub fn start_job(&self, job_id: &str) -> bool {
        let config = {
            let mut jobs = self.shared.lock_jobs();
            let running = jobs
                .values()
                .filter(|job| job.status == JobStatus::Running)
                .count();

            let Some(job) = jobs.get_mut(job_id) else {
                return false;
            };
            if job.status != JobStatus::Pending {
                return false;
            }
            if running >= self.shared.max_concurrent_jobs {
                debug!(
                    "任务 {} 无法启动: 运行中的任务已达上限 {}",
                    job_id, self.shared.max_concurrent_jobs
                );
                return false;
            }

            job.status = JobStatus::Running;
            job.started_at = Some(now_not_before(job.created_at));
            job.progress = JobProgress::new("starting", "Initializing scraper");
            Arc::clone(&job.config)
        };

        // 超时从启动时刻算起，等待工作槽位的时间也计入
        let deadline = Instant::now() + self.shared.job_timeout;
        let shared = Arc::clone(&self.shared);
        self.shared
            .runtime
            .spawn(run_job(shared, job_id.to_string(), config, deadline));

        info!("▶️ 已启动抓取任务 {}", job_id);
        true
    }

    /// 获取任务快照
    pub fn get_job(&self, job_id: &str) -> Option<Job> {
        self.shared.lock_jobs().get(job_id).cloned()
    }

    /// 按创建时间倒序列出任务
    pub fn list_jobs(&self, status: Option<JobStatus>, limit: usize) -> Vec<Job> {
        let mut jobs: Vec<Job> = {
            let jobs = self.shared.lock_jobs();
            jobs.values()
                .filter(|job| status.map_or(true, |s| job.status == s))
                .cloned()
                .collect()
        };

        jobs.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        jobs.truncate(limit);
        jobs
    }

    /// 取消等待中或运行中的任务
    ///
    /// 运行中的抓取调用不会被中断，只是任务记录变为 CANCELLED
    pub fn cancel_job(&self, job_id: &str) -> bool {
        let was_running = {
            let mut jobs = self.shared.lock_jobs();
            let Some(job) = jobs.get_mut(job_id) else {
                return false;
            };
            if job.status.is_terminal() {
                return false;
            }

            let was_running = job.status == JobStatus::Running;
            job.status = JobStatus::Cancelled;
            job.completed_at = Some(now_not_before(job.started_at.unwrap_or(job.created_at)));
            job.progress = JobProgress::new("cancelled", "Job was cancelled");
            was_running
        };

        if was_running {
            warn!("⚠️ 任务 {} 已标记为取消，正在进行的抓取会继续运行直到返回或超时", job_id);
        }
        info!("⏹️ 已取消抓取任务 {}", job_id);
        true
    }

    /// 删除任务（不论状态）
    pub fn delete_job(&self, job_id: &str) -> bool {
        let removed = self.shared.lock_jobs().remove(job_id).is_some();
        if removed {
            info!("🗑️ 已删除抓取任务 {}", job_id);
        }
        removed
    }

    /// 任务统计
    pub fn stats(&self) -> JobStats {
        let jobs = self.shared.lock_jobs();

        let mut by_status: BTreeMap<String, usize> = JobStatus::ALL
            .iter()
            .map(|status| (status.as_str().to_string(), 0))
            .collect();
        let mut stale_runners = 0;
        for job in jobs.values() {
            *by_status.entry(job.status.as_str().to_string()).or_default() += 1;
            if job.runner_active && job.status.is_terminal() {
                stale_runners += 1;
            }
        }

        JobStats {
            total_jobs: jobs.len(),
            running_jobs: by_status
                .get(JobStatus::Running.as_str())
                .copied()
                .unwrap_or(0),
            by_status,
            max_concurrent_jobs: self.shared.max_concurrent_jobs,
            busy_workers: self
                .shared
                .max_concurrent_jobs
                .saturating_sub(self.shared.workers.available_permits()),
            stale_runners,
        }
    }

    /// 删除结束时间早于 `now - max_age` 的终态任务，返回删除数量
    pub fn cleanup(&self, max_age: chrono::Duration) -> usize {
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let removed = {
            let mut jobs = self.shared.lock_jobs();
            let before = jobs.len();
            jobs.retain(|_, job| {
                !(job.status.is_terminal() && job.completed_at.is_some_and(|t| t < cutoff))
            });
            before - jobs.len()
        };

        if removed > 0 {
            info!("🧹 已清理 {} 个过期任务", removed);
        }
        removed
    }

    /// 关闭工作池：排队中的任务会以失败结束，正在执行的调用自行结束
    pub fn shutdown(&self) {
        info!("正在关闭任务管理器");
        self.shared.workers.close();
    }
}

impl Shared {
    // 每次修改都是同一个代码块内的若干字段赋值，中间不会 panic，中毒的锁仍然一致
    fn lock_jobs(&self) -> MutexGuard<'_, HashMap<String, Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 任务拿到工作槽位后标记开始调用；任务已不在运行状态时返回 `false`
    fn mark_runner_started(&self, job_id: &str) -> bool {
        let mut jobs = self.lock_jobs();
        match jobs.get_mut(job_id) {
            Some(job) if job.status == JobStatus::Running => {
                job.runner_active = true;
                job.progress = JobProgress::new("scraping", "Scraping reviews in progress");
                true
            }
            _ => false,
        }
    }

    fn mark_runner_finished(&self, job_id: &str) {
        if let Some(job) = self.lock_jobs().get_mut(job_id) {
            job.runner_active = false;
        }
    }

    /// 记录运行结果，只对仍处于 RUNNING 的任务生效
    fn finish(&self, job_id: &str, result: Result<RunOutcome, RunFailure>) {
        let mut jobs = self.lock_jobs();
        let Some(job) = jobs.get_mut(job_id) else {
            debug!("任务 {} 已被删除，忽略运行结果", job_id);
            return;
        };
        if job.status != JobStatus::Running {
            debug!("任务 {} 已处于 {} 状态，忽略运行结果", job_id, job.status);
            return;
        }

        let completed_at = now_not_before(job.started_at.unwrap_or(job.created_at));
        match result {
            Ok(outcome) => {
                job.status = JobStatus::Completed;
                job.completed_at = Some(completed_at);
                job.reviews_count = outcome.reviews_count;
                job.images_count = outcome.images_count;
                job.progress = JobProgress::new("completed", "Scraping completed successfully");
                info!("✅ 抓取任务 {} 完成", job_id);
            }
            Err(failure) => {
                let progress_message = match &failure {
                    RunFailure::Timeout(timeout) => {
                        warn!(
                            "任务 {} 超过 {}s 超时，抓取调用可能仍在运行",
                            job_id,
                            timeout.as_secs()
                        );
                        format!("Job exceeded {}s timeout", timeout.as_secs())
                    }
                    other => format!("Job failed: {}", other),
                };
                error!("❌ 抓取任务 {} 失败: {}", job_id, failure);
                job.status = JobStatus::Failed;
                job.completed_at = Some(completed_at);
                job.error_message = Some(failure.to_string());
                job.progress = JobProgress::new("failed", progress_message);
            }
        }
    }
}

/// 抓取调用结束（包括 panic）时清除 `runner_active`
struct RunnerGuard {
    shared: Arc<Shared>,
    job_id: String,
}

impl Drop for RunnerGuard {
    fn drop(&mut self) {
        self.shared.mark_runner_finished(&self.job_id);
    }
}

/// 后台执行单个任务
///
/// 等待工作槽位和抓取调用共用同一个截止时间
async fn run_job(shared: Arc<Shared>, job_id: String, config: Arc<ScrapeConfig>, deadline: Instant) {
    let acquire = Arc::clone(&shared.workers).acquire_owned();
    let permit = match tokio::time::timeout_at(deadline, acquire).await {
        Ok(Ok(permit)) => permit,
        Ok(Err(_)) => {
            shared.finish(&job_id, Err(RunFailure::Shutdown));
            return;
        }
        Err(_) => {
            debug!("任务 {} 在等待工作槽位时超时", job_id);
            shared.finish(&job_id, Err(RunFailure::Timeout(shared.job_timeout)));
            return;
        }
    };

    if !shared.mark_runner_started(&job_id) {
        debug!("任务 {} 在等待工作槽位时已结束，跳过执行", job_id);
        return;
    }

    let runner = Arc::clone(&shared.runner);
    let guard = RunnerGuard {
        shared: Arc::clone(&shared),
        job_id: job_id.clone(),
    };
    // 槽位随阻塞调用一起移动：超时后调用仍占着槽位，直到真正返回
    let call = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let _guard = guard;
        runner.run(&config)
    });

    let result = match tokio::time::timeout_at(deadline, call).await {
        Ok(Ok(Ok(outcome))) => Ok(outcome),
        Ok(Ok(Err(e))) => Err(RunFailure::Error(format!("{:#}", e))),
        Ok(Err(join_error)) if join_error.is_panic() => {
            Err(RunFailure::Panicked(panic_message(join_error.into_panic())))
        }
        Ok(Err(join_error)) => Err(RunFailure::Error(join_error.to_string())),
        Err(_) => Err(RunFailure::Timeout(shared.job_timeout)),
    };

    shared.finish(&job_id, result);
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 当前时间，但不早于 `floor`，保证 created_at ≤ started_at ≤ completed_at
fn now_not_before(floor: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(floor)
}
