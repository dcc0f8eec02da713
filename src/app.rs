use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api;
use crate::config::Config;
use crate::infrastructure::ProxyRotator;
use crate::models::load_scrape_config;
use crate::orchestrator::{spawn_cleanup_task, JobManager};
use crate::workflow::ChromiumScrapeFlow;

/// 应用主结构
pub struct App {
    config: Config,
    manager: JobManager,
    cleanup_task: JoinHandle<()>,
}

impl App {
    /// 初始化应用
    ///
    /// 代理配置不完整或默认抓取配置文件损坏时直接失败
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let rotator = if config.proxy.enabled {
            ProxyRotator::new(&config.proxy).context("代理轮换器配置无效")?
        } else {
            ProxyRotator::disabled()
        };
        let rotator = Arc::new(rotator);

        let defaults = load_scrape_config(Path::new(&config.scrape_config_file))
            .await
            .context("加载默认抓取配置失败")?;

        let runner = ChromiumScrapeFlow::new(Arc::clone(&rotator), config.flow_options(), Handle::current());
        let manager = JobManager::new(config.job_manager(), defaults, Arc::new(runner))?;

        let cleanup_task = spawn_cleanup_task(
            manager.clone(),
            config.cleanup_interval(),
            config.job_retention(),
        );

        Ok(Self {
            config,
            manager,
            cleanup_task,
        })
    }

    /// 启动 HTTP 服务，直到收到 Ctrl-C
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("无法监听 {}", addr))?;
        log_listening(&addr);

        let router = api::build_router(self.manager.clone(), self.config.debug_dir.clone());
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP 服务异常退出")?;

        self.cleanup_task.abort();
        self.manager.shutdown();
        log_shutdown(&self.manager);

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("⚠️ 无法监听 Ctrl-C 信号: {}", e);
        std::future::pending::<()>().await;
    }
    info!("\n收到退出信号，正在停止服务...");
}

// ========== 日志辅助函数 ==========

fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 评论抓取任务服务");
    info!("📊 最大并发任务数: {}", config.max_concurrent_jobs);
    info!("⏱️ 单任务超时: {}s", config.job_timeout_secs);
    info!(
        "🧹 清理间隔: {}s, 保留 {} 小时",
        config.cleanup_interval_secs, config.job_retention_hours
    );
    if config.proxy.enabled {
        info!(
            "🌐 代理: {} 端口 {}-{}, 每个出口 {} 次请求",
            config.proxy.host.as_deref().unwrap_or("-"),
            config.proxy.port_start,
            config.proxy.port_end,
            config.proxy.max_requests_per_ip
        );
    } else {
        info!("🌐 代理: 未启用");
    }
    info!("📸 调试快照目录: {}", config.debug_dir.display());
    info!("{}", "=".repeat(60));
}

fn log_listening(addr: &str) {
    info!("✓ HTTP 服务已启动: http://{}", addr);
}

fn log_shutdown(manager: &JobManager) {
    let stats = manager.stats();
    info!("\n{}", "=".repeat(60));
    info!("📊 服务已停止");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("任务总数: {}", stats.total_jobs);
    for (status, count) in &stats.by_status {
        info!("  {}: {}", status, count);
    }
    if stats.stale_runners > 0 {
        warn!("⚠️ 仍有 {} 个已结束任务的抓取调用在运行", stats.stale_runners);
    }
    info!("{}", "=".repeat(60));
}
