//! # Reviews Scraper API
//!
//! 一个用于后台抓取 Google Maps 评论的 Rust 服务
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page、代理出口），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//! - `ProxyRotator` - 代理出口轮换和请求节流
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `MapsPage` - 地点页面操作（评论标签、排序、滚动、提取）
//! - `JsonReviewStore` - 评论存储（按路径串行合并）
//! - `DebugArtifacts` - 调试截图和页面 HTML
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个地点"的完整抓取流程
//! - `ScrapeRunner` - 执行器接口，编排层只认识它
//! - `ChromiumScrapeFlow` - 基于 Chromium 的实现
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/job_manager` - 任务记录、并发上限、工作池与超时
//! - `orchestrator/cleanup` - 定期清理已结束的任务
//!
//! ### ⑤ 接口层（API）
//! - `api/` - HTTP 路由
//!
//! ## 模块结构

pub mod api;
pub mod app;
pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{ProxyEndpoint, ProxyRotator, ProxySettings};
pub use models::{ConfigOverrides, Job, JobStats, JobStatus, ScrapeConfig};
pub use orchestrator::{JobManager, JobManagerConfig};
pub use workflow::{ChromiumScrapeFlow, FlowOptions, RunOutcome, ScrapeRunner};
