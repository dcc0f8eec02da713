//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责任务生命周期和并发调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `job_manager` - 任务管理器
//! - 持有全部任务记录（创建、查询、列出、取消、删除、统计）
//! - 控制同时运行的任务上限（启动时检查）
//! - 管理工作池（Semaphore）并对每个任务施加超时
//! - 保证终态不被后到的结果覆盖
//!
//! ### `cleanup` - 定期清理
//! - 按保留时长删除已结束的任务
//!
//! ## 层次关系
//!
//! ```text
//! api (HTTP 边界)
//!     ↓
//! orchestrator::JobManager (处理 Vec<Job>)
//!     ↓
//! workflow::ScrapeRunner (处理单个 ScrapeConfig)
//!     ↓
//! services (能力层：maps_page / review_store)
//!     ↓
//! infrastructure (基础设施：JsExecutor / ProxyRotator)
//! ```
//!
//! ## 设计原则
//!
//! 1. **只认识配置快照**：执行器拿到的是任务创建时的配置，看不到任务本身
//! 2. **向下依赖**：编排层 → workflow → services → infrastructure
//! 3. **无业务逻辑**：只做调度和状态记录，不关心怎么抓取

pub mod cleanup;
pub mod job_manager;

pub use cleanup::spawn_cleanup_task;
pub use job_manager::{JobManager, JobManagerConfig};
