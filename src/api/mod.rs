//! HTTP 边界
//!
//! 把任务管理器的操作暴露为 JSON 接口，错误统一返回 `{"detail": "..."}`

mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::orchestrator::JobManager;
use crate::services::DebugArtifacts;

pub use handlers::ApiError;

/// 所有处理函数共享的状态
pub struct AppState {
    pub manager: JobManager,
    pub debug: DebugArtifacts,
}

/// 构建完整路由，`debug_dir` 是抓取流程保存调试快照的目录
pub fn build_router(manager: JobManager, debug_dir: impl Into<PathBuf>) -> Router {
    let state = Arc::new(AppState {
        manager,
        debug: DebugArtifacts::new(debug_dir),
    });

    Router::new()
        .route("/", get(handlers::health))
        .route("/scrape", post(handlers::start_scrape))
        .route("/jobs", get(handlers::list_jobs))
        .route(
            "/jobs/{job_id}",
            get(handlers::get_job).delete(handlers::delete_job),
        )
        .route("/jobs/{job_id}/start", post(handlers::start_job))
        .route("/jobs/{job_id}/cancel", post(handlers::cancel_job))
        .route("/stats", get(handlers::stats))
        .route("/cleanup", post(handlers::cleanup))
        .route("/debug/screenshot/{filename}", get(handlers::debug_file))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
