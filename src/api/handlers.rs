//! 接口处理函数

use std::sync::{Arc, OnceLock};

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::api::AppState;
use crate::models::{ConfigOverrides, Job, JobStats, JobStatus};
use crate::services::debug_artifacts::media_type;

const DEFAULT_LIST_LIMIT: usize = 100;
const MAX_LIST_LIMIT: usize = 1000;
const DEFAULT_MAX_AGE_HOURS: u32 = 24;

/// 接口错误，序列化为 `{"detail": "..."}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    fn job_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Job not found")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn message(text: impl Into<String>) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.into(),
    })
}

// ── Health ────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub message: &'static str,
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "Google Reviews Scraper API is running",
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ── Scrape ────────────────────────────────────────────────────────

/// `POST /scrape` 请求体：目标地址加上可选的配置覆盖项
#[derive(Deserialize)]
pub struct ScrapeRequest {
    pub url: String,
    #[serde(flatten)]
    pub overrides: ConfigOverrides,
}

#[derive(Serialize)]
pub struct ScrapeResponse {
    pub job_id: String,
    pub status: &'static str,
    pub message: String,
}

fn is_http_url(url: &str) -> bool {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    URL_RE
        .get_or_init(|| Regex::new(r"^https?://[^\s/?#]+\S*$").expect("URL 正则无效"))
        .is_match(url)
}

pub async fn start_scrape(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ScrapeRequest>, JsonRejection>,
) -> ApiResult<ScrapeResponse> {
    let Json(request) = body?;
    let url = request.url.trim();
    if !is_http_url(url) {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Invalid URL: {}", request.url),
        ));
    }

    let job_id = state.manager.create_job(url, &request.overrides);
    let started = state.manager.start_job(&job_id);
    let status = if started { "started" } else { "queued" };
    info!("🌐 接口创建任务 {} ({})", job_id, status);

    Ok(Json(ScrapeResponse {
        job_id,
        status,
        message: format!("Scraping job {} successfully", status),
    }))
}

// ── Jobs ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ListParams {
    pub status: Option<JobStatus>,
    pub limit: Option<usize>,
}

pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Vec<Job>> {
    let Query(params) = params?;
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if !(1..=MAX_LIST_LIMIT).contains(&limit) {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {}",
            MAX_LIST_LIMIT
        )));
    }
    Ok(Json(state.manager.list_jobs(params.status, limit)))
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Job> {
    state
        .manager
        .get_job(&job_id)
        .map(Json)
        .ok_or_else(ApiError::job_not_found)
}

pub async fn start_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<MessageResponse> {
    if state.manager.start_job(&job_id) {
        return Ok(message("Job started successfully"));
    }

    match state.manager.get_job(&job_id) {
        None => Err(ApiError::job_not_found()),
        Some(job) if job.status != JobStatus::Pending => Err(ApiError::bad_request(format!(
            "Job is not pending (current status: {})",
            job.status
        ))),
        Some(_) => Err(ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Maximum concurrent jobs reached",
        )),
    }
}

pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<MessageResponse> {
    if state.manager.cancel_job(&job_id) {
        return Ok(message("Job cancelled successfully"));
    }

    match state.manager.get_job(&job_id) {
        None => Err(ApiError::job_not_found()),
        Some(_) => Err(ApiError::bad_request(
            "Job cannot be cancelled (already completed, failed, or cancelled)",
        )),
    }
}

pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<MessageResponse> {
    if state.manager.delete_job(&job_id) {
        Ok(message("Job deleted successfully"))
    } else {
        Err(ApiError::job_not_found())
    }
}

// ── Stats & cleanup ───────────────────────────────────────────────

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<JobStats> {
    Json(state.manager.stats())
}

#[derive(Deserialize)]
pub struct CleanupParams {
    pub max_age_hours: Option<u32>,
}

#[derive(Serialize)]
pub struct CleanupResponse {
    pub message: String,
    pub removed: usize,
}

pub async fn cleanup(
    State(state): State<Arc<AppState>>,
    params: Result<Query<CleanupParams>, QueryRejection>,
) -> ApiResult<CleanupResponse> {
    let Query(params) = params?;
    let hours = params.max_age_hours.unwrap_or(DEFAULT_MAX_AGE_HOURS);
    if hours < 1 {
        return Err(ApiError::bad_request("max_age_hours must be at least 1"));
    }

    let removed = state.manager.cleanup(chrono::Duration::hours(i64::from(hours)));
    Ok(Json(CleanupResponse {
        message: format!("Cleaned up jobs older than {} hours", hours),
        removed,
    }))
}

// ── Debug ─────────────────────────────────────────────────────────

/// 读取最近一次抓取保存的截图或页面 HTML
pub async fn debug_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let path = state
        .debug
        .resolve(&filename)
        .ok_or_else(|| ApiError::bad_request("Invalid filename"))?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::new(
                StatusCode::NOT_FOUND,
                format!("File {} not found. Run a scrape job first.", filename),
            ))
        }
        Err(e) => {
            warn!("⚠️ 读取调试文件失败 {}: {}", path.display(), e);
            return Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to read {}", filename),
            ));
        }
    };

    let headers = [
        (header::CONTENT_TYPE, media_type(&filename).to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", filename),
        ),
    ];
    Ok((headers, bytes).into_response())
}
