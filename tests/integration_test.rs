use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use reviews_scraper_api::api::build_router;
use reviews_scraper_api::{
    logger, ChromiumScrapeFlow, Config, JobManager, JobManagerConfig, ProxyRotator, RunOutcome,
    ScrapeConfig,
};
use uuid::Uuid;

/// 测试用执行器：等待放行后返回固定结果
#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cv.wait(open).unwrap();
        }
    }
}

fn temp_debug_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("reviews_debug_{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn test_app(max_concurrent_jobs: usize) -> (Router, Arc<Gate>) {
    test_app_in(max_concurrent_jobs, &std::env::temp_dir())
}

fn test_app_in(max_concurrent_jobs: usize, debug_dir: &Path) -> (Router, Arc<Gate>) {
    let gate = Arc::new(Gate::default());
    let runner_gate = Arc::clone(&gate);
    let runner = move |_: &ScrapeConfig| -> anyhow::Result<RunOutcome> {
        runner_gate.wait();
        Ok(RunOutcome {
            reviews_count: Some(7),
            images_count: Some(2),
        })
    };

    let manager = JobManager::new(
        JobManagerConfig {
            max_concurrent_jobs,
            job_timeout: Duration::from_secs(10),
        },
        ScrapeConfig::default(),
        Arc::new(runner),
    )
    .expect("创建任务管理器失败");

    (build_router(manager, debug_dir), gate)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn wait_for_status(app: &Router, job_id: &str, status: &str) -> Value {
    for _ in 0..250 {
        let (code, job) = send(app, "GET", &format!("/jobs/{}", job_id), None).await;
        assert_eq!(code, StatusCode::OK);
        if job["status"] == status {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("任务 {} 没有进入 {} 状态", job_id, status);
}

#[tokio::test]
async fn test_health() {
    let (app, _gate) = test_app(1);
    let (status, body) = send(&app, "GET", "/", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_scrape_rejects_invalid_url() {
    let (app, _gate) = test_app(1);

    let (status, body) = send(&app, "POST", "/scrape", Some(json!({ "url": "ftp://nope" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().contains("ftp://nope"));

    let (status, body) = send(&app, "POST", "/scrape", Some(json!({ "headless": false }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].is_string());

    let (_, stats) = send(&app, "GET", "/stats", None).await;
    assert_eq!(stats["total_jobs"], 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_job_lifecycle_over_http() {
    let (app, gate) = test_app(1);

    let (status, first) = send(
        &app,
        "POST",
        "/scrape",
        Some(json!({ "url": "https://maps.google.com/?cid=1", "sort_by": "newest" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "started");
    let first_id = first["job_id"].as_str().unwrap().to_string();

    let (_, second) = send(
        &app,
        "POST",
        "/scrape",
        Some(json!({ "url": "https://maps.google.com/?cid=2" })),
    )
    .await;
    assert_eq!(second["status"], "queued");
    let second_id = second["job_id"].as_str().unwrap().to_string();

    // 上限已满
    let (status, body) = send(&app, "POST", &format!("/jobs/{}/start", second_id), None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["detail"], "Maximum concurrent jobs reached");

    let (_, stats) = send(&app, "GET", "/stats", None).await;
    assert_eq!(stats["running_jobs"], 1);
    assert_eq!(stats["by_status"]["pending"], 1);
    assert_eq!(stats["max_concurrent_jobs"], 1);

    gate.open();
    let done = wait_for_status(&app, &first_id, "completed").await;
    assert_eq!(done["reviews_count"], 7);
    assert_eq!(done["images_count"], 2);
    assert!(done["completed_at"].is_string());

    let (status, _) = send(&app, "POST", &format!("/jobs/{}/start", second_id), None).await;
    assert_eq!(status, StatusCode::OK);
    wait_for_status(&app, &second_id, "completed").await;

    let (status, body) = send(&app, "POST", &format!("/jobs/{}/start", first_id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("completed"));

    let (status, _) = send(&app, "POST", &format!("/jobs/{}/cancel", first_id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "DELETE", &format!("/jobs/{}", first_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, "GET", &format!("/jobs/{}", first_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Job not found");
    let (status, _) = send(&app, "DELETE", &format!("/jobs/{}", first_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_and_unknown_jobs() {
    let (app, gate) = test_app(1);

    for method_uri in [
        ("GET", "/jobs/missing"),
        ("POST", "/jobs/missing/start"),
        ("POST", "/jobs/missing/cancel"),
        ("DELETE", "/jobs/missing"),
    ] {
        let (status, _) = send(&app, method_uri.0, method_uri.1, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{:?}", method_uri);
    }

    // 上限为 1：第一个任务占满，第二个保持等待
    let (_, first) = send(&app, "POST", "/scrape", Some(json!({ "url": "https://a.example" }))).await;
    let (_, second) = send(&app, "POST", "/scrape", Some(json!({ "url": "https://b.example" }))).await;
    let second_id = second["job_id"].as_str().unwrap();

    let (status, _) = send(&app, "POST", &format!("/jobs/{}/cancel", second_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, job) = send(&app, "GET", &format!("/jobs/{}", second_id), None).await;
    assert_eq!(job["status"], "cancelled");
    assert_eq!(job["progress"]["stage"], "cancelled");

    let (status, _) = send(&app, "POST", &format!("/jobs/{}/cancel", second_id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let first_id = first["job_id"].as_str().unwrap();
    let (status, _) = send(&app, "POST", &format!("/jobs/{}/cancel", first_id), None).await;
    assert_eq!(status, StatusCode::OK);

    // 取消不会中断执行器，放行后才能正常退出
    gate.open();
}

#[tokio::test]
async fn test_list_filters_and_validates_limit() {
    let (app, gate) = test_app(3);

    let mut ids = Vec::new();
    for i in 0..3 {
        let (_, created) = send(
            &app,
            "POST",
            "/scrape",
            Some(json!({ "url": format!("https://place.example/{}", i) })),
        )
        .await;
        ids.push(created["job_id"].as_str().unwrap().to_string());
    }
    let (status, _) = send(&app, "POST", &format!("/jobs/{}/cancel", ids[0]), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, all) = send(&app, "GET", "/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 3);

    let (_, limited) = send(&app, "GET", "/jobs?limit=2", None).await;
    assert_eq!(limited.as_array().unwrap().len(), 2);

    let (_, cancelled) = send(&app, "GET", "/jobs?status=cancelled", None).await;
    let cancelled = cancelled.as_array().unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0]["job_id"], ids[0]);

    for uri in ["/jobs?limit=0", "/jobs?limit=1001", "/jobs?status=paused"] {
        let (status, body) = send(&app, "GET", uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert!(body["detail"].is_string());
    }

    gate.open();
}

#[tokio::test]
async fn test_cleanup_endpoint() {
    let (app, _gate) = test_app(1);

    let (status, body) = send(&app, "POST", "/cleanup", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 0);
    assert_eq!(body["message"], "Cleaned up jobs older than 24 hours");

    let (status, _) = send(&app, "POST", "/cleanup?max_age_hours=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_debug_files_are_whitelisted() {
    let dir = temp_debug_dir();
    let (app, _gate) = test_app_in(1, &dir);

    for name in ["reviews.json", "..%2Fetc%2Fpasswd", "screenshot.png"] {
        let (status, body) = send(&app, "GET", &format!("/debug/screenshot/{}", name), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", name);
        assert_eq!(body["detail"], "Invalid filename");
    }

    let (status, body) = send(&app, "GET", "/debug/screenshot/screenshot_after_cookies.png", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["detail"],
        "File screenshot_after_cookies.png not found. Run a scrape job first."
    );

    let png = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    std::fs::write(dir.join("screenshot_after_cookies.png"), &png).unwrap();
    std::fs::write(dir.join("page_before_click.html"), "<html></html>").unwrap();

    for (name, content_type, expected) in [
        ("screenshot_after_cookies.png", "image/png", png.clone()),
        ("page_before_click.html", "text/html", b"<html></html>".to_vec()),
    ] {
        let request = Request::builder()
            .uri(format!("/debug/screenshot/{}", name))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let header_value = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(header_value.starts_with(content_type), "{}", header_value);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes.to_vec(), expected);
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore] // 默认忽略，需要 Chromium 和网络：cargo test -- --ignored
async fn test_scrape_single_place() {
    // 初始化日志
    logger::init();

    // 加载配置
    let config = Config::from_env();
    let rotator = if config.proxy.enabled {
        ProxyRotator::new(&config.proxy).expect("代理配置无效")
    } else {
        ProxyRotator::disabled()
    };

    let runner = ChromiumScrapeFlow::new(
        Arc::new(rotator),
        config.flow_options(),
        tokio::runtime::Handle::current(),
    );
    let manager = JobManager::new(
        config.job_manager(),
        ScrapeConfig {
            max_reviews: Some(10),
            json_path: std::env::temp_dir()
                .join("reviews_live_test.json")
                .display()
                .to_string(),
            ..ScrapeConfig::default()
        },
        Arc::new(runner),
    )
    .expect("创建任务管理器失败");
    let app = build_router(manager, config.debug_dir.clone());

    // 注意：请根据实际情况修改地点链接
    let (_, created) = send(
        &app,
        "POST",
        "/scrape",
        Some(json!({ "url": "https://www.google.com/maps/place/Eiffel+Tower" })),
    )
    .await;
    let job_id = created["job_id"].as_str().unwrap().to_string();

    let mut job = Value::Null;
    for _ in 0..600 {
        let (_, current) = send(&app, "GET", &format!("/jobs/{}", job_id), None).await;
        if current["status"] != "running" {
            job = current;
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    assert_eq!(job["status"], "completed", "抓取应该成功: {}", job);
    assert!(job["reviews_count"].as_u64().unwrap_or(0) > 0);
}
