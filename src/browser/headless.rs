use std::path::Path;

use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{AppError, AppResult, BrowserError};
use crate::infrastructure::ProxyEndpoint;

/// 桌面版 UA，保证 Google Maps 返回完整界面
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36";

/// 浏览器启动参数
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions<'a> {
    pub headless: bool,
    pub chrome_executable: Option<&'a str>,
    pub proxy: Option<&'a ProxyEndpoint>,
}

/// 启动浏览器
///
/// 返回浏览器和事件处理任务；浏览器关闭后事件任务随之结束
pub async fn launch_browser(options: &LaunchOptions<'_>) -> AppResult<(Browser, JoinHandle<()>)> {
    info!("🚀 启动浏览器 (headless: {})...", options.headless);

    let mut builder = BrowserConfig::builder();
    builder = if options.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };
    if let Some(path) = options.chrome_executable {
        debug!("Chrome 路径: {}", path);
        builder = builder.chrome_executable(Path::new(path));
    }

    let mut args = vec![
        "--disable-gpu".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--lang=en-US".to_string(),
    ];
    if let Some(proxy) = options.proxy {
        debug!("代理出口: {}:{}", proxy.host, proxy.port);
        args.push(format!("--proxy-server={}", proxy.server()));
    }

    let config = builder
        .window_size(1920, 1080)
        .args(args)
        .build()
        .map_err(|reason| {
            error!("配置浏览器失败: {}", reason);
            AppError::Browser(BrowserError::ConfigurationFailed { reason })
        })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        AppError::browser_launch_failed(e)
    })?;
    debug!("浏览器启动成功");

    // 在后台处理浏览器事件
    let handler_task = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    Ok((browser, handler_task))
}
