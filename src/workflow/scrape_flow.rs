//! 评论抓取流程 - 流程层
//!
//! 核心职责：定义"一个地点"的完整抓取流程
//!
//! 流程顺序：
//! 1. 从轮换器取代理出口 → 启动浏览器
//! 2. 预置同意 Cookie → 打开地点页面 → 关闭 Cookie 弹窗（保存快照）→ 打开评论标签 → 排序
//! 3. 滚动并提取评论（每次滚动前等待请求间隔）
//! 4. 合并写入评论存储

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chromiumoxide::auth::Credentials;
use chromiumoxide::Browser;
use tokio::runtime::Handle;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::browser::{launch_browser, LaunchOptions, DESKTOP_USER_AGENT};
use crate::infrastructure::{JsExecutor, ProxyEndpoint, ProxyRotator};
use crate::models::{Review, ScrapeConfig};
use crate::services::{DebugArtifacts, DebugStage, MapsPage, StoreLocks};
use crate::workflow::scrape_runner::{RunOutcome, ScrapeRunner};

/// 浏览器流程的固定选项
#[derive(Debug, Clone)]
pub struct FlowOptions {
    /// Chrome 可执行文件路径
    pub chrome_executable: Option<String>,
    /// 预置的 Google Cookie（`name=value; ...`），为空时使用默认同意记录
    pub google_cookies: Option<String>,
    /// 调试快照目录
    pub debug_dir: PathBuf,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            google_cookies: None,
            debug_dir: std::env::temp_dir(),
        }
    }
}

/// 基于 Chromium 的抓取流程
///
/// - 持有共享的代理轮换器和评论文件的合并锁
/// - 每次运行启动一个独立的浏览器，代理出口在浏览器生命周期内固定
/// - 不持有任何任务状态
pub struct ChromiumScrapeFlow {
    rotator: Arc<ProxyRotator>,
    stores: StoreLocks,
    debug: DebugArtifacts,
    options: FlowOptions,
    runtime: Handle,
}

impl ChromiumScrapeFlow {
    pub fn new(rotator: Arc<ProxyRotator>, options: FlowOptions, runtime: Handle) -> Self {
        Self {
            rotator,
            stores: StoreLocks::default(),
            debug: DebugArtifacts::new(options.debug_dir.clone()),
            options,
            runtime,
        }
    }

    /// 执行完整抓取流程
    ///
    /// 轮换器的 `throttle` 会阻塞当前线程，因此只应在阻塞线程上驱动（见 `ScrapeRunner::run`）
    pub async fn scrape(&self, config: &ScrapeConfig) -> Result<RunOutcome> {
        info!("🔍 开始抓取: {}", config.url);

        let store = self.stores.store(&config.json_path);
        let known_ids = if config.stop_on_match {
            store.known_ids().await.context("读取已存储评论失败")?
        } else {
            HashSet::new()
        };

        // 页面加载前取得代理出口
        let proxy = self.rotator.issue();
        self.rotator.throttle();

        let (mut browser, handler_task) = launch_browser(&LaunchOptions {
            headless: config.headless,
            chrome_executable: self.options.chrome_executable.as_deref(),
            proxy: proxy.as_ref(),
        })
        .await?;

        let result = self
            .collect_reviews(&browser, proxy.as_ref(), config, &known_ids)
            .await;

        if let Err(e) = browser.close().await {
            warn!("⚠️ 关闭浏览器失败: {}", e);
        }
        if let Err(e) = handler_task.await {
            warn!("⚠️ 浏览器事件任务异常结束: {}", e);
        }

        let mut reviews = result?;
        let images_count: usize = reviews.iter().map(|r| r.images.len()).sum();
        if !config.download_images {
            for review in &mut reviews {
                review.images.clear();
            }
        }
        let reviews_count = reviews.len();

        store
            .merge(reviews, config.overwrite_existing, &config.custom_params)
            .await
            .context("保存评论失败")?;

        info!("✅ 抓取完成: {} 条评论, {} 张图片", reviews_count, images_count);
        Ok(RunOutcome {
            reviews_count: Some(reviews_count as u64),
            images_count: Some(images_count as u64),
        })
    }

    async fn collect_reviews(
        &self,
        browser: &Browser,
        proxy: Option<&ProxyEndpoint>,
        config: &ScrapeConfig,
        known_ids: &HashSet<String>,
    ) -> Result<Vec<Review>> {
        let page = browser.new_page("about:blank").await.context("创建页面失败")?;
        if let Some(proxy) = proxy {
            page.authenticate(Credentials {
                username: proxy.user.clone(),
                password: proxy.pass.clone(),
            })
            .await
            .context("设置代理认证失败")?;
        }
        page.set_user_agent(DESKTOP_USER_AGENT)
            .await
            .context("设置 User-Agent 失败")?;

        let executor = JsExecutor::new(page);
        let maps = MapsPage::new(&executor);
        if let Err(e) = maps
            .seed_consent_cookies(self.options.google_cookies.as_deref())
            .await
        {
            warn!("⚠️ 预置 Cookie 失败，继续加载页面: {}", e);
        }

        executor
            .navigate(&config.url, Duration::from_secs(config.page_load_timeout_secs))
            .await?;
        sleep(Duration::from_secs(2)).await;

        maps.dismiss_cookies().await?;
        self.debug.capture(&executor, DebugStage::AfterCookies).await;
        if !maps.open_reviews_tab().await? {
            self.debug.capture(&executor, DebugStage::BeforeClick).await;
            bail!("页面上没有找到评论标签: {}", config.url);
        }
        maps.set_sort(config.sort_by).await?;

        let mut collected = Vec::new();
        let mut seen = HashSet::new();
        let mut idle_scrolls = 0;

        loop {
            let mut new_reviews = 0;
            let mut reached_known = false;

            for review in maps.extract_reviews().await? {
                if !seen.insert(review.review_id.clone()) {
                    continue;
                }
                if known_ids.contains(&review.review_id) {
                    reached_known = true;
                    break;
                }
                collected.push(review);
                new_reviews += 1;
            }

            if reached_known {
                info!("⏹️ 遇到已存储的评论，停止抓取");
                break;
            }
            if let Some(max) = config.max_reviews {
                if collected.len() >= max {
                    collected.truncate(max);
                    break;
                }
            }
            if new_reviews == 0 {
                idle_scrolls += 1;
                if idle_scrolls >= config.scroll_idle_limit {
                    break;
                }
            } else {
                idle_scrolls = 0;
                info!("📄 已加载 {} 条评论", collected.len());
            }

            self.rotator.throttle();
            maps.scroll_reviews().await?;
            sleep(Duration::from_millis(800)).await;
        }

        Ok(collected)
    }
}

impl ScrapeRunner for ChromiumScrapeFlow {
    fn run(&self, config: &ScrapeConfig) -> Result<RunOutcome> {
        self.runtime.block_on(self.scrape(config))
    }
}
