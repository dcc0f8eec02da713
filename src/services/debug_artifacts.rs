//! 调试快照 - 业务能力层
//!
//! 抓取过程中在关键步骤保存截图和页面 HTML，接口层按白名单读取

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::infrastructure::JsExecutor;

/// 接口允许读取的全部快照文件
pub const DEBUG_FILES: &[&str] = &[
    "screenshot_after_cookies.png",
    "screenshot_before_click.png",
    "page_after_cookies.html",
    "page_before_click.html",
];

/// 保存快照的时机
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugStage {
    /// 处理完 Cookie 弹窗之后
    AfterCookies,
    /// 点击评论标签之前（找不到标签时保存）
    BeforeClick,
}

impl DebugStage {
    fn suffix(self) -> &'static str {
        match self {
            DebugStage::AfterCookies => "after_cookies",
            DebugStage::BeforeClick => "before_click",
        }
    }

    pub fn screenshot_name(self) -> String {
        format!("screenshot_{}.png", self.suffix())
    }

    pub fn html_name(self) -> String {
        format!("page_{}.html", self.suffix())
    }
}

/// 快照目录
#[derive(Debug, Clone)]
pub struct DebugArtifacts {
    dir: PathBuf,
}

impl DebugArtifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 白名单内的文件名解析为完整路径，其余返回 `None`
    pub fn resolve(&self, filename: &str) -> Option<PathBuf> {
        DEBUG_FILES
            .contains(&filename)
            .then(|| self.dir.join(filename))
    }

    /// 保存截图和 HTML；失败只记录警告，不影响抓取
    pub async fn capture(&self, executor: &JsExecutor, stage: DebugStage) {
        if let Err(e) = fs::create_dir_all(&self.dir).await {
            warn!("⚠️ 无法创建调试目录 {}: {}", self.dir.display(), e);
            return;
        }

        match executor.screenshot().await {
            Ok(png) => self.write(&stage.screenshot_name(), png).await,
            Err(e) => warn!("⚠️ 截图失败 ({:?}): {}", stage, e),
        }
        match executor.content().await {
            Ok(html) => self.write(&stage.html_name(), html.into_bytes()).await,
            Err(e) => warn!("⚠️ 读取页面 HTML 失败 ({:?}): {}", stage, e),
        }
    }

    async fn write(&self, filename: &str, bytes: Vec<u8>) {
        let path = self.dir.join(filename);
        match fs::write(&path, bytes).await {
            Ok(()) => debug!("📸 已保存调试文件: {}", path.display()),
            Err(e) => warn!("⚠️ 保存调试文件失败 {}: {}", path.display(), e),
        }
    }
}

/// 按扩展名返回 Content-Type
pub fn media_type(filename: &str) -> &'static str {
    if filename.ends_with(".png") {
        "image/png"
    } else {
        "text/html; charset=utf-8"
    }
}
