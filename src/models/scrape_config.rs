//! 抓取配置
//!
//! `ScrapeConfig` 是一次运行的完整有效配置；`ConfigOverrides` 是调用方提交的覆盖项。
//! 任务创建时两者合并成不可变快照，之后默认配置的变化不会影响已创建的任务。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::sort::SortBy;

/// 单次抓取的有效配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// 目标地址（Google Maps 地点链接）
    pub url: String,
    /// 是否以无头模式运行浏览器
    pub headless: bool,
    /// 评论排序方式
    pub sort_by: SortBy,
    /// 遇到第一条已存储的评论时停止
    pub stop_on_match: bool,
    /// 覆盖已存在的评论，而不是合并
    pub overwrite_existing: bool,
    /// 保留评论中的图片地址
    pub download_images: bool,
    /// 最多抓取的评论数量
    pub max_reviews: Option<usize>,
    /// 连续多少次滚动没有新评论后停止
    pub scroll_idle_limit: u32,
    /// 页面加载超时（秒）
    pub page_load_timeout_secs: u64,
    /// 评论输出文件
    pub json_path: String,
    /// 附加到每条评论上的自定义字段
    pub custom_params: Map<String, JsonValue>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            headless: true,
            sort_by: SortBy::Relevance,
            stop_on_match: false,
            overwrite_existing: false,
            download_images: false,
            max_reviews: None,
            scroll_idle_limit: 5,
            page_load_timeout_secs: 30,
            json_path: "reviews.json".to_string(),
            custom_params: Map::new(),
        }
    }
}

/// 调用方提交的配置覆盖项
///
/// `None`（以及空字符串）表示沿用默认值，而不是清空
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    pub headless: Option<bool>,
    pub sort_by: Option<SortBy>,
    pub stop_on_match: Option<bool>,
    pub overwrite_existing: Option<bool>,
    pub download_images: Option<bool>,
    pub max_reviews: Option<usize>,
    pub scroll_idle_limit: Option<u32>,
    pub page_load_timeout_secs: Option<u64>,
    pub json_path: Option<String>,
    pub custom_params: Option<Map<String, JsonValue>>,
}

impl ScrapeConfig {
    /// 以当前配置为默认值，合并覆盖项并设置目标地址
    pub fn merged(&self, url: &str, overrides: &ConfigOverrides) -> ScrapeConfig {
        let mut config = self.clone();
        config.url = url.to_string();

        if let Some(v) = overrides.headless {
            config.headless = v;
        }
        if let Some(v) = overrides.sort_by {
            config.sort_by = v;
        }
        if let Some(v) = overrides.stop_on_match {
            config.stop_on_match = v;
        }
        if let Some(v) = overrides.overwrite_existing {
            config.overwrite_existing = v;
        }
        if let Some(v) = overrides.download_images {
            config.download_images = v;
        }
        if let Some(v) = overrides.max_reviews {
            config.max_reviews = Some(v);
        }
        if let Some(v) = overrides.scroll_idle_limit {
            config.scroll_idle_limit = v;
        }
        if let Some(v) = overrides.page_load_timeout_secs {
            config.page_load_timeout_secs = v;
        }
        if let Some(path) = overrides.json_path.as_deref().filter(|p| !p.trim().is_empty()) {
            config.json_path = path.to_string();
        }
        if let Some(params) = &overrides.custom_params {
            for (key, value) in params {
                config.custom_params.insert(key.clone(), value.clone());
            }
        }

        config
    }
}
