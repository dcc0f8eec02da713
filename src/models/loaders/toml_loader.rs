use crate::error::{AppResult, ConfigError};
use crate::models::scrape_config::ScrapeConfig;
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载默认抓取配置
///
/// 文件不存在时使用内置默认值；无法确认文件是否存在、读取失败或无法解析时返回配置错误
pub async fn load_scrape_config(path: &Path) -> AppResult<ScrapeConfig> {
    let read_failed = |source| ConfigError::FileReadFailed {
        path: path.display().to_string(),
        source,
    };

    match fs::try_exists(path).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::info!("未找到配置文件 {}，使用默认抓取配置", path.display());
            return Ok(ScrapeConfig::default());
        }
        Err(source) => return Err(read_failed(source).into()),
    }

    let content = fs::read_to_string(path).await.map_err(read_failed)?;

    let config = parse_scrape_config(&content).map_err(|source| ConfigError::TomlParseFailed {
        path: path.display().to_string(),
        source,
    })?;

    tracing::info!("已加载抓取配置: {}", path.display());
    Ok(config)
}

/// 解析 TOML 内容，缺失的字段取默认值
pub fn parse_scrape_config(content: &str) -> Result<ScrapeConfig, toml::de::Error> {
    toml::from_str(content)
}
