//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"导航"、"执行 JS"和"页面快照"的能力

use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::{AppError, AppResult, BrowserError};

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 暴露 navigate() / eval() / screenshot() 能力
/// - 不认识 Job / Review
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 导航到指定地址，超过 `timeout` 视为失败
    pub async fn navigate(&self, url: &str, timeout: Duration) -> AppResult<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(AppError::navigation_failed(url, e)),
            Err(_) => Err(AppError::Browser(BrowserError::NavigationTimeout {
                url: url.to_string(),
                secs: timeout.as_secs(),
            })),
        }
    }

    /// 在导航前写入 Cookie，所有 Cookie 使用同一个域和根路径
    pub async fn set_cookies(&self, domain: &str, cookies: &[(String, String)]) -> AppResult<()> {
        let params = cookies
            .iter()
            .map(|(name, value)| {
                let mut cookie = CookieParam::new(name.clone(), value.clone());
                cookie.domain = Some(domain.to_string());
                cookie.path = Some("/".to_string());
                cookie
            })
            .collect::<Vec<_>>();
        self.page.set_cookies(params).await?;
        Ok(())
    }

    /// 整页截图（PNG）
    pub async fn screenshot(&self) -> AppResult<Vec<u8>> {
        let params = ScreenshotParams::builder().full_page(true).build();
        Ok(self.page.screenshot(params).await?)
    }

    /// 当前页面的 HTML
    pub async fn content(&self) -> AppResult<String> {
        Ok(self.page.content().await?)
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        result.into_value().map_err(|e| {
            AppError::Browser(BrowserError::ScriptExecutionFailed {
                source: Box::new(e),
            })
        })
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> AppResult<T> {
        let json_value = self.eval(js_code).await?;
        serde_json::from_value(json_value).map_err(|e| {
            AppError::Browser(BrowserError::ScriptExecutionFailed {
                source: Box::new(e),
            })
        })
    }

    /// 点击匹配选择器的第 `index` 个元素，返回是否点击成功
    pub async fn click_nth(&self, selector: &str, index: usize) -> AppResult<bool> {
        let js_code = format!(
            r#"
            (() => {{
                const items = document.querySelectorAll({});
                const el = items[{}];
                if (!el) return false;
                el.click();
                return true;
            }})()
            "#,
            serde_json::to_string(selector).unwrap_or_default(),
            index
        );
        self.eval_as(js_code).await
    }
}
