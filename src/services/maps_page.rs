//! Google Maps 页面操作 - 业务能力层
//!
//! 只负责"在地点页面上能做什么"：关闭 Cookie 弹窗、打开评论标签、排序、滚动、提取评论。
//! 不关心流程顺序，也不认识任务。

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::infrastructure::JsExecutor;
use crate::models::{Review, SortBy};

const PANE_SEL: &str = r#"div[role="main"] div.m6QErb.DxyBCb.kA9KIf.dS8AEf"#;
const CARD_SEL: &str = "div.jftiEf";
const COOKIE_BTN: &str = r#"button[aria-label*="Accept" i],button[jsname="hZCF7e"],button[data-mdc-dialog-action="accept"]"#;
const TAB_SEL: &str = r#"button[role="tab"], div[role="tab"]"#;
const SORT_BTN: &str = r#"button[aria-label="Sort reviews" i], button[aria-label="Sort" i]"#;
const MENU_ITEMS: &str = r#"div[role="menu"] [role="menuitem"], li[role="menuitem"]"#;

/// 预置 Cookie 的域
pub const GOOGLE_COOKIE_DOMAIN: &str = ".google.com";

/// 未配置 Cookie 时预置的同意记录，让页面跳过同意弹窗
const FALLBACK_CONSENT_COOKIES: &[(&str, &str)] = &[
    ("CONSENT", "YES+"),
    ("SOCS", "CAESEwgDEgk2MTkzMzExNTUaAmVuIAEaBgiA_LyxBg"),
];

/// 各语言中表示"评论"的关键词（小写）
const REVIEW_WORDS: &[&str] = &[
    "reviews", "review", "ratings", "rating",
    "ביקורות", "ביקורת", "דירוגים",
    "รีวิว", "บทวิจารณ์",
    "reseñas", "opiniones", "valoraciones",
    "avis", "commentaires", "évaluations",
    "bewertungen", "rezensionen",
    "recensioni", "valutazioni",
    "avaliações", "comentários",
    "отзывы", "оценки",
    "レビュー", "口コミ", "評価",
    "리뷰", "후기",
    "评论", "評論", "点评", "點評", "评价", "評價",
    "مراجعات", "تقييمات",
    "समीक्षा", "रिव्यू",
    "yorumlar", "değerlendirmeler",
    "beoordelingen", "recensies",
    "recenzje", "opinie",
    "đánh giá", "nhận xét",
    "ulasan",
    "recensioner", "omdömen",
    "anmeldelser", "vurderinger",
];

/// 页面脚本返回的原始评论卡片
#[derive(Debug, Deserialize)]
struct RawCard {
    review_id: String,
    author: String,
    rating_label: Option<String>,
    text: String,
    date_text: String,
    images: Vec<String>,
}

/// 判断标签文字是否指向评论标签
pub fn is_reviews_label(label: &str) -> bool {
    let label = label.to_lowercase();
    REVIEW_WORDS.iter().any(|word| label.contains(word))
}

/// 解析 `"name=value; name2=value2"` 形式的 Cookie 串
///
/// 没有配置或解析不出任何 Cookie 时使用默认的同意记录
pub fn consent_cookies(raw: Option<&str>) -> Vec<(String, String)> {
    let parsed: Vec<(String, String)> = raw
        .unwrap_or_default()
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .collect();

    if !parsed.is_empty() {
        return parsed;
    }
    FALLBACK_CONSENT_COOKIES
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// 从 "4 stars" / "5 estrellas" / "Rated 4,5" 这样的文字中解析评分
pub fn parse_rating(label: &str) -> Option<f32> {
    static RATING_RE: OnceLock<Regex> = OnceLock::new();
    let re = RATING_RE.get_or_init(|| Regex::new(r"(\d+(?:[.,]\d+)?)").expect("评分正则无效"));
    re.captures(label)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().replace(',', ".").parse().ok())
}

/// 地点页面
pub struct MapsPage<'a> {
    executor: &'a JsExecutor,
}

impl<'a> MapsPage<'a> {
    pub fn new(executor: &'a JsExecutor) -> Self {
        Self { executor }
    }

    /// 导航前预置 Google 同意 Cookie，返回写入数量
    pub async fn seed_consent_cookies(&self, raw: Option<&str>) -> AppResult<usize> {
        let cookies = consent_cookies(raw);
        self.executor
            .set_cookies(GOOGLE_COOKIE_DOMAIN, &cookies)
            .await?;
        debug!("已预置 {} 个 Cookie", cookies.len());
        Ok(cookies.len())
    }

    /// 关闭 Cookie 同意弹窗，返回是否找到并点击
    pub async fn dismiss_cookies(&self) -> AppResult<bool> {
        let js_code = format!(
            r#"
            (() => {{
                for (const btn of document.querySelectorAll({})) {{
                    if (btn.offsetParent !== null) {{ btn.click(); return true; }}
                }}
                return false;
            }})()
            "#,
            js_str(COOKIE_BTN)
        );
        let dismissed: bool = self.executor.eval_as(js_code).await?;
        if dismissed {
            info!("🍪 已关闭 Cookie 弹窗");
        } else {
            debug!("未检测到 Cookie 弹窗");
        }
        Ok(dismissed)
    }

    /// 打开评论标签，返回是否找到
    pub async fn open_reviews_tab(&self) -> AppResult<bool> {
        let js_code = format!(
            r#"
            Array.from(document.querySelectorAll({})).map(t =>
                [t.getAttribute('aria-label') || '', t.textContent || '', t.getAttribute('data-tab-index') || ''].join(' ')
            )
            "#,
            js_str(TAB_SEL)
        );
        let labels: Vec<String> = self.executor.eval_as(js_code).await?;

        let Some(index) = labels.iter().position(|label| is_reviews_label(label)) else {
            warn!("⚠️ 未找到评论标签（共 {} 个标签）", labels.len());
            return Ok(false);
        };

        let clicked = self.executor.click_nth(TAB_SEL, index).await?;
        if clicked {
            info!("✓ 已打开评论标签");
            sleep(Duration::from_millis(1500)).await;
        }
        Ok(clicked)
    }

    /// 设置排序方式，返回是否成功
    pub async fn set_sort(&self, sort_by: SortBy) -> AppResult<bool> {
        if !self.executor.click_nth(SORT_BTN, 0).await? {
            warn!("⚠️ 未找到排序按钮，保持默认排序");
            return Ok(false);
        }
        sleep(Duration::from_millis(800)).await;

        let js_code = format!(
            "Array.from(document.querySelectorAll({})).map(i => (i.textContent || '').trim())",
            js_str(MENU_ITEMS)
        );
        let labels: Vec<String> = self.executor.eval_as(js_code).await?;

        match sort_by.position_in(&labels) {
            Some(index) => {
                let clicked = self.executor.click_nth(MENU_ITEMS, index).await?;
                if clicked {
                    info!("✓ 排序方式: {}", sort_by);
                    sleep(Duration::from_millis(1500)).await;
                }
                Ok(clicked)
            }
            None => {
                warn!("⚠️ 排序菜单中没有 {} 对应的选项: {:?}", sort_by, labels);
                Ok(false)
            }
        }
    }

    /// 滚动评论列表一次
    pub async fn scroll_reviews(&self) -> AppResult<()> {
        let js_code = format!(
            r#"
            (() => {{
                const pane = document.querySelector({});
                if (pane) {{ pane.scrollTop = pane.scrollHeight; return true; }}
                window.scrollTo(0, document.body.scrollHeight);
                return false;
            }})()
            "#,
            js_str(PANE_SEL)
        );
        self.executor.eval(js_code).await?;
        Ok(())
    }

    /// 提取当前已加载的全部评论
    pub async fn extract_reviews(&self) -> AppResult<Vec<Review>> {
        let js_code = format!(
            r#"
            Array.from(document.querySelectorAll({})).map(c => {{
                const text = sel => {{ const el = c.querySelector(sel); return el ? (el.textContent || '').trim() : ''; }};
                const star = c.querySelector('span[role="img"]');
                const images = Array.from(c.querySelectorAll('button.Tya61d')).map(b => {{
                    const m = (b.style.backgroundImage || '').match(/url\("?(.*?)"?\)/);
                    return m ? m[1] : null;
                }}).filter(Boolean);
                return {{
                    review_id: c.getAttribute('data-review-id') || '',
                    author: text('.d4r55'),
                    rating_label: star ? star.getAttribute('aria-label') : null,
                    text: text('.wiI7pd'),
                    date_text: text('.rsqaWe'),
                    images: images,
                }};
            }})
            "#,
            js_str(CARD_SEL)
        );
        let cards: Vec<RawCard> = self.executor.eval_as(js_code).await?;

        Ok(cards
            .into_iter()
            .filter(|card| !card.review_id.is_empty())
            .map(|card| Review {
                rating: card.rating_label.as_deref().and_then(parse_rating),
                review_id: card.review_id,
                author: card.author,
                text: card.text,
                date_text: card.date_text,
                images: card.images,
                ..Default::default()
            })
            .collect())
    }
}

fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reviews_label_detection() {
        assert!(is_reviews_label("Reviews for Cafe Central"));
        assert!(is_reviews_label("Rezensionen "));
        assert!(is_reviews_label("評論"));
        assert!(!is_reviews_label("Overview"));
        assert!(!is_reviews_label("About"));
    }

    #[test]
    fn test_consent_cookies_fallback_and_parsing() {
        let fallback = consent_cookies(None);
        let names: Vec<&str> = fallback.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["CONSENT", "SOCS"]);
        assert_eq!(fallback[0].1, "YES+");
        assert_eq!(consent_cookies(Some("  ; junk")), fallback);

        let parsed = consent_cookies(Some("NID=511=abc; SOCS=xyz ;CONSENT=YES+cb"));
        assert_eq!(
            parsed,
            vec![
                ("NID".to_string(), "511=abc".to_string()),
                ("SOCS".to_string(), "xyz".to_string()),
                ("CONSENT".to_string(), "YES+cb".to_string()),
            ]
        );
        assert_eq!(GOOGLE_COOKIE_DOMAIN, ".google.com");
    }

    #[test]
    fn test_parse_rating() {
        assert_eq!(parse_rating("5 stars"), Some(5.0));
        assert_eq!(parse_rating("4,5 estrellas"), Some(4.5));
        assert_eq!(parse_rating("Rated 3.0 out of 5"), Some(3.0));
        assert_eq!(parse_rating("no rating"), None);
    }
}
