use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// 从页面上提取的单条评论
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Review {
    pub review_id: String,
    pub author: String,
    pub rating: Option<f32>,
    pub text: String,
    pub date_text: String,
    pub images: Vec<String>,
    /// 任务配置中的自定义字段
    #[serde(flatten)]
    pub custom: Map<String, JsonValue>,
}
