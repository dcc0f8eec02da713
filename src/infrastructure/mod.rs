//! 基础设施层：持有稀缺资源（代理出口、浏览器页面），只暴露能力

pub mod js_executor;
pub mod proxy_rotator;

pub use js_executor::JsExecutor;
pub use proxy_rotator::{ProxyEndpoint, ProxyRotator, ProxySettings};
