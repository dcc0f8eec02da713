//! 日志初始化
//!
//! 日志级别通过 `RUST_LOG` 控制，默认 `info`

use tracing_subscriber::EnvFilter;

/// 初始化全局日志订阅者
///
/// 重复调用不会报错（测试中多次初始化时只有第一次生效）
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
