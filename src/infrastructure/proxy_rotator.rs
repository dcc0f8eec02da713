//! 代理轮换器 - 基础设施层
//!
//! 住宅代理通过端口区分出口 IP：同一账号，端口范围内每个端口对应一个出口。
//! 每个端口使用若干次后切换到下一个端口（到达上限后回到起点），
//! 并保证两次使用之间至少间隔一段时间。
//!
//! 轮换器不认识任务，只持有自己的计数器，由内部锁保护。

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::ConfigError;

/// 代理轮换配置
#[derive(Clone, Debug)]
pub struct ProxySettings {
    pub enabled: bool,
    pub host: Option<String>,
    pub port_start: u16,
    pub port_end: u16,
    pub user: Option<String>,
    pub pass: Option<String>,
    /// 每个出口 IP 的最大使用次数
    pub max_requests_per_ip: u32,
    /// 两次使用之间的最小间隔
    pub request_delay: Duration,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: None,
            port_start: 10000,
            port_end: 10999,
            user: None,
            pass: None,
            max_requests_per_ip: 15,
            request_delay: Duration::from_secs(3),
        }
    }
}

/// 一个可用的代理出口
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
}

impl ProxyEndpoint {
    /// 带凭据的代理地址
    pub fn url(&self) -> String {
        format!("http://{}:{}@{}:{}", self.user, self.pass, self.host, self.port)
    }

    /// 不带凭据的代理地址（用于浏览器启动参数）
    pub fn server(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl std::fmt::Debug for ProxyEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("pass", &"***")
            .finish()
    }
}

/// 账号信息，启用代理时全部存在
#[derive(Debug)]
struct Credentials {
    host: String,
    user: String,
    pass: String,
}

#[derive(Debug)]
struct RotationState {
    current_port: u16,
    requests_on_current_ip: u32,
    /// `None` 表示尚未使用过（相当于纪元时间）
    last_request: Option<Instant>,
}

/// 代理轮换器
#[derive(Debug)]
pub struct ProxyRotator {
    credentials: Option<Credentials>,
    port_start: u16,
    port_end: u16,
    max_requests_per_ip: u32,
    request_delay: Duration,
    state: Mutex<RotationState>,
}

impl ProxyRotator {
    /// 创建轮换器
    ///
    /// 启用代理但缺少 host/user/pass，或端口范围倒置时返回配置错误
    pub fn new(settings: &ProxySettings) -> Result<Self, ConfigError> {
        if settings.port_start > settings.port_end {
            return Err(ConfigError::InvalidPortRange {
                start: settings.port_start,
                end: settings.port_end,
            });
        }

        let credentials = if settings.enabled {
            let mut missing = Vec::new();
            if settings.host.is_none() {
                missing.push("PROXY_HOST");
            }
            if settings.user.is_none() {
                missing.push("PROXY_USER");
            }
            if settings.pass.is_none() {
                missing.push("PROXY_PASS");
            }
            match (&settings.host, &settings.user, &settings.pass) {
                (Some(host), Some(user), Some(pass)) => Some(Credentials {
                    host: host.clone(),
                    user: user.clone(),
                    pass: pass.clone(),
                }),
                _ => return Err(ConfigError::ProxyCredentialsMissing { missing }),
            }
        } else {
            None
        };

        if credentials.is_some() && settings.max_requests_per_ip == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_REQUESTS_PER_IP",
                reason: "必须大于 0".to_string(),
            });
        }

        if let Some(creds) = &credentials {
            info!(
                "🔄 代理轮换已启用: {}, 端口 {}-{}, 每个 IP 最多 {} 次请求",
                creds.host, settings.port_start, settings.port_end, settings.max_requests_per_ip
            );
        }

        Ok(Self {
            credentials,
            port_start: settings.port_start,
            port_end: settings.port_end,
            max_requests_per_ip: settings.max_requests_per_ip,
            request_delay: settings.request_delay,
            state: Mutex::new(RotationState {
                current_port: settings.port_start,
                requests_on_current_ip: 0,
                last_request: None,
            }),
        })
    }

    /// 不使用代理的轮换器
    pub fn disabled() -> Self {
        Self {
            credentials: None,
            port_start: 0,
            port_end: 0,
            max_requests_per_ip: 0,
            request_delay: Duration::ZERO,
            state: Mutex::new(RotationState {
                current_port: 0,
                requests_on_current_ip: 0,
                last_request: None,
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    /// 获取本次请求使用的代理出口
    ///
    /// 当前端口达到使用上限时先切换到下一个端口。未启用代理时返回 `None`，没有副作用
    pub fn issue(&self) -> Option<ProxyEndpoint> {
        let creds = self.credentials.as_ref()?;

        let mut state = self.lock_state();
        if state.requests_on_current_ip >= self.max_requests_per_ip {
            let old_port = state.current_port;
            state.current_port = if state.current_port >= self.port_end {
                self.port_start
            } else {
                state.current_port + 1
            };
            state.requests_on_current_ip = 0;
            info!("🔄 IP 已轮换: 端口 {} → {}（达到请求上限）", old_port, state.current_port);
        }
        state.requests_on_current_ip += 1;

        debug!(
            "📡 代理: 端口 {}, 请求 {}/{}",
            state.current_port, state.requests_on_current_ip, self.max_requests_per_ip
        );

        Some(ProxyEndpoint {
            host: creds.host.clone(),
            port: state.current_port,
            user: creds.user.clone(),
            pass: creds.pass.clone(),
        })
    }

    /// 保证两次使用之间的最小间隔
    ///
    /// 距上次调用不足间隔时阻塞当前线程补足剩余时间；无论是否等待，
    /// 上次使用时间都会记为本次返回的时刻。
    /// 返回时刻在锁内预先占定，睡眠时不持锁，并发调用方各自排到下一个间隔。
    pub fn throttle(&self) {
        if !self.is_enabled() {
            return;
        }

        let wait = {
            let mut state = self.lock_state();
            let now = Instant::now();
            let wait = match state.last_request {
                Some(last) => (last + self.request_delay).saturating_duration_since(now),
                None => Duration::ZERO,
            };
            state.last_request = Some(now + wait);
            wait
        };

        if !wait.is_zero() {
            debug!("⏳ 请求间隔等待 {:.1}s...", wait.as_secs_f64());
            std::thread::sleep(wait);
        }
    }

    /// 恢复初始状态
    pub fn reset(&self) {
        let mut state = self.lock_state();
        state.current_port = self.port_start;
        state.requests_on_current_ip = 0;
        state.last_request = None;
        info!("🔄 代理轮换器已重置");
    }

    /// 当前端口与已使用次数
    pub fn snapshot(&self) -> (u16, u32) {
        let state = self.lock_state();
        (state.current_port, state.requests_on_current_ip)
    }

    // 计数器的每次修改都在一个代码块内完成，中毒的锁仍然一致
    fn lock_state(&self) -> MutexGuard<'_, RotationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
