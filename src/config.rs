use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::infrastructure::ProxySettings;
use crate::orchestrator::JobManagerConfig;
use crate::workflow::FlowOptions;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// HTTP 监听地址
    pub host: String,
    /// HTTP 监听端口
    pub port: u16,
    /// 同时运行的任务数量上限（同时也是工作池大小）
    pub max_concurrent_jobs: usize,
    /// 单个任务的最长运行时间（秒）
    pub job_timeout_secs: u64,
    /// 自动清理的间隔（秒）
    pub cleanup_interval_secs: u64,
    /// 已结束任务的保留时长（小时）
    pub job_retention_hours: u32,
    /// 抓取默认配置文件（TOML）
    pub scrape_config_file: String,
    /// Chrome 可执行文件路径，容器内运行时使用
    pub chrome_executable: Option<String>,
    /// 调试截图和页面 HTML 的保存目录
    pub debug_dir: PathBuf,
    /// 预置的 Google Cookie（`name=value; ...`）
    pub google_cookies: Option<String>,
    // --- 代理轮换配置 ---
    pub proxy: ProxySettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_concurrent_jobs: 3,
            job_timeout_secs: 1800,
            cleanup_interval_secs: 3600,
            job_retention_hours: 24,
            scrape_config_file: "config.toml".to_string(),
            chrome_executable: None,
            debug_dir: std::env::temp_dir(),
            google_cookies: None,
            proxy: ProxySettings::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        let proxy = ProxySettings {
            enabled: std::env::var("USE_PROXY").map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(default.proxy.enabled),
            host: non_empty_var("PROXY_HOST"),
            port_start: parse_var("PROXY_PORT_START").unwrap_or(default.proxy.port_start),
            port_end: parse_var("PROXY_PORT_END").unwrap_or(default.proxy.port_end),
            user: non_empty_var("PROXY_USER"),
            pass: non_empty_var("PROXY_PASS"),
            max_requests_per_ip: parse_var("MAX_REQUESTS_PER_IP").unwrap_or(default.proxy.max_requests_per_ip),
            request_delay: parse_var::<f64>("PROXY_REQUEST_DELAY")
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64)
                .unwrap_or(default.proxy.request_delay),
        };

        Self {
            host: std::env::var("HOST").unwrap_or(default.host),
            port: parse_var("PORT").unwrap_or(default.port),
            max_concurrent_jobs: parse_var("MAX_CONCURRENT_JOBS").unwrap_or(default.max_concurrent_jobs),
            job_timeout_secs: parse_var("JOB_TIMEOUT_SECS").unwrap_or(default.job_timeout_secs),
            cleanup_interval_secs: parse_var("CLEANUP_INTERVAL_SECS").unwrap_or(default.cleanup_interval_secs),
            job_retention_hours: parse_var("JOB_RETENTION_HOURS").unwrap_or(default.job_retention_hours),
            scrape_config_file: std::env::var("SCRAPER_CONFIG").unwrap_or(default.scrape_config_file),
            chrome_executable: non_empty_var("CHROME_BIN"),
            debug_dir: non_empty_var("DEBUG_DIR").map(PathBuf::from).unwrap_or(default.debug_dir),
            google_cookies: non_empty_var("GOOGLE_COOKIES"),
            proxy,
        }
    }

    /// 任务管理器配置
    pub fn job_manager(&self) -> JobManagerConfig {
        JobManagerConfig {
            max_concurrent_jobs: self.max_concurrent_jobs,
            job_timeout: Duration::from_secs(self.job_timeout_secs),
        }
    }

    /// 浏览器流程选项
    pub fn flow_options(&self) -> FlowOptions {
        FlowOptions {
            chrome_executable: self.chrome_executable.clone(),
            google_cookies: self.google_cookies.clone(),
            debug_dir: self.debug_dir.clone(),
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn job_retention(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.job_retention_hours))
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.max_concurrent_jobs, 3);
        assert_eq!(config.job_timeout_secs, 1800);
        assert_eq!(config.cleanup_interval(), Duration::from_secs(3600));
        assert_eq!(config.job_retention(), chrono::Duration::hours(24));
        assert!(!config.proxy.enabled);
        assert_eq!(config.proxy.port_start, 10000);
        assert_eq!(config.proxy.port_end, 10999);
        assert_eq!(config.proxy.max_requests_per_ip, 15);
        assert_eq!(config.proxy.request_delay, Duration::from_secs(3));
        assert_eq!(config.debug_dir, std::env::temp_dir());
        assert!(config.google_cookies.is_none());
    }

    #[test]
    fn test_flow_options_follow_settings() {
        let config = Config {
            chrome_executable: Some("/usr/bin/chromium".to_string()),
            debug_dir: PathBuf::from("/srv/debug"),
            google_cookies: Some("CONSENT=YES+".to_string()),
            ..Config::default()
        };
        let options = config.flow_options();
        assert_eq!(options.chrome_executable.as_deref(), Some("/usr/bin/chromium"));
        assert_eq!(options.debug_dir, PathBuf::from("/srv/debug"));
        assert_eq!(options.google_cookies.as_deref(), Some("CONSENT=YES+"));
    }

    #[test]
    fn test_job_manager_config_follows_settings() {
        let config = Config {
            max_concurrent_jobs: 5,
            job_timeout_secs: 60,
            ..Config::default()
        };
        let jm = config.job_manager();
        assert_eq!(jm.max_concurrent_jobs, 5);
        assert_eq!(jm.job_timeout, Duration::from_secs(60));
    }
}
