use std::time::Duration;

/// 服务器配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | LISTEN_ADDR | 0.0.0.0:8090 | 实时通道监听地址 |
/// | CLEANUP_INTERVAL_SECS | 60 | 生命周期清理周期(秒) |
/// | CONFIG_CACHE_TTL_SECS | 60 | 租户协议配置缓存 TTL(秒) |
/// | HEARTBEAT_SWEEP_SECS | 30 | 心跳巡检周期(秒) |
/// | HEARTBEAT_TIMEOUT_SECS | 45 | 心跳超时(秒) |
/// | ENVIRONMENT | development | 运行环境 |
///
/// # 示例
///
/// ```ignore
/// LISTEN_ADDR=0.0.0.0:9000 CLEANUP_INTERVAL_SECS=30 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 实时通道监听地址
    pub listen_addr: String,
    /// 清理引擎运行周期
    pub cleanup_interval: Duration,
    /// 租户协议配置缓存 TTL
    pub config_cache_ttl: Duration,
    /// 心跳巡检周期
    pub heartbeat_sweep: Duration,
    /// 心跳超时
    pub heartbeat_timeout: Duration,
    /// 运行环境: development | staging | production
    pub environment: String,
}

fn env_secs(key: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default),
    )
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8090".into()),
            cleanup_interval: env_secs("CLEANUP_INTERVAL_SECS", 60),
            config_cache_ttl: env_secs("CONFIG_CACHE_TTL_SECS", 60),
            heartbeat_sweep: env_secs("HEARTBEAT_SWEEP_SECS", 30),
            heartbeat_timeout: env_secs("HEARTBEAT_TIMEOUT_SECS", 45),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        // 默认值在未设置变量时生效
        let config = Config::from_env();
        assert!(!config.listen_addr.is_empty());
        assert!(config.heartbeat_timeout > config.heartbeat_sweep);
    }
}
