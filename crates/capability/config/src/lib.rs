//! 采集服务运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 采集服务运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    /// 未配置时使用内存存储
    pub database_url: Option<String>,
    pub idle_timeout_seconds: u64,
    pub reaper_interval_seconds: u64,
    pub ring_buffer_size: usize,
    /// 未配置时不自动裁剪原始采样
    pub retention_days: Option<u32>,
    pub retention_interval_seconds: u64,
    pub connect_timeout_ms: u64,
    pub io_timeout_ms: u64,
    pub offline_after_failures: u32,
    /// 启动时加载的轮询注册列表（JSON）
    pub bootstrap_file: Option<String>,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr = env::var("EMS_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let database_url = read_optional("EMS_DATABASE_URL");
        let idle_timeout_seconds = read_positive_u64("EMS_IDLE_TIMEOUT_SECONDS", 300)?;
        let reaper_interval_seconds = read_positive_u64("EMS_REAPER_INTERVAL_SECONDS", 60)?;
        let ring_buffer_size = read_positive_u64("EMS_RING_BUFFER_SIZE", 20)? as usize;
        let retention_days = read_optional_u64("EMS_RETENTION_DAYS")?
            .filter(|value| *value > 0)
            .map(|value| {
                u32::try_from(value).map_err(|_| {
                    ConfigError::Invalid("EMS_RETENTION_DAYS".to_string(), value.to_string())
                })
            })
            .transpose()?;
        let retention_interval_seconds =
            read_positive_u64("EMS_RETENTION_INTERVAL_SECONDS", 3600)?;
        let connect_timeout_ms = read_positive_u64("EMS_CONNECT_TIMEOUT_MS", 3000)?;
        let io_timeout_ms = read_positive_u64("EMS_IO_TIMEOUT_MS", 3000)?;
        let offline_after_failures = read_u32_with_default("EMS_OFFLINE_AFTER_FAILURES", 3)?;
        let bootstrap_file = read_optional("EMS_BOOTSTRAP_FILE");

        Ok(Self {
            http_addr,
            database_url,
            idle_timeout_seconds,
            reaper_interval_seconds,
            ring_buffer_size,
            retention_days,
            retention_interval_seconds,
            connect_timeout_ms,
            io_timeout_ms,
            offline_after_failures,
            bootstrap_file,
        })
    }
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

/// 周期、超时类配置不允许为 0。
fn read_positive_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    match read_u64_with_default(key, default)? {
        0 => Err(ConfigError::Invalid(key.to_string(), "0".to_string())),
        value => Ok(value),
    }
}

fn read_u32_with_default(key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_optional_u64(key: &str) -> Result<Option<u64>, ConfigError> {
    match env::var(key) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(key.to_string(), value)),
        Err(_) => Ok(None),
    }
}
