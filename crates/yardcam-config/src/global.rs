use serde::{Deserialize, Serialize};
use yardcam_device::{GroupDefaults, RetryPolicy};
use yardcam_logging::LoggingConfig;

/// 全局配置
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct YardcamConfig {
    pub system: SystemConfig,
    pub database: DatabaseConfig,
    /// 默认分组 ID
    pub groups: GroupDefaults,
    /// 存储访问的重试策略
    pub retry: RetryPolicy,
    pub logging: LoggingConfig,
}

/// 系统配置
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SystemConfig {
    pub name: String,
    pub version: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: "Yardcam".to_string(),
            version: "0.1.0".to_string(),
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 连接串，如 `sqlite://yardcam.db?mode=rwc` 或 `postgres://...`
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
        }
    }
}
