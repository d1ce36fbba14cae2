use anyhow::{anyhow, Result};
use config::{Config, File, FileFormat};
use std::path::{Path, PathBuf};

use crate::YardcamConfig;

/// 配置文件名
pub const CONFIG_FILE: &str = "yardcam.toml";

/// 配置加载器
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// 创建配置加载器
    pub fn new<P: AsRef<Path>>(config_dir: P) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
        }
    }

    /// 加载配置
    ///
    /// 配置文件不存在时返回默认配置，未出现的字段取默认值
    pub fn load(&self) -> Result<YardcamConfig> {
        let config_path = self.config_dir.join(CONFIG_FILE);

        if !config_path.exists() {
            return Ok(YardcamConfig::default());
        }

        let config = Config::builder()
            .add_source(File::new(
                config_path.to_str().ok_or_else(|| anyhow!("Invalid config path"))?,
                FileFormat::Toml,
            ))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// 加载并验证配置
    pub fn load_validated(&self) -> Result<YardcamConfig> {
        let config = self.load()?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// 验证配置
    pub fn validate(config: &YardcamConfig) -> Result<()> {
        let groups = &config.groups;
        for (name, value) in [
            ("groups.device_group", &groups.device_group),
            ("groups.command_queue", &groups.command_queue),
            ("groups.incident_log", &groups.incident_log),
        ] {
            if value.is_empty() {
                return Err(anyhow!("{} cannot be empty", name));
            }
        }

        if config.database.url.is_empty() {
            return Err(anyhow!("database.url cannot be empty"));
        }

        if config.retry.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be greater than 0"));
        }

        let multiplier = config.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(anyhow!(
                "retry.backoff_multiplier ({}) must be a finite number of at least 1.0",
                multiplier
            ));
        }

        Ok(())
    }
}
