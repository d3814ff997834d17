//! # **tally** 配置
//!
//! 配置文件为 JSON，路径取自环境变量 `TALLY_CONFIG`，缺省为 `config.json`。
//! 形如 `TALLY__COUNTER__TOP_N` 的环境变量覆盖文件中的同名配置。
//! 配置缺失或无效时记录日志并回退到默认值，从不中止启动。

use crate::{errors::ConfigError, extractor::DEFAULT_FIELD};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, de::DeserializeOwned};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{error, warn};
use validator::Validate;

/// 配置文件路径环境变量
pub const CONFIG_ENV: &str = "TALLY_CONFIG";
/// 缺省配置文件
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// 配置文件路径
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// 构建配置源：可选的 JSON 文件，叠加 `TALLY` 前缀的环境变量
pub fn build_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).format(FileFormat::Json).required(true));
    }
    let config = builder
        .add_source(
            Environment::with_prefix("TALLY")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("kafka.bootstrap_servers")
                .try_parsing(true),
        )
        .build()?;
    Ok(config)
}

/// 加载并验证配置
pub fn load<T>(path: Option<&Path>) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Validate,
{
    let settings: T = build_config(path)?.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

/// 加载配置，失败时回退到默认值
pub fn load_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Validate + Default,
{
    if !path.exists() {
        warn!("配置文件{}不存在，使用默认配置", path.display());
        return fallback();
    }
    match load(Some(path)) {
        Ok(settings) => settings,
        Err(e) => {
            error!("配置文件{}格式错误，使用默认配置：{e}", path.display());
            fallback()
        }
    }
}

fn fallback<T>() -> T
where
    T: DeserializeOwned + Validate + Default,
{
    match load(None) {
        Ok(settings) => settings,
        Err(e) => {
            error!("环境变量配置无效，忽略：{e}");
            T::default()
        }
    }
}

/// 计数重置策略
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// 累计计数，从不重置
    #[default]
    Never,
    /// 每次报告后清空
    OnReport,
}

/// 计数器配置
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct CounterConfig {
    /// 分组字段
    #[validate(length(min = 1))]
    pub field: String,
    /// 报告名次
    #[validate(range(min = 1))]
    pub top_n: usize,
    /// 报告间隔，秒
    #[validate(range(min = 1))]
    pub report_interval: u64,
    /// 单次报告期限，毫秒
    #[validate(range(min = 1))]
    pub report_deadline_ms: u64,
    /// 拉取等待上限，毫秒
    #[validate(range(min = 10))]
    pub poll_timeout_ms: u64,
    /// 拉取失败重试次数
    #[validate(range(min = 1))]
    pub max_attempts: u32,
    /// 首次重试等待，毫秒
    pub backoff_ms: u64,
    /// 重试等待上限，毫秒
    pub max_backoff_ms: u64,
    /// 重置策略
    pub reset: ResetPolicy,
    /// 去重键数上限
    #[validate(range(min = 1))]
    pub max_keys: Option<usize>,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            field: DEFAULT_FIELD.to_owned(),
            top_n: 10,
            report_interval: 60,
            report_deadline_ms: 5_000,
            poll_timeout_ms: 1_000,
            max_attempts: 5,
            backoff_ms: 500,
            max_backoff_ms: 10_000,
            reset: ResetPolicy::Never,
            max_keys: None,
        }
    }
}

/// 计数器运行参数
#[derive(Debug, Clone)]
pub struct Options {
    /// 分组字段
    pub field: String,
    /// 报告名次
    pub top_n: usize,
    /// 报告间隔
    pub report_interval: Duration,
    /// 单次报告期限
    pub report_deadline: Duration,
    /// 拉取等待上限
    pub poll_timeout: Duration,
    /// 拉取失败重试次数
    pub max_attempts: u32,
    /// 首次重试等待
    pub backoff: Duration,
    /// 重试等待上限
    pub max_backoff: Duration,
    /// 重置策略
    pub reset: ResetPolicy,
    /// 去重键数上限
    pub max_keys: Option<usize>,
}

impl From<&CounterConfig> for Options {
    fn from(cfg: &CounterConfig) -> Self {
        Self {
            field: cfg.field.clone(),
            top_n: cfg.top_n,
            report_interval: Duration::from_secs(cfg.report_interval),
            report_deadline: Duration::from_millis(cfg.report_deadline_ms),
            poll_timeout: Duration::from_millis(cfg.poll_timeout_ms),
            max_attempts: cfg.max_attempts,
            backoff: Duration::from_millis(cfg.backoff_ms),
            max_backoff: Duration::from_millis(cfg.max_backoff_ms),
            reset: cfg.reset,
            max_keys: cfg.max_keys,
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::from(&CounterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = CounterConfig::default();
        assert!(cfg.validate().is_ok());
        let options = Options::from(&cfg);
        assert_eq!(options.field, "table");
        assert_eq!(options.top_n, 10);
        assert_eq!(options.report_interval, Duration::from_secs(60));
        assert_eq!(options.poll_timeout, Duration::from_secs(1));
        assert_eq!(options.reset, ResetPolicy::Never);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let cfg = CounterConfig {
            top_n: 0,
            ..CounterConfig::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = CounterConfig {
            poll_timeout_ms: 1,
            ..CounterConfig::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = CounterConfig {
            max_keys: Some(0),
            ..CounterConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
