//! # **tally** 错误定义

use thiserror::Error;

/// 字段提取错误
#[derive(Debug, Error)]
pub enum ExtractError {
    /// 消息体不是合法 JSON
    #[error("消息体解码失败：{0}")]
    Decode(#[from] serde_json::Error),
    /// 消息体不是 JSON 对象
    #[error("消息体不是 JSON 对象")]
    NotObject,
    /// 缺少目标字段
    #[error("缺少字段'{0}'")]
    MissingField(String),
    /// 字段值不是非空字符串
    #[error("字段'{0}'的值不是非空字符串")]
    InvalidKey(String),
}

impl ExtractError {
    /// 消息体本身无法解析
    pub fn is_malformed(&self) -> bool {
        matches!(self, ExtractError::Decode(_) | ExtractError::NotObject)
    }
}

/// 数据源错误
#[derive(Debug, Error)]
pub enum FetchError {
    /// 暂时性错误，可重试
    #[error("暂时性错误：{0}")]
    Transient(String),
    /// 致命错误，不再重试
    #[error("致命错误：{0}")]
    Fatal(String),
}

/// 报告输出错误
#[derive(Debug, Error)]
pub enum SinkError {
    /// 写入失败
    #[error("写入报告失败")]
    Io(#[from] std::io::Error),
    /// 格式化失败
    #[error("格式化报告失败")]
    Format(#[from] std::fmt::Error),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置源加载或反序列化失败
    #[error("加载配置失败：{0}")]
    Load(#[from] config::ConfigError),
    /// 配置值验证失败
    #[error("配置验证失败：{0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// 计数器运行错误
#[derive(Debug, Error)]
pub enum CounterError {
    /// 打开数据源失败
    #[error("打开数据源失败：{0}")]
    Open(#[source] FetchError),
    /// 重试次数耗尽
    #[error("重试{attempts}次后仍无法拉取消息：{source}")]
    RetriesExhausted {
        /// 已重试次数
        attempts: u32,
        /// 最后一次错误
        source: FetchError,
    },
    /// 数据源致命错误
    #[error("拉取消息失败：{0}")]
    Fatal(#[source] FetchError),
    /// 关闭数据源失败
    #[error("关闭数据源失败：{0}")]
    Close(#[source] FetchError),
}
