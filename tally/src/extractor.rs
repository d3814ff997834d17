//! 分组键提取

use crate::errors::ExtractError;
use serde_json::Value;
use tracing::debug;

/// 分组键，按字符串精确匹配
pub type Key = String;

/// 默认分组字段
pub const DEFAULT_FIELD: &str = "table";

/// 从 JSON 消息体中提取指定字段作为分组键
#[derive(Debug, Clone)]
pub struct Extractor {
    field: String,
}

impl Extractor {
    /// 构造函数
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// 分组字段名
    pub fn field(&self) -> &str {
        &self.field
    }

    /// 提取分组键
    ///
    /// 仅非空字符串视为有效键；`null`、数字、布尔、数组、对象和空串均为无效键。
    pub fn extract(&self, raw: &[u8]) -> Result<Key, ExtractError> {
        let Value::Object(mut record) = serde_json::from_slice::<Value>(raw)? else {
            return Err(ExtractError::NotObject);
        };
        match record.remove(&self.field) {
            Some(Value::String(key)) if !key.is_empty() => Ok(key),
            Some(_) => Err(ExtractError::InvalidKey(self.field.clone())),
            None => Err(ExtractError::MissingField(self.field.clone())),
        }
    }

    /// 提取分组键，失败时记录调试日志并返回 `None`
    pub fn key(&self, raw: &[u8]) -> Option<Key> {
        match self.extract(raw) {
            Ok(key) => Some(key),
            Err(e) => {
                debug!("未能提取分组键：{e}");
                None
            }
        }
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(DEFAULT_FIELD)
    }
}
