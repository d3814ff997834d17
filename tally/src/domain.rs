//! # **tally** 特征

use crate::errors::FetchError;
use std::{fmt, future::Future, time::Duration};

/// 从数据源取得的一条消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 主题
    pub topic: String,
    /// 分区
    pub partition: i32,
    /// 偏移量
    pub offset: i64,
    /// 消息时间戳，毫秒
    pub timestamp: Option<i64>,
    /// 消息体
    pub payload: Option<Vec<u8>>,
}

/// 计数器生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// 尚未启动
    Idle,
    /// 正在消费
    Running,
    /// 停止拉取，释放资源中
    Draining,
    /// 已停止，终态
    Stopped,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Idle => "空闲",
            State::Running => "运行",
            State::Draining => "排空",
            State::Stopped => "停止",
        };
        f.write_str(name)
    }
}

/// 数据源特征
pub trait Source: Send + 'static {
    /// 建立连接并订阅
    fn open(&mut self) -> Result<(), FetchError>;

    /// 拉取下一条消息，最多等待 `wait`，超时返回 `Ok(None)`
    fn fetch(
        &mut self,
        wait: Duration,
    ) -> impl Future<Output = Result<Option<Record>, FetchError>> + Send;

    /// 消息处理完毕
    fn ack(&mut self, _record: &Record) {}

    /// 提交未决偏移量并关闭连接，耗时应有上限
    fn close(&mut self) -> impl Future<Output = Result<(), FetchError>> + Send;
}
