//! Kafka 数据源配置

use rdkafka::ClientConfig;
use serde::Deserialize;
use std::collections::HashMap;
use tally::config::{CounterConfig, config_path, load_or_default};
use tokio::time::Duration;
use tracing::info;
use validator::Validate;

/// 无已提交偏移量时的起始位置
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetReset {
    /// 从最早的消息开始
    #[default]
    Earliest,
    /// 只消费新消息
    Latest,
}

impl OffsetReset {
    /// librdkafka `auto.offset.reset` 取值
    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetReset::Earliest => "earliest",
            OffsetReset::Latest => "latest",
        }
    }
}

/// `kafka` 配置节
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct KafkaConfig {
    /// broker 地址列表，`host:port`
    #[validate(length(min = 1))]
    pub bootstrap_servers: Vec<String>,
    /// 订阅的主题
    #[validate(length(min = 1))]
    pub topic: String,
    /// 消费者组
    #[validate(length(min = 1))]
    pub group_id: String,
    /// 无已提交偏移量时的起始位置
    pub offset_reset: OffsetReset,
    /// 是否由 librdkafka 自动提交偏移量
    pub auto_commit: bool,
    /// 会话超时，秒
    #[validate(range(min = 1))]
    pub session_timeout: u64,
    /// 手动提交时每累计多少条消息提交一次
    #[validate(range(min = 1))]
    pub commit_batch: usize,
    /// 手动提交的最长间隔，毫秒
    pub commit_interval_ms: u64,
    /// 关闭消费者的最长等待，毫秒
    #[validate(range(min = 1))]
    pub close_timeout_ms: u64,
    /// 透传给 librdkafka 的其他配置
    pub settings: HashMap<String, String>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: vec!["localhost:9092".to_owned()],
            topic: "your_kafka_topic".to_owned(),
            group_id: "table_counter_group".to_owned(),
            offset_reset: OffsetReset::Earliest,
            auto_commit: true,
            session_timeout: 45,
            commit_batch: 1000,
            commit_interval_ms: 5000,
            close_timeout_ms: 5000,
            settings: HashMap::new(),
        }
    }
}

impl KafkaConfig {
    /// 手动提交的最长间隔
    pub fn commit_interval(&self) -> Duration {
        Duration::from_millis(self.commit_interval_ms)
    }

    /// 关闭消费者的最长等待
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    /// 消费者客户端配置，具名选项优先于 `settings`
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        for (key, value) in &self.settings {
            config.set(key, value);
        }
        config
            .set("bootstrap.servers", self.bootstrap_servers.join(","))
            .set("group.id", &self.group_id)
            .set("auto.offset.reset", self.offset_reset.as_str())
            .set("enable.auto.commit", self.auto_commit.to_string())
            .set(
                "session.timeout.ms",
                (self.session_timeout * 1000).to_string(),
            );
        config
    }
}

/// 配置文件整体结构
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    /// Kafka 数据源
    #[validate(nested)]
    pub kafka: KafkaConfig,
    /// 计数与报告
    #[validate(nested)]
    pub counter: CounterConfig,
}

impl Settings {
    /// 从 `TALLY_CONFIG` 指定的文件加载，缺失或无效时使用默认配置
    pub fn load() -> Self {
        let path = config_path();
        let settings: Settings = load_or_default(&path);
        info!(
            servers = %settings.kafka.bootstrap_servers.join(","),
            topic = %settings.kafka.topic,
            group = %settings.kafka.group_id,
            "加载配置完成"
        );
        settings
    }
}
