//! ## Kafka 数据源

use crate::{commit::OffsetTracker, config::KafkaConfig, errors::classify};
use rdkafka::{
    Message,
    consumer::{CommitMode, Consumer, StreamConsumer},
    error::KafkaError,
    message::BorrowedMessage,
};
use tally::{Record, Source, errors::FetchError};
use tokio::time::{self, Duration};
use tracing::{debug, info, instrument, warn};

/// 基于 `StreamConsumer` 的数据源
pub struct KafkaSource {
    config: KafkaConfig,
    consumer: Option<StreamConsumer>,
    tracker: Option<OffsetTracker>,
}

impl KafkaSource {
    /// 构造函数，手动提交模式下跟踪待提交偏移量
    pub fn new(config: KafkaConfig) -> Self {
        let tracker = (!config.auto_commit)
            .then(|| OffsetTracker::new(config.commit_batch, config.commit_interval()));
        Self {
            config,
            consumer: None,
            tracker,
        }
    }

    fn commit_async(&mut self) -> Result<(), KafkaError> {
        let (Some(consumer), Some(tracker)) = (self.consumer.as_ref(), self.tracker.as_mut())
        else {
            return Ok(());
        };
        if tracker.is_empty() {
            return Ok(());
        }
        let tpl = tracker.drain()?;
        consumer.commit(&tpl, CommitMode::Async)
    }

    fn commit_due(&mut self) {
        if self.tracker.as_ref().is_some_and(OffsetTracker::due) {
            debug!("触及提交阈值，提交偏移量");
            if let Err(e) = self.commit_async() {
                warn!("提交偏移量失败：{e}");
            }
        }
    }
}

fn to_record(msg: &BorrowedMessage<'_>) -> Record {
    Record {
        topic: msg.topic().to_owned(),
        partition: msg.partition(),
        offset: msg.offset(),
        timestamp: msg.timestamp().to_millis(),
        payload: msg.payload().map(<[u8]>::to_vec),
    }
}

impl Source for KafkaSource {
    #[instrument(name = "open_consumer", skip(self), fields(topic = %self.config.topic))]
    fn open(&mut self) -> Result<(), FetchError> {
        let consumer: StreamConsumer = self.config.client_config().create().map_err(classify)?;
        consumer
            .subscribe(&[self.config.topic.as_str()])
            .map_err(classify)?;
        info!(
            group = %self.config.group_id,
            auto_commit = self.config.auto_commit,
            "成功订阅主题"
        );
        self.consumer = Some(consumer);
        Ok(())
    }

    async fn fetch(&mut self, wait: Duration) -> Result<Option<Record>, FetchError> {
        let Some(consumer) = self.consumer.as_ref() else {
            return Err(FetchError::Fatal("消费者尚未打开".to_owned()));
        };
        let polled = time::timeout(wait, consumer.recv())
            .await
            .map(|received| received.map(|msg| to_record(&msg)));
        match polled {
            Ok(Ok(record)) => Ok(Some(record)),
            Ok(Err(KafkaError::PartitionEOF(partition))) => {
                debug!(partition, "已到达分区末尾");
                Ok(None)
            }
            Ok(Err(e)) => Err(classify(e)),
            Err(_) => {
                self.commit_due();
                Ok(None)
            }
        }
    }

    fn ack(&mut self, record: &Record) {
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.track(&record.topic, record.partition, record.offset);
        }
        self.commit_due();
    }

    #[instrument(name = "close_consumer", skip(self), fields(topic = %self.config.topic))]
    async fn close(&mut self) -> Result<(), FetchError> {
        let Some(consumer) = self.consumer.take() else {
            return Ok(());
        };
        let pending = match self.tracker.as_mut() {
            Some(tracker) if !tracker.is_empty() => Some(tracker.drain()),
            _ => None,
        };
        // 同步提交与关闭消费者都会阻塞至 broker 响应
        let committed = within(self.config.close_timeout(), move || {
            let committed = match pending {
                Some(Ok(tpl)) => {
                    info!("提交剩余偏移量");
                    consumer.commit(&tpl, CommitMode::Sync)
                }
                Some(Err(e)) => Err(e),
                None => Ok(()),
            };
            consumer.unsubscribe();
            drop(consumer);
            committed
        })
        .await?;
        info!("Kafka消费者已停止");
        committed.map_err(classify)
    }
}

/// 在阻塞线程池上执行，最多等待 `limit`
///
/// 超时后不再等待，任务在后台继续运行直至结束。
async fn within<T, F>(limit: Duration, f: F) -> Result<T, FetchError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match time::timeout(limit, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(FetchError::Fatal(format!("关闭任务异常：{e}"))),
        Err(_) => {
            warn!("关闭消费者超过{limit:?}期限，放弃等待");
            Err(FetchError::Transient(format!("关闭消费者超过{limit:?}期限")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test]
    async fn fetch_before_open_is_fatal() {
        let mut source = KafkaSource::new(KafkaConfig::default());
        let result = source.fetch(Duration::from_millis(10)).await;
        assert!(matches!(result, Err(FetchError::Fatal(_))));
    }

    #[tokio::test]
    async fn close_before_open_is_noop() {
        let mut source = KafkaSource::new(KafkaConfig {
            auto_commit: false,
            ..KafkaConfig::default()
        });
        assert!(source.close().await.is_ok());
        assert!(source.close().await.is_ok());
    }

    #[tokio::test]
    async fn blocking_close_is_bounded() {
        let started = Instant::now();
        let result = within(Duration::from_millis(20), || {
            std::thread::sleep(Duration::from_millis(300));
        })
        .await;
        assert!(matches!(result, Err(FetchError::Transient(_))));
        assert!(started.elapsed() < Duration::from_millis(200));

        let value = within(Duration::from_secs(1), || 7).await.unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn manual_commit_tracks_offsets() {
        let mut source = KafkaSource::new(KafkaConfig {
            auto_commit: false,
            commit_batch: 10,
            ..KafkaConfig::default()
        });
        let record = Record {
            topic: "your_kafka_topic".to_owned(),
            partition: 0,
            offset: 41,
            timestamp: None,
            payload: None,
        };
        source.ack(&record);
        assert!(source.tracker.as_ref().is_some_and(|t| !t.is_empty()));

        let mut auto = KafkaSource::new(KafkaConfig::default());
        auto.ack(&record);
        assert!(auto.tracker.is_none());
    }
}
