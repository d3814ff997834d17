use ahash::AHashMap;
use rdkafka::{Offset, TopicPartitionList, error::KafkaError};
use tokio::time::{Duration, Instant};

/// 手动提交模式下的待提交偏移量
///
/// 按条数阈值或时间间隔触发批量提交，每个分区只保留最大偏移量。
pub(crate) struct OffsetTracker {
    batch: AHashMap<String, AHashMap<i32, i64>>,
    count: usize,
    threshold: usize,
    interval: Duration,
    last_flush: Instant,
}

impl OffsetTracker {
    pub(crate) fn new(threshold: usize, interval: Duration) -> Self {
        Self {
            batch: AHashMap::new(),
            count: 0,
            threshold,
            interval,
            last_flush: Instant::now(),
        }
    }

    pub(crate) fn track(&mut self, topic: &str, partition: i32, offset: i64) {
        if let Some(partitions) = self.batch.get_mut(topic) {
            partitions
                .entry(partition)
                .and_modify(|e| *e = offset.max(*e))
                .or_insert(offset);
        } else {
            let mut partitions = AHashMap::new();
            partitions.insert(partition, offset);
            self.batch.insert(topic.to_owned(), partitions);
        }
        self.count += 1;
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    pub(crate) fn due(&self) -> bool {
        !self.batch.is_empty()
            && (self.count >= self.threshold || self.last_flush.elapsed() >= self.interval)
    }

    /// 取出待提交偏移量，提交位置为已处理偏移量加一
    pub(crate) fn drain(&mut self) -> Result<TopicPartitionList, KafkaError> {
        let mut tpl = TopicPartitionList::new();
        for (topic, partitions) in self.batch.drain() {
            for (partition, offset) in partitions {
                tpl.add_partition_offset(&topic, partition, Offset::Offset(offset + 1))?;
            }
        }
        self.count = 0;
        self.last_flush = Instant::now();
        Ok(tpl)
    }
}
