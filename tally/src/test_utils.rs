//! 测试替身：内存数据源与内存输出端

use crate::{
    domain::{Record, Source},
    errors::{FetchError, SinkError},
    report::{Report, Sink},
};
use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{sync::mpsc, time};

/// 数据源内部状态观测
#[derive(Debug, Default)]
pub struct Probe {
    /// 已打开
    pub opened: AtomicBool,
    /// 已关闭
    pub closed: AtomicBool,
    /// 已确认的消息数
    pub acked: AtomicU64,
}

impl Probe {
    /// 是否已打开
    pub fn is_opened(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 已确认的消息数
    pub fn acked(&self) -> u64 {
        self.acked.load(Ordering::SeqCst)
    }
}

/// 向 [`ChannelSource`] 投递消息
#[derive(Debug, Clone)]
pub struct Feeder {
    topic: String,
    tx: mpsc::UnboundedSender<Result<Record, FetchError>>,
    offset: Arc<AtomicU64>,
}

impl Feeder {
    /// 投递一条消息体
    pub fn send(&self, payload: &[u8]) {
        self.push(Some(payload.to_vec()));
    }

    /// 投递一条空消息体
    pub fn send_empty(&self) {
        self.push(None);
    }

    /// 投递一次拉取错误
    pub fn fail(&self, error: FetchError) {
        let _ = self.tx.send(Err(error));
    }

    fn push(&self, payload: Option<Vec<u8>>) {
        let offset = self.offset.fetch_add(1, Ordering::SeqCst) as i64;
        let _ = self.tx.send(Ok(Record {
            topic: self.topic.clone(),
            partition: 0,
            offset,
            timestamp: None,
            payload,
        }));
    }
}

/// 基于通道的内存数据源
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Result<Record, FetchError>>,
    probe: Arc<Probe>,
    open_error: Option<FetchError>,
}

impl ChannelSource {
    /// 构造数据源及其投递端
    pub fn channel(topic: &str) -> (Feeder, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let feeder = Feeder {
            topic: topic.to_owned(),
            tx,
            offset: Arc::new(AtomicU64::new(0)),
        };
        let source = Self {
            rx,
            probe: Arc::new(Probe::default()),
            open_error: None,
        };
        (feeder, source)
    }

    /// 打开时返回指定错误
    pub fn failing_open(mut self, error: FetchError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// 状态观测
    pub fn probe(&self) -> Arc<Probe> {
        Arc::clone(&self.probe)
    }
}

impl Source for ChannelSource {
    fn open(&mut self) -> Result<(), FetchError> {
        if let Some(e) = self.open_error.take() {
            return Err(e);
        }
        self.probe.opened.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch(&mut self, wait: Duration) -> Result<Option<Record>, FetchError> {
        match time::timeout(wait, self.rx.recv()).await {
            Ok(Some(item)) => item.map(Some),
            // 投递端均已关闭，按空闲等待处理
            Ok(None) => {
                time::sleep(wait).await;
                Ok(None)
            }
            Err(_) => Ok(None),
        }
    }

    fn ack(&mut self, _record: &Record) {
        self.probe.acked.fetch_add(1, Ordering::SeqCst);
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        self.rx.close();
        self.probe.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// 收集报告的内存输出端
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    reports: Arc<Mutex<Vec<Report>>>,
}

impl MemorySink {
    /// 已收到的报告
    pub fn reports(&self) -> Vec<Report> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Sink for MemorySink {
    fn emit(&self, report: &Report) -> Result<(), SinkError> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report.clone());
        Ok(())
    }
}
