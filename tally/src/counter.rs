//! 计数循环与报告任务
//!
//! 拉取循环与报告任务是两个独立的 tokio 任务，只通过 [`FrequencyTable`] 共享状态。
//! 同一关闭信号同时通知二者。


use crate::{
    aggregator::FrequencyTable,
    config::{Options, ResetPolicy},
    domain::{Record, Source, State},
    errors::{CounterError, ExtractError, FetchError, SinkError},
    extractor::{Extractor, Key},
    report::Sink,
    retry::Backoff,
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::{
    sync::watch,
    task::{JoinError, JoinHandle},
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, instrument, warn};

/// 单条消息的处理结果
#[derive(Debug)]
pub enum Outcome {
    /// 已计数
    Counted(Key),
    /// 去重键数已达上限，未计数
    Dropped(Key),
    /// 未能提取分组键
    Skipped(ExtractError),
    /// 空消息体
    Empty,
}

/// 运行期间各类结果的条数
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// 收到的消息
    pub consumed: u64,
    /// 已计数
    pub counted: u64,
    /// 因键数上限未计数
    pub dropped: u64,
    /// 无法解析的消息体
    pub malformed: u64,
    /// 缺少或无效的分组键
    pub absent: u64,
    /// 空消息体
    pub empty: u64,
}

impl Summary {
    fn record(&mut self, outcome: &Outcome) {
        self.consumed += 1;
        match outcome {
            Outcome::Counted(_) => self.counted += 1,
            Outcome::Dropped(_) => self.dropped += 1,
            Outcome::Skipped(e) if e.is_malformed() => self.malformed += 1,
            Outcome::Skipped(_) => self.absent += 1,
            Outcome::Empty => self.empty += 1,
        }
    }
}

/// 处理一条消息：提取分组键并计数
pub fn process(extractor: &Extractor, table: &FrequencyTable, record: &Record) -> Outcome {
    let Some(payload) = record.payload.as_deref() else {
        debug!(
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            "空消息体"
        );
        return Outcome::Empty;
    };
    match extractor.extract(payload) {
        Ok(key) if table.increment(&key) => Outcome::Counted(key),
        Ok(key) => {
            debug!(offset = record.offset, "去重键数已达上限，丢弃新键'{key}'");
            Outcome::Dropped(key)
        }
        Err(e) => {
            if e.is_malformed() {
                warn!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    "跳过无法解析的消息：{e}"
                );
            } else {
                debug!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    "跳过无分组键的消息：{e}"
                );
            }
            Outcome::Skipped(e)
        }
    }
}

/// 计数器控制句柄
#[derive(Debug, Clone)]
pub struct Handle {
    state: Arc<watch::Sender<State>>,
    shutdown: Arc<watch::Sender<bool>>,
    table: Arc<FrequencyTable>,
}

impl Handle {
    /// 请求停止，可重复调用
    ///
    /// 尚未启动的计数器直接进入 [`State::Stopped`]。
    pub fn stop(&self) {
        self.state.send_if_modified(|state| {
            if *state == State::Idle {
                *state = State::Stopped;
                true
            } else {
                false
            }
        });
        self.shutdown.send_if_modified(|stop| {
            if *stop {
                false
            } else {
                info!("收到停止请求");
                *stop = true;
                true
            }
        });
    }

    /// 当前状态
    pub fn state(&self) -> State {
        *self.state.borrow()
    }

    /// 等待进入 [`State::Stopped`]
    pub async fn stopped(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|state| *state == State::Stopped).await;
    }

    /// 频次表
    pub fn table(&self) -> &Arc<FrequencyTable> {
        &self.table
    }
}

/// 频次计数器
pub struct Counter<S, K> {
    options: Options,
    extractor: Extractor,
    table: Arc<FrequencyTable>,
    source: S,
    sink: Arc<K>,
    state: Arc<watch::Sender<State>>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl<S, K> Counter<S, K>
where
    S: Source,
    K: Sink,
{
    /// 构造函数
    pub fn new(options: Options, source: S, sink: K) -> Self {
        let table = match options.max_keys {
            Some(max) => FrequencyTable::with_max_keys(max),
            None => FrequencyTable::new(),
        };
        Self {
            extractor: Extractor::new(options.field.clone()),
            options,
            table: Arc::new(table),
            source,
            sink: Arc::new(sink),
            state: Arc::new(watch::Sender::new(State::Idle)),
            shutdown: Arc::new(watch::Sender::new(false)),
        }
    }

    /// 使用外部提供的频次表
    pub fn with_table(mut self, table: Arc<FrequencyTable>) -> Self {
        self.table = table;
        self
    }

    /// 控制句柄
    pub fn handle(&self) -> Handle {
        Handle {
            state: Arc::clone(&self.state),
            shutdown: Arc::clone(&self.shutdown),
            table: Arc::clone(&self.table),
        }
    }

    /// 运行直至停止
    ///
    /// 收到停止请求时正常返回；数据源致命错误或重试耗尽时返回错误。
    #[instrument(name = "run_counter", skip_all, fields(field = %self.options.field))]
    pub async fn run(self) -> Result<Summary, CounterError> {
        let Self {
            options,
            extractor,
            table,
            mut source,
            sink,
            state,
            shutdown,
        } = self;

        let started = state.send_if_modified(|state| {
            if *state == State::Idle {
                *state = State::Running;
                true
            } else {
                false
            }
        });
        if !started {
            info!("计数器已停止，不再启动");
            return Ok(Summary::default());
        }

        if let Err(e) = source.open() {
            error!("打开数据源失败：{e}");
            state.send_replace(State::Stopped);
            return Err(CounterError::Open(e));
        }
        info!("计数器开始运行");

        let reporter = tokio::spawn(report(
            options.clone(),
            Arc::clone(&table),
            sink,
            shutdown.subscribe(),
        ));
        let mut summary = Summary::default();
        let result = consume(
            &options,
            &extractor,
            &table,
            &mut source,
            shutdown.subscribe(),
            &mut summary,
        )
        .await;

        state.send_replace(State::Draining);
        info!("开始排空");
        shutdown.send_replace(true);
        if let Err(e) = reporter.await {
            error!("报告任务异常退出：{e}");
        }
        let closed = source.close().await;
        state.send_replace(State::Stopped);
        info!(
            consumed = summary.consumed,
            counted = summary.counted,
            dropped = summary.dropped,
            malformed = summary.malformed,
            absent = summary.absent,
            empty = summary.empty,
            "计数器已停止"
        );

        match (result, closed) {
            (Ok(()), Ok(())) => Ok(summary),
            (Ok(()), Err(e)) => {
                error!("关闭数据源失败：{e}");
                Err(CounterError::Close(e))
            }
            (Err(e), closed) => {
                if let Err(ce) = closed {
                    error!("关闭数据源失败：{ce}");
                }
                Err(e)
            }
        }
    }
}

#[instrument(name = "consume_records", skip_all)]
async fn consume<S: Source>(
    options: &Options,
    extractor: &Extractor,
    table: &FrequencyTable,
    source: &mut S,
    mut shutdown: watch::Receiver<bool>,
    summary: &mut Summary,
) -> Result<(), CounterError> {
    let mut backoff = Backoff::new(options.backoff, options.max_backoff, options.max_attempts);
    loop {
        let fetched = tokio::select! {
            biased;
            _ = stopping(&mut shutdown) => {
                info!("收到关闭信号，停止拉取消息");
                return Ok(());
            }
            fetched = source.fetch(options.poll_timeout) => fetched,
        };

        match fetched {
            Ok(Some(record)) => {
                backoff.reset();
                let outcome = process(extractor, table, &record);
                summary.record(&outcome);
                source.ack(&record);
            }
            Ok(None) => {}
            Err(FetchError::Fatal(reason)) => {
                error!("数据源致命错误：{reason}");
                return Err(CounterError::Fatal(FetchError::Fatal(reason)));
            }
            Err(e) => {
                let Some(delay) = backoff.next_delay() else {
                    error!("重试{}次后仍无法拉取消息：{e}", backoff.attempt());
                    return Err(CounterError::RetriesExhausted {
                        attempts: backoff.attempt(),
                        source: e,
                    });
                };
                warn!(
                    "拉取消息失败，{delay:?}后第{}次重试：{e}",
                    backoff.attempt()
                );
                tokio::select! {
                    biased;
                    _ = stopping(&mut shutdown) => {
                        info!("重试等待期间收到关闭信号");
                        return Ok(());
                    }
                    _ = time::sleep(delay) => {}
                }
            }
        }
    }
}

async fn stopping(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

type ReportJob = JoinHandle<Result<(), SinkError>>;

/// 周期输出报告
///
/// 同一时刻至多一次输出在进行，上一次输出未完成时跳过当前周期。
/// 关闭时等待进行中的输出结束，返回后不再写入输出端。
#[instrument(name = "report_counts", skip_all)]
async fn report<K: Sink>(
    options: Options,
    table: Arc<FrequencyTable>,
    sink: Arc<K>,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = options.report_interval;
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("启动报告任务，间隔{period:?}");
    let mut pending: Option<ReportJob> = None;
    loop {
        tokio::select! {
            biased;
            _ = stopping(&mut shutdown) => {
                info!("收到关闭信号，停止报告任务");
                break;
            }
            _ = interval.tick() => {
                if let Some(job) = pending.take() {
                    if !job.is_finished() {
                        warn!("上一次报告仍在输出，跳过本次报告");
                        pending = Some(job);
                        continue;
                    }
                    settle(job.await);
                }
                pending = emit(&options, &table, &sink).await;
            }
        }
    }

    if let Some(job) = pending {
        if !job.is_finished() {
            info!("等待进行中的报告输出结束");
        }
        settle(job.await);
    }
}

/// 生成并输出一次报告
///
/// 期限内完成返回 `None`，超期返回仍在进行的任务。
/// 超期时尚未开始的任务直接放弃，不读取频次表。
async fn emit<K: Sink>(
    options: &Options,
    table: &Arc<FrequencyTable>,
    sink: &Arc<K>,
) -> Option<ReportJob> {
    let expired = Arc::new(AtomicBool::new(false));
    let mut job = tokio::task::spawn_blocking({
        let table = Arc::clone(table);
        let sink = Arc::clone(sink);
        let expired = Arc::clone(&expired);
        let field = options.field.clone();
        let (top_n, reset) = (options.top_n, options.reset);
        move || {
            if expired.load(Ordering::Acquire) {
                debug!("报告已超期，放弃本次报告");
                return Ok(());
            }
            let report = match reset {
                ResetPolicy::Never => table.report(&field, top_n),
                ResetPolicy::OnReport => table.take_report(&field, top_n),
            };
            if report.is_empty() {
                debug!("频次表为空，跳过本次报告");
                return Ok(());
            }
            sink.emit(&report)
        }
    });

    match time::timeout(options.report_deadline, &mut job).await {
        Ok(result) => {
            settle(result);
            None
        }
        Err(_) => {
            expired.store(true, Ordering::Release);
            warn!(
                "生成报告超过{:?}期限，输出结束前跳过后续报告",
                options.report_deadline
            );
            Some(job)
        }
    }
}

fn settle(result: Result<Result<(), SinkError>, JoinError>) {
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("输出报告失败：{e}"),
        Err(e) => error!("报告任务异常：{e}"),
    }
}
