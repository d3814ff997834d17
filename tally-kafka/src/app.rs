//! Kafka 计数器上下文

use crate::{config::Settings, consumer::KafkaSource};
use tally::{Counter, Handle, StdoutSink, Summary, config::Options, errors::CounterError};
use tracing::{error, info, instrument};

/// 启动计数器并运行至停止
///
/// Ctrl-C 触发优雅退出。
#[instrument(name = "launch_counter", skip_all, fields(topic = %settings.kafka.topic))]
pub async fn launch(settings: Settings) -> Result<Summary, CounterError> {
    let source = KafkaSource::new(settings.kafka.clone());
    let counter = Counter::new(Options::from(&settings.counter), source, StdoutSink);
    listen_ctrl_c(counter.handle());
    info!("开始消费Kafka主题");
    counter.run().await
}

fn listen_ctrl_c(handle: Handle) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("收到 Ctrl-C 信号");
                handle.stop();
            }
            Err(e) => error!("监听 Ctrl-C 信号失败: {e}"),
        }
    });
}
