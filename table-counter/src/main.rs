use std::process::ExitCode;
use tally_kafka::{Settings, launch};
use tracing::{error, info};
use tracing_appender::non_blocking;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> ExitCode {
    let (non_blocking, _guard) = non_blocking(std::io::stdout());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_writer(non_blocking)
        .with_target(false)
        .with_env_filter(filter)
        .init();

    let settings = Settings::load();
    info!("程序启动，按 Ctrl+C 停止");
    match launch(settings).await {
        Ok(summary) => {
            info!(
                consumed = summary.consumed,
                counted = summary.counted,
                "程序已正常退出"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("程序异常退出：{e}");
            ExitCode::FAILURE
        }
    }
}
