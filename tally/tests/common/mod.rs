use std::{fs, path::PathBuf, sync::LazyLock};
use tracing::{Level, info};
use tracing_subscriber::fmt;

static LOGGING: LazyLock<()> = LazyLock::new(|| {
    fmt().with_test_writer().with_max_level(Level::DEBUG).init();
    info!("启用 {} 测试日志输出", Level::DEBUG);
});

pub fn init() {
    LazyLock::force(&LOGGING);
}

pub fn write_config(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("tally-{}-{name}.json", std::process::id()));
    fs::write(&path, contents).unwrap();
    path
}
