mod common;

use common::*;
use std::{fs, time::Duration};
use tally::config::{CounterConfig, Options, ResetPolicy, load, load_or_default};

#[test]
fn missing_file_falls_back_to_defaults() {
    init();
    let path = std::env::temp_dir().join("tally-does-not-exist.json");
    let cfg: CounterConfig = load_or_default(&path);
    assert_eq!(cfg.field, "table");
    assert_eq!(cfg.top_n, 10);
    assert_eq!(cfg.report_interval, 60);
}

#[test]
fn malformed_file_falls_back_to_defaults() {
    init();
    let path = write_config("malformed", "{ this is not json");
    let cfg: CounterConfig = load_or_default(&path);
    assert_eq!(cfg.top_n, 10);
    assert!(load::<CounterConfig>(Some(&path)).is_err());
    fs::remove_file(path).unwrap();
}

#[test]
fn invalid_values_fall_back_to_defaults() {
    init();
    let path = write_config("invalid", r#"{"top_n": 0, "field": "table"}"#);
    let cfg: CounterConfig = load_or_default(&path);
    assert_eq!(cfg.top_n, 10);
    fs::remove_file(path).unwrap();
}

#[test]
fn partial_file_keeps_remaining_defaults() {
    init();
    let path = write_config(
        "partial",
        r#"{"field": "collection", "top_n": 3, "reset": "on_report", "max_keys": 1000}"#,
    );
    let cfg: CounterConfig = load_or_default(&path);
    assert_eq!(cfg.field, "collection");
    assert_eq!(cfg.top_n, 3);
    assert_eq!(cfg.reset, ResetPolicy::OnReport);
    assert_eq!(cfg.max_keys, Some(1000));
    assert_eq!(cfg.poll_timeout_ms, 1000);

    let options = Options::from(&cfg);
    assert_eq!(options.report_interval, Duration::from_secs(60));
    assert_eq!(options.max_keys, Some(1000));
    fs::remove_file(path).unwrap();
}
