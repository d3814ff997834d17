mod common;

use common::*;
use std::{fs, time::Duration};
use tally::config::{ResetPolicy, load_or_default};
use tally_kafka::{OffsetReset, Settings};

#[test]
fn missing_file_uses_documented_defaults() {
    init();
    let path = std::env::temp_dir().join("tally-kafka-missing-config.json");
    let settings: Settings = load_or_default(&path);
    assert_eq!(settings.kafka.bootstrap_servers, vec!["localhost:9092"]);
    assert_eq!(settings.kafka.topic, "your_kafka_topic");
    assert_eq!(settings.kafka.group_id, "table_counter_group");
    assert_eq!(settings.kafka.offset_reset, OffsetReset::Earliest);
    assert!(settings.kafka.auto_commit);
    assert_eq!(settings.kafka.close_timeout(), Duration::from_secs(5));
    assert_eq!(settings.counter.field, "table");
    assert_eq!(settings.counter.top_n, 10);
}

#[test]
fn malformed_file_uses_defaults() {
    init();
    let path = write_config("malformed", r#"{"kafka": {"topic": "#);
    let settings: Settings = load_or_default(&path);
    assert_eq!(settings.kafka.topic, "your_kafka_topic");
    fs::remove_file(path).unwrap();
}

#[test]
fn empty_topic_is_rejected() {
    init();
    let path = write_config("empty-topic", r#"{"kafka": {"topic": ""}}"#);
    let settings: Settings = load_or_default(&path);
    assert_eq!(settings.kafka.topic, "your_kafka_topic");
    fs::remove_file(path).unwrap();
}

#[test]
fn full_file_is_loaded() {
    init();
    let path = write_config(
        "full",
        r#"{
            "kafka": {
                "bootstrap_servers": ["kafka-0:9092", "kafka-1:9092"],
                "topic": "binlog",
                "group_id": "binlog-counter",
                "offset_reset": "latest",
                "auto_commit": false,
                "settings": {"fetch.min.bytes": "1024", "client.id": "counter-1"}
            },
            "counter": {
                "field": "table",
                "top_n": 5,
                "report_interval": 30,
                "reset": "on_report"
            }
        }"#,
    );
    let settings: Settings = load_or_default(&path);
    let kafka = &settings.kafka;
    assert_eq!(kafka.bootstrap_servers, vec!["kafka-0:9092", "kafka-1:9092"]);
    assert_eq!(kafka.topic, "binlog");
    assert_eq!(kafka.offset_reset, OffsetReset::Latest);
    assert!(!kafka.auto_commit);
    assert_eq!(kafka.settings.get("fetch.min.bytes").unwrap(), "1024");
    assert_eq!(settings.counter.top_n, 5);
    assert_eq!(settings.counter.report_interval, 30);
    assert_eq!(settings.counter.reset, ResetPolicy::OnReport);

    let client = kafka.client_config();
    assert_eq!(client.get("bootstrap.servers"), Some("kafka-0:9092,kafka-1:9092"));
    assert_eq!(client.get("group.id"), Some("binlog-counter"));
    assert_eq!(client.get("auto.offset.reset"), Some("latest"));
    assert_eq!(client.get("enable.auto.commit"), Some("false"));
    assert_eq!(client.get("session.timeout.ms"), Some("45000"));
    assert_eq!(client.get("client.id"), Some("counter-1"));
    fs::remove_file(path).unwrap();
}

#[test]
fn named_options_override_passthrough() {
    init();
    let path = write_config(
        "override",
        r#"{"kafka": {"group_id": "named", "settings": {"group.id": "passthrough"}}}"#,
    );
    let settings: Settings = load_or_default(&path);
    assert_eq!(
        settings.kafka.client_config().get("group.id"),
        Some("named")
    );
    fs::remove_file(path).unwrap();
}
