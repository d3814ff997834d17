//! # **tally** 的 Kafka 实现
//!
//!

#![warn(missing_docs)]

pub(crate) mod commit;

pub mod app;
pub mod config;
pub mod consumer;
pub mod errors;

pub use app::launch;
pub use config::{KafkaConfig, OffsetReset, Settings};
pub use consumer::KafkaSource;
