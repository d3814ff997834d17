//! # **tally** 核心库
//!
//! 从消息流中提取分组键，累计出现频次，并周期性输出排名报告。

#![warn(missing_docs)]

pub mod aggregator;
pub mod config;
pub mod counter;
pub mod domain;
pub mod errors;
pub mod extractor;
pub mod report;
pub mod retry;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use aggregator::FrequencyTable;
pub use counter::{Counter, Handle, Outcome, Summary};
pub use domain::{Record, Source, State};
pub use extractor::{Extractor, Key};
pub use report::{Report, Sink, StdoutSink};
