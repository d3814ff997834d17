//! 排名报告与输出

use crate::{errors::SinkError, extractor::Key};
use std::{
    fmt,
    io::{self, Write},
};
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

const TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// 报告行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 名次，从 1 开始
    pub rank: usize,
    /// 分组键
    pub key: Key,
    /// 出现次数
    pub count: u64,
}

/// 某一时刻的排名快照
#[derive(Debug, Clone)]
pub struct Report {
    /// 生成时间
    pub generated_at: OffsetDateTime,
    /// 分组字段名
    pub field: String,
    /// 按次数降序排列的行
    pub rows: Vec<Row>,
    /// 快照时的去重键数
    pub distinct: usize,
    /// 快照时的累计次数
    pub total: u64,
}

impl Report {
    /// 由已排序的键值对构造报告
    pub fn new(field: &str, ranked: Vec<(Key, u64)>, distinct: usize, total: u64) -> Self {
        let rows = ranked
            .into_iter()
            .enumerate()
            .map(|(i, (key, count))| Row {
                rank: i + 1,
                key,
                count,
            })
            .collect();
        Self {
            generated_at: OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()),
            field: field.to_owned(),
            rows,
            distinct,
            total,
        }
    }

    /// 报告不含任何行
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 以键值对形式返回各行
    pub fn entries(&self) -> Vec<(&str, u64)> {
        self.rows
            .iter()
            .map(|row| (row.key.as_str(), row.count))
            .collect()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timestamp = self.generated_at.format(TIMESTAMP).map_err(|_| fmt::Error)?;
        writeln!(f)?;
        writeln!(f, "=== {timestamp} 统计结果 ===")?;
        writeln!(f, "排名\t{:<15}\t出现次数", self.field)?;
        writeln!(f, "{}", "-".repeat(40))?;
        for row in &self.rows {
            writeln!(f, "{}\t{:<15}\t{}", row.rank, row.key, row.count)?;
        }
        writeln!(f, "{}", "-".repeat(40))?;
        writeln!(f, "去重键数：{}\t累计次数：{}", self.distinct, self.total)?;
        writeln!(f, "{}", "=".repeat(40))
    }
}

/// 报告输出端
pub trait Sink: Send + Sync + 'static {
    /// 输出一份报告
    fn emit(&self, report: &Report) -> Result<(), SinkError>;
}

/// 标准输出
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn emit(&self, report: &Report) -> Result<(), SinkError> {
        let mut out = io::stdout().lock();
        write!(out, "{report}")?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Report {
        Report::new(
            "table",
            vec![("orders".to_owned(), 3), ("users".to_owned(), 1)],
            4,
            6,
        )
    }

    #[test]
    fn ranks_from_one() {
        let report = sample();
        assert_eq!(report.rows[0].rank, 1);
        assert_eq!(report.rows[1].rank, 2);
        assert_eq!(report.entries(), vec![("orders", 3), ("users", 1)]);
        assert!(!report.is_empty());
    }

    #[test]
    fn renders_header_rows_and_footer() {
        let text = sample().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[1].starts_with("=== ") && lines[1].ends_with(" 统计结果 ==="));
        assert!(lines[2].starts_with("排名\ttable"));
        assert_eq!(lines[4], format!("1\t{:<15}\t3", "orders"));
        assert_eq!(lines[5], format!("2\t{:<15}\t1", "users"));
        assert_eq!(lines[7], "去重键数：4\t累计次数：6");
        assert_eq!(lines.last().copied(), Some("=".repeat(40).as_str()));
    }

    #[test]
    fn empty_report_has_no_rows() {
        let report = Report::new("table", Vec::new(), 0, 0);
        assert!(report.is_empty());
        assert!(report.to_string().contains("累计次数：0"));
    }
}
