//! 频次聚合


use crate::{extractor::Key, report::Report};
use ahash::AHashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Table {
    index: AHashMap<Key, usize>,
    // 按首次出现顺序排列
    entries: Vec<(Key, u64)>,
    total: u64,
}

/// 线程安全的频次表
///
/// 临界区仅覆盖映射的更新与快照复制，排序在锁外完成。
#[derive(Debug, Default)]
pub struct FrequencyTable {
    inner: Mutex<Table>,
    max_keys: Option<usize>,
}

impl FrequencyTable {
    /// 构造函数
    pub fn new() -> Self {
        Self::default()
    }

    /// 限定去重键数上限的频次表，超出上限的新键不再记录
    pub fn with_max_keys(max_keys: usize) -> Self {
        Self {
            inner: Mutex::default(),
            max_keys: Some(max_keys),
        }
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, Table> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 键计数加一，返回是否记录成功
    pub fn increment(&self, key: &str) -> bool {
        let mut guard = self.lock();
        let table = &mut *guard;
        if let Some(&i) = table.index.get(key) {
            table.entries[i].1 += 1;
        } else {
            if self.max_keys.is_some_and(|max| table.entries.len() >= max) {
                return false;
            }
            table.index.insert(key.to_owned(), table.entries.len());
            table.entries.push((key.to_owned(), 1));
        }
        table.total += 1;
        true
    }

    /// 前 `n` 名，按次数降序，同次数按首次出现顺序
    pub fn top_n(&self, n: usize) -> Vec<(Key, u64)> {
        let entries = self.lock().entries.clone();
        rank(entries, n)
    }

    /// 取前 `n` 名并清空频次表，二者在同一临界区内完成
    pub fn take(&self, n: usize) -> Vec<(Key, u64)> {
        let Table { entries, .. } = std::mem::take(&mut *self.lock());
        rank(entries, n)
    }

    /// 生成前 `n` 名报告
    pub fn report(&self, field: &str, n: usize) -> Report {
        let (entries, total) = {
            let table = self.lock();
            (table.entries.clone(), table.total)
        };
        let distinct = entries.len();
        Report::new(field, rank(entries, n), distinct, total)
    }

    /// 生成前 `n` 名报告并清空频次表
    pub fn take_report(&self, field: &str, n: usize) -> Report {
        let Table { entries, total, .. } = std::mem::take(&mut *self.lock());
        let distinct = entries.len();
        Report::new(field, rank(entries, n), distinct, total)
    }

    /// 清空所有计数
    pub fn reset(&self) {
        *self.lock() = Table::default();
    }

    /// 单个键的计数
    pub fn count(&self, key: &str) -> u64 {
        let table = self.lock();
        table.index.get(key).map_or(0, |&i| table.entries[i].1)
    }

    /// 去重键数
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// 累计次数
    pub fn total(&self) -> u64 {
        self.lock().total
    }
}

fn rank(mut entries: Vec<(Key, u64)>, n: usize) -> Vec<(Key, u64)> {
    // 稳定排序，保留首次出现顺序
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries.truncate(n);
    entries
}
