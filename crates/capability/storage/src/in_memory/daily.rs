//! 每日聚合内存实现

use crate::error::StorageError;
use crate::traits::DailyAggregateStore;
use crate::validation::{ensure_date_range, ensure_hour};
use chrono::NaiveDate;
use domain::DailyAggregateRow;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// 每日聚合内存存储（按日期有序）
pub struct InMemoryDailyAggregateStore {
    rows: RwLock<BTreeMap<NaiveDate, DailyAggregateRow>>,
}

impl InMemoryDailyAggregateStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    /// 直接写入整行（用于测试和历史数据导入）
    pub fn put_row(&self, row: DailyAggregateRow) -> Result<(), StorageError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        rows.insert(row.date, row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryDailyAggregateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DailyAggregateStore for InMemoryDailyAggregateStore {
    async fn get_day(&self, date: NaiveDate) -> Result<Option<DailyAggregateRow>, StorageError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(rows.get(&date).cloned())
    }

    async fn get_days(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyAggregateRow>, StorageError> {
        ensure_date_range(from, to)?;
        let rows = self
            .rows
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(rows.range(from..=to).map(|(_, row)| row.clone()).collect())
    }

    async fn upsert_hour(
        &self,
        date: NaiveDate,
        hour: usize,
        value: f64,
        updated_at_ms: i64,
    ) -> Result<(), StorageError> {
        ensure_hour(hour)?;
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let row = rows
            .entry(date)
            .or_insert_with(|| DailyAggregateRow::empty(date));
        row.hours[hour] = value;
        row.updated_at_ms = updated_at_ms;
        Ok(())
    }

    async fn delete_days(&self, from: NaiveDate, to: NaiveDate) -> Result<u64, StorageError> {
        ensure_date_range(from, to)?;
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let before = rows.len();
        rows.retain(|date, _| *date < from || *date > to);
        Ok((before - rows.len()) as u64)
    }
}
