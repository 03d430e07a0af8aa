//! 原始采样内存实现
//!
//! 仅用于本地测试和演示。

use crate::error::StorageError;
use crate::traits::{SampleQuery, SampleStore, TimeOrder};
use domain::RawSample;
use std::sync::RwLock;

/// 原始采样内存存储
pub struct InMemorySampleStore {
    samples: RwLock<Vec<RawSample>>,
}

impl InMemorySampleStore {
    pub fn new() -> Self {
        Self {
            samples: RwLock::new(Vec::new()),
        }
    }

    /// 获取当前累计的采样数量（用于测试）
    pub fn len(&self) -> usize {
        self.samples.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemorySampleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SampleStore for InMemorySampleStore {
    async fn insert_samples(&self, samples: &[RawSample]) -> Result<usize, StorageError> {
        let mut store = self
            .samples
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        store.extend(samples.iter().cloned());
        Ok(samples.len())
    }

    async fn query_samples(&self, query: &SampleQuery) -> Result<Vec<RawSample>, StorageError> {
        let samples = self
            .samples
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut selected: Vec<RawSample> = samples
            .iter()
            .filter(|sample| sample.point_id == query.point_id)
            .filter(|sample| query.from_ms.is_none_or(|from| sample.ts_ms >= from))
            .filter(|sample| query.to_ms.is_none_or(|to| sample.ts_ms <= to))
            .cloned()
            .collect();

        // 稳定排序：同一时间戳保持写入顺序
        selected.sort_by_key(|sample| sample.ts_ms);
        if matches!(query.order, TimeOrder::Desc) {
            selected.reverse();
        }
        if let Some(limit) = query.limit {
            selected.truncate(limit.max(0) as usize);
        }
        Ok(selected)
    }

    async fn delete_samples(
        &self,
        from_ms: i64,
        to_ms: i64,
        point_id: Option<&str>,
    ) -> Result<u64, StorageError> {
        let mut samples = self
            .samples
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let before = samples.len();
        samples.retain(|sample| {
            let in_range = sample.ts_ms >= from_ms && sample.ts_ms <= to_ms;
            let matches_point = point_id.is_none_or(|point| sample.point_id == point);
            !(in_range && matches_point)
        });
        Ok((before - samples.len()) as u64)
    }

    async fn delete_samples_before(&self, cutoff_ms: i64) -> Result<u64, StorageError> {
        let mut samples = self
            .samples
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let before = samples.len();
        samples.retain(|sample| sample.ts_ms >= cutoff_ms);
        Ok((before - samples.len()) as u64)
    }
}
