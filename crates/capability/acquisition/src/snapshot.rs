//! 设备快照缓存与点位环形缓冲
//!
//! 快照与环形缓冲在同一把写锁下更新，读者看到的总是某个完整 tick 的结果。

use domain::{DeviceKey, PointId, RawSample, Snapshot};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct CacheInner {
    snapshots: HashMap<DeviceKey, Snapshot>,
    recent: HashMap<(DeviceKey, PointId), VecDeque<RawSample>>,
}

/// 快照缓存
pub struct SnapshotCache {
    inner: RwLock<CacheInner>,
    capacity: usize,
}

impl SnapshotCache {
    /// `capacity`：每个 (设备, 点位) 保留的最近值个数
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(CacheInner::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 覆盖设备快照，并把本次成功读取的值压入环形缓冲
    ///
    /// `live` 在写锁内检查：设备停止轮询后到达的结果被丢弃，不会重建已清理的条目。
    pub fn record_tick(
        &self,
        key: &DeviceKey,
        live: &CancellationToken,
        snapshot: Snapshot,
        samples: &[RawSample],
    ) {
        let Ok(mut inner) = self.inner.write() else {
            return;
        };
        if live.is_cancelled() {
            return;
        }
        for sample in samples {
            let buffer = inner
                .recent
                .entry((key.clone(), sample.point_id.clone()))
                .or_default();
            if buffer.len() == self.capacity {
                buffer.pop_front();
            }
            buffer.push_back(sample.clone());
        }
        inner.snapshots.insert(key.clone(), snapshot);
    }

    pub fn get(&self, key: &DeviceKey) -> Option<Snapshot> {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.snapshots.get(key).cloned())
    }

    /// 设备停止轮询时清理
    pub fn remove(&self, key: &DeviceKey) {
        if let Ok(mut inner) = self.inner.write() {
            inner.snapshots.remove(key);
            inner.recent.retain(|(device, _), _| device != key);
        }
    }

    /// 单个设备某点位的最近值（时间升序）
    pub fn recent_values(&self, key: &DeviceKey, point: &str) -> Vec<RawSample> {
        self.inner
            .read()
            .ok()
            .and_then(|inner| {
                inner
                    .recent
                    .get(&(key.clone(), point.to_string()))
                    .map(|buffer| buffer.iter().cloned().collect())
            })
            .unwrap_or_default()
    }

    /// 所有设备上同名点位的最近值（时间升序），用于存储不可用时的历史回退
    pub fn recent_for_point(&self, point: &str) -> Vec<RawSample> {
        let Ok(inner) = self.inner.read() else {
            return Vec::new();
        };
        let mut merged: Vec<RawSample> = inner
            .recent
            .iter()
            .filter(|((_, id), _)| id == point)
            .flat_map(|(_, buffer)| buffer.iter().cloned())
            .collect();
        merged.sort_by_key(|sample| sample.ts_ms);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{PointReading, ReadOutcome};

    fn snapshot(ts_ms: i64, value: f64) -> Snapshot {
        let mut values = ReadOutcome::new();
        values.insert("D430".to_string(), PointReading::Value(value));
        Snapshot::success(values, ts_ms)
    }

    #[test]
    fn ring_buffer_keeps_last_n() {
        let cache = SnapshotCache::new(3);
        let key = DeviceKey::new("plc-1", 5000);
        let live = CancellationToken::new();
        for i in 0..5 {
            let sample = RawSample::new(i, "D430", i as f64, None);
            cache.record_tick(&key, &live, snapshot(i, i as f64), &[sample]);
        }
        let recent = cache.recent_values(&key, "D430");
        let ts: Vec<i64> = recent.iter().map(|sample| sample.ts_ms).collect();
        assert_eq!(ts, vec![2, 3, 4]);
        assert_eq!(cache.get(&key).unwrap().last_update_ms, 4);
    }

    #[test]
    fn recent_for_point_merges_devices() {
        let cache = SnapshotCache::new(5);
        let a = DeviceKey::new("plc-a", 5000);
        let b = DeviceKey::new("plc-b", 5000);
        let live = CancellationToken::new();
        cache.record_tick(&a, &live, snapshot(2, 1.0), &[RawSample::new(2, "D430", 1.0, None)]);
        cache.record_tick(&b, &live, snapshot(1, 2.0), &[RawSample::new(1, "D430", 2.0, None)]);

        let merged = cache.recent_for_point("D430");
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].ts_ms, 1);

        cache.remove(&a);
        assert!(cache.get(&a).is_none());
        assert_eq!(cache.recent_for_point("D430").len(), 1);
    }

    #[test]
    fn late_tick_after_stop_is_dropped() {
        let cache = SnapshotCache::new(3);
        let key = DeviceKey::new("plc-1", 5000);
        let live = CancellationToken::new();
        cache.record_tick(&key, &live, snapshot(1, 1.0), &[RawSample::new(1, "D430", 1.0, None)]);

        live.cancel();
        cache.remove(&key);
        cache.record_tick(&key, &live, snapshot(2, 2.0), &[RawSample::new(2, "D430", 2.0, None)]);
        assert!(cache.get(&key).is_none());
        assert!(cache.recent_values(&key, "D430").is_empty());
    }
}
