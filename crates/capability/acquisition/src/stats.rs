//! 轮询统计簿
//!
//! 记录每个设备键的轮询结果，并在健康状态切换时返回新旧状态，供调度器输出告警日志。

use domain::{DeviceHealth, DeviceKey, PollingStatistics};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// 健康状态切换
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthTransition {
    pub from: DeviceHealth,
    pub to: DeviceHealth,
}

pub struct StatisticsBook {
    stats: RwLock<HashMap<DeviceKey, PollingStatistics>>,
    offline_after: u32,
}

impl StatisticsBook {
    /// `offline_after`：连续失败多少次判定为离线
    pub fn new(offline_after: u32) -> Self {
        Self {
            stats: RwLock::new(HashMap::new()),
            offline_after: offline_after.max(1),
        }
    }

    /// `live` 已取消（设备已停止轮询）时不再重建条目；在写锁内检查
    fn update(
        &self,
        key: &DeviceKey,
        live: &CancellationToken,
        f: impl FnOnce(&mut PollingStatistics),
    ) -> Option<HealthTransition> {
        let mut stats = self.stats.write().ok()?;
        if live.is_cancelled() {
            return None;
        }
        let entry = stats.entry(key.clone()).or_default();
        let before = entry.health(self.offline_after);
        f(entry);
        let after = entry.health(self.offline_after);
        (before != after).then_some(HealthTransition {
            from: before,
            to: after,
        })
    }

    pub fn record_success(
        &self,
        key: &DeviceKey,
        live: &CancellationToken,
        ts_ms: i64,
        all_zero: bool,
    ) -> Option<HealthTransition> {
        self.update(key, live, |stats| stats.record_success(ts_ms, all_zero))
    }

    pub fn record_failure(
        &self,
        key: &DeviceKey,
        live: &CancellationToken,
        ts_ms: i64,
        error: &str,
    ) -> Option<HealthTransition> {
        self.update(key, live, |stats| stats.record_failure(ts_ms, error))
    }

    pub fn record_skipped(&self, key: &DeviceKey, live: &CancellationToken, ticks: u64) {
        self.update(key, live, |stats| stats.record_skipped(ticks));
    }

    pub fn get(&self, key: &DeviceKey) -> Option<PollingStatistics> {
        self.stats
            .read()
            .ok()
            .and_then(|stats| stats.get(key).cloned())
    }

    pub fn health(&self, key: &DeviceKey) -> Option<DeviceHealth> {
        self.get(key).map(|stats| stats.health(self.offline_after))
    }

    pub fn remove(&self, key: &DeviceKey) {
        if let Ok(mut stats) = self.stats.write() {
            stats.remove(key);
        }
    }
}
