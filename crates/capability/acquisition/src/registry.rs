//! 连接注册表
//!
//! 设备键 → 驱动实例。每个键至多一个存活驱动，轮询任务与临时读写共用同一实例，
//! 驱动内部的异步锁串行化同一链路上的请求。
//!
//! 回收规则：空闲超时、无租约、未被调度器固定，三者同时满足才会断开并移除。

use domain::DeviceKey;
use ems_protocol::{DriverFactory, ProtocolConfig, ProtocolDriver, ProtocolError};
use ems_telemetry::record_reaper_evictions;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 共享驱动句柄
pub type SharedDriver = Arc<AsyncMutex<Box<dyn ProtocolDriver>>>;

/// 条目活动状态（租约计数 + 最近使用时间）
#[derive(Debug)]
struct EntryActivity {
    leases: AtomicUsize,
    /// 相对注册表创建时刻的毫秒数
    last_used_ms: AtomicU64,
}

struct RegistryEntry {
    driver: SharedDriver,
    activity: Arc<EntryActivity>,
    pinned: bool,
}

/// 驱动租约：持有期间条目不会被回收，释放时刷新最近使用时间
pub struct DriverLease {
    key: DeviceKey,
    driver: SharedDriver,
    activity: Arc<EntryActivity>,
    epoch: Instant,
}

impl DriverLease {
    pub fn key(&self) -> &DeviceKey {
        &self.key
    }

    pub fn driver(&self) -> &SharedDriver {
        &self.driver
    }
}

impl Drop for DriverLease {
    fn drop(&mut self) {
        self.activity
            .last_used_ms
            .store(elapsed_ms(self.epoch), Ordering::Relaxed);
        self.activity.leases.fetch_sub(1, Ordering::AcqRel);
    }
}

fn elapsed_ms(epoch: Instant) -> u64 {
    Instant::now().duration_since(epoch).as_millis() as u64
}

/// 连接注册表
pub struct ConnectionRegistry {
    factory: Arc<dyn DriverFactory>,
    entries: Mutex<HashMap<DeviceKey, RegistryEntry>>,
    idle_timeout: Duration,
    epoch: Instant,
}

impl ConnectionRegistry {
    pub fn new(factory: Arc<dyn DriverFactory>, idle_timeout: Duration) -> Self {
        Self {
            factory,
            entries: Mutex::new(HashMap::new()),
            idle_timeout,
            epoch: Instant::now(),
        }
    }

    fn with_entry<T>(
        &self,
        key: &DeviceKey,
        config: &ProtocolConfig,
        f: impl FnOnce(&mut RegistryEntry) -> T,
    ) -> Result<T, ProtocolError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ProtocolError::Connection("registry lock poisoned".to_string()))?;
        let now_ms = elapsed_ms(self.epoch);
        if !entries.contains_key(key) {
            let driver = self.factory.create(key, config)?;
            debug!(
                target: "ems.acquisition",
                device = %key,
                protocol = %config.kind(),
                "driver_created"
            );
            entries.insert(
                key.clone(),
                RegistryEntry {
                    driver: Arc::new(AsyncMutex::new(driver)),
                    activity: Arc::new(EntryActivity {
                        leases: AtomicUsize::new(0),
                        last_used_ms: AtomicU64::new(now_ms),
                    }),
                    pinned: false,
                },
            );
        }
        let entry = entries
            .get_mut(key)
            .ok_or_else(|| ProtocolError::Connection("registry entry vanished".to_string()))?;
        entry.activity.last_used_ms.store(now_ms, Ordering::Relaxed);
        Ok(f(entry))
    }

    /// 返回已有驱动（刷新最近使用时间），不存在时通过工厂创建
    pub fn get_or_create(
        &self,
        key: &DeviceKey,
        config: &ProtocolConfig,
    ) -> Result<SharedDriver, ProtocolError> {
        self.with_entry(key, config, |entry| entry.driver.clone())
    }

    /// 获取驱动并加租约
    pub fn lease(
        &self,
        key: &DeviceKey,
        config: &ProtocolConfig,
    ) -> Result<DriverLease, ProtocolError> {
        self.with_entry(key, config, |entry| {
            entry.activity.leases.fetch_add(1, Ordering::AcqRel);
            DriverLease {
                key: key.clone(),
                driver: entry.driver.clone(),
                activity: entry.activity.clone(),
                epoch: self.epoch,
            }
        })
    }

    /// 固定驱动（调度器持有期间不参与空闲回收）
    pub fn pin(
        &self,
        key: &DeviceKey,
        config: &ProtocolConfig,
    ) -> Result<SharedDriver, ProtocolError> {
        self.with_entry(key, config, |entry| {
            entry.pinned = true;
            entry.driver.clone()
        })
    }

    /// 取消固定，驱动转为可回收；条目不存在时返回 false
    pub fn release(&self, key: &DeviceKey) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            return false;
        };
        match entries.get_mut(key) {
            Some(entry) => {
                entry.pinned = false;
                entry
                    .activity
                    .last_used_ms
                    .store(elapsed_ms(self.epoch), Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// 立即移除并断开
    pub async fn remove(&self, key: &DeviceKey) -> bool {
        let removed = match self.entries.lock() {
            Ok(mut entries) => entries.remove(key),
            Err(_) => None,
        };
        match removed {
            Some(entry) => {
                entry.driver.lock().await.disconnect().await;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: &DeviceKey) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    pub fn is_pinned(&self, key: &DeviceKey) -> bool {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).map(|entry| entry.pinned))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 回收一轮：断开并移除空闲超时、无租约、未固定的条目，返回回收数
    pub async fn sweep_idle(&self) -> usize {
        let now_ms = elapsed_ms(self.epoch);
        let idle_ms = self.idle_timeout.as_millis() as u64;
        let evicted: Vec<(DeviceKey, SharedDriver)> = {
            let Ok(mut entries) = self.entries.lock() else {
                warn!(target: "ems.acquisition", "registry_lock_poisoned");
                return 0;
            };
            let expired: Vec<DeviceKey> = entries
                .iter()
                .filter(|(_, entry)| {
                    let last_used = entry.activity.last_used_ms.load(Ordering::Relaxed);
                    !entry.pinned
                        && entry.activity.leases.load(Ordering::Acquire) == 0
                        && now_ms.saturating_sub(last_used) >= idle_ms
                })
                .map(|(key, _)| key.clone())
                .collect();
            expired
                .into_iter()
                .filter_map(|key| entries.remove(&key).map(|entry| (key, entry.driver)))
                .collect()
        };

        for (key, driver) in &evicted {
            driver.lock().await.disconnect().await;
            info!(target: "ems.acquisition", device = %key, "driver_evicted_idle");
        }
        if !evicted.is_empty() {
            record_reaper_evictions(evicted.len() as u64);
        }
        evicted.len()
    }

    /// 断开并清空全部条目（进程退出时调用）
    pub async fn disconnect_all(&self) {
        let drained: Vec<SharedDriver> = match self.entries.lock() {
            Ok(mut entries) => entries.drain().map(|(_, entry)| entry.driver).collect(),
            Err(_) => Vec::new(),
        };
        for driver in drained {
            driver.lock().await.disconnect().await;
        }
    }

    /// 启动固定周期的回收任务，取消令牌触发后退出
    pub fn spawn_reaper(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = self.sweep_idle().await;
                        if evicted > 0 {
                            debug!(
                                target: "ems.acquisition",
                                evicted = evicted,
                                remaining = self.len(),
                                "reaper_sweep"
                            );
                        }
                    }
                }
            }
            info!(target: "ems.acquisition", "reaper_stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ems_protocol::{SimulatedConfig, StandardDriverFactory};

    fn registry(idle: Duration) -> ConnectionRegistry {
        ConnectionRegistry::new(Arc::new(StandardDriverFactory::default()), idle)
    }

    fn simulated() -> ProtocolConfig {
        ProtocolConfig::Simulated(SimulatedConfig::default())
    }

    #[tokio::test]
    async fn get_or_create_reuses_instance() {
        let registry = registry(Duration::from_secs(60));
        let key = DeviceKey::new("plc-1", 502);
        let first = registry.get_or_create(&key, &simulated()).unwrap();
        let second = registry.get_or_create(&key, &simulated()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_respects_pin_and_lease() {
        let registry = registry(Duration::from_secs(10));
        let pinned = DeviceKey::new("plc-pinned", 502);
        let leased = DeviceKey::new("plc-leased", 502);
        let idle = DeviceKey::new("plc-idle", 502);
        registry.pin(&pinned, &simulated()).unwrap();
        let lease = registry.lease(&leased, &simulated()).unwrap();
        registry.get_or_create(&idle, &simulated()).unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(registry.sweep_idle().await, 0);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(registry.sweep_idle().await, 1);
        assert!(!registry.contains(&idle));
        assert!(registry.contains(&pinned));
        assert!(registry.contains(&leased));

        // 释放租约刷新最近使用时间，需再等一个完整的空闲窗口
        drop(lease);
        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(registry.sweep_idle().await, 0);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(registry.sweep_idle().await, 1);

        assert!(registry.release(&pinned));
        assert!(!registry.is_pinned(&pinned));
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(registry.sweep_idle().await, 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn remove_disconnects() {
        let registry = registry(Duration::from_secs(60));
        let key = DeviceKey::new("plc-1", 502);
        let driver = registry.get_or_create(&key, &simulated()).unwrap();
        driver.lock().await.connect().await.unwrap();
        assert!(registry.remove(&key).await);
        assert!(!driver.lock().await.is_connected());
        assert!(!registry.remove(&key).await);
    }
}
