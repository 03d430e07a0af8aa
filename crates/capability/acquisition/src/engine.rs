//! 采集引擎门面
//!
//! 进程启动时构造一次，持有注册表、快照缓存、统计簿、能耗累计与查询服务，
//! 以 `Arc<Engine>` 注入 HTTP 层。

use crate::energy::EnergyAccumulator;
use crate::error::AcquisitionError;
use crate::query::{DayData, EnergySummary, HistoryWindow, QueryService};
use crate::registry::ConnectionRegistry;
use crate::scheduler::{PollContext, PollRegistration, PollingScheduler};
use crate::snapshot::SnapshotCache;
use crate::stats::StatisticsBook;
use chrono::NaiveDate;
use domain::{DeviceHealth, DeviceKey, PollingStatistics, RawSample, ReadOutcome, Snapshot};
use ems_protocol::{DriverFactory, ProtocolConfig};
use ems_storage::{DailyAggregateStore, SampleStore};
use ems_telemetry::{record_adhoc_read, record_adhoc_write};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// 引擎参数
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub idle_timeout: Duration,
    pub ring_buffer_size: usize,
    pub offline_after_failures: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            ring_buffer_size: 20,
            offline_after_failures: 3,
        }
    }
}

/// 已注册设备的状态视图
#[derive(Debug, Clone)]
pub struct DeviceStatus {
    pub registration: PollRegistration,
    pub health: DeviceHealth,
    pub statistics: PollingStatistics,
}

pub struct Engine {
    registry: Arc<ConnectionRegistry>,
    cache: Arc<SnapshotCache>,
    stats: Arc<StatisticsBook>,
    scheduler: PollingScheduler,
    query: QueryService,
}

impl Engine {
    pub fn new(
        factory: Arc<dyn DriverFactory>,
        samples: Arc<dyn SampleStore>,
        daily: Arc<dyn DailyAggregateStore>,
        settings: EngineSettings,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(factory, settings.idle_timeout));
        let cache = Arc::new(SnapshotCache::new(settings.ring_buffer_size));
        let stats = Arc::new(StatisticsBook::new(settings.offline_after_failures));
        let energy = Arc::new(EnergyAccumulator::new(daily.clone()));
        let ctx = Arc::new(PollContext {
            registry: registry.clone(),
            cache: cache.clone(),
            stats: stats.clone(),
            samples: samples.clone(),
            energy: energy.clone(),
        });
        Self {
            registry,
            cache: cache.clone(),
            stats,
            scheduler: PollingScheduler::new(ctx),
            query: QueryService::new(samples, daily, cache, energy),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn query(&self) -> &QueryService {
        &self.query
    }

    /// 注册轮询；返回 `true` 表示新启动了轮询任务，`false` 表示该键已注册
    pub async fn register_polling(
        &self,
        registration: PollRegistration,
    ) -> Result<bool, AcquisitionError> {
        self.scheduler.register_polling(registration).await
    }

    /// 停止轮询并清理快照与统计
    pub async fn stop_polling(&self, key: &DeviceKey) -> bool {
        let stopped = self.scheduler.stop_polling(key).await;
        // 任务令牌已取消，之后到达的 tick 不会重建这里清理的条目
        if stopped {
            self.cache.remove(key);
            self.stats.remove(key);
        }
        stopped
    }

    pub async fn is_registered(&self, key: &DeviceKey) -> bool {
        self.scheduler.is_registered(key).await
    }

    pub fn get_snapshot(&self, key: &DeviceKey) -> Option<Snapshot> {
        self.cache.get(key)
    }

    pub fn statistics(&self, key: &DeviceKey) -> Option<PollingStatistics> {
        self.stats.get(key)
    }

    pub fn health(&self, key: &DeviceKey) -> Option<DeviceHealth> {
        self.stats.health(key)
    }

    pub fn recent_values(&self, key: &DeviceKey, point: &str) -> Vec<RawSample> {
        self.cache.recent_values(key, point)
    }

    /// 已注册设备及其统计（按键排序）
    pub async fn registered_devices(&self) -> Vec<DeviceStatus> {
        self.scheduler
            .registered()
            .await
            .into_iter()
            .map(|registration| {
                let statistics = self.stats.get(&registration.key).unwrap_or_default();
                let health = self
                    .stats
                    .health(&registration.key)
                    .unwrap_or(DeviceHealth::Online);
                DeviceStatus {
                    registration,
                    health,
                    statistics,
                }
            })
            .collect()
    }

    fn check_key(key: &DeviceKey) -> Result<(), AcquisitionError> {
        if key.host.trim().is_empty() {
            return Err(AcquisitionError::validation("host is required"));
        }
        if key.port == 0 {
            return Err(AcquisitionError::validation("port is required"));
        }
        Ok(())
    }

    /// 临时读取：经注册表租用驱动，与轮询共用同一链路
    pub async fn read_points<S: AsRef<str>>(
        &self,
        key: &DeviceKey,
        config: &ProtocolConfig,
        points: &[S],
    ) -> Result<ReadOutcome, AcquisitionError> {
        Self::check_key(key)?;
        if points.is_empty() {
            return Err(AcquisitionError::validation("point set is empty"));
        }
        let resolved = config
            .resolve_points(points)
            .map_err(|e| AcquisitionError::validation(e.to_string()))?;
        let lease = self
            .registry
            .lease(key, config)
            .map_err(|e| AcquisitionError::validation(e.to_string()))?;
        let mut driver = lease.driver().lock().await;
        if driver.kind() != config.kind() {
            return Err(AcquisitionError::validation(format!(
                "device {} is bound to {} driver",
                key,
                driver.kind()
            )));
        }
        record_adhoc_read();
        let outcome = driver.read(&resolved).await?;
        debug!(target: "ems.acquisition", device = %key, points = outcome.len(), "adhoc_read");
        Ok(outcome)
    }

    /// 临时写入单个点位
    pub async fn write_point(
        &self,
        key: &DeviceKey,
        config: &ProtocolConfig,
        point: &str,
        value: f64,
    ) -> Result<(), AcquisitionError> {
        Self::check_key(key)?;
        let resolved = config
            .resolve_points(&[point])
            .map_err(|e| AcquisitionError::validation(e.to_string()))?;
        let Some(target) = resolved.first() else {
            return Err(AcquisitionError::validation("point is required"));
        };
        let lease = self
            .registry
            .lease(key, config)
            .map_err(|e| AcquisitionError::validation(e.to_string()))?;
        let mut driver = lease.driver().lock().await;
        if driver.kind() != config.kind() {
            return Err(AcquisitionError::validation(format!(
                "device {} is bound to {} driver",
                key,
                driver.kind()
            )));
        }
        record_adhoc_write();
        driver.write(target, value).await?;
        info!(
            target: "ems.acquisition",
            device = %key,
            point = %target.id,
            value = value,
            "point_written"
        );
        Ok(())
    }

    pub async fn get_point_history(&self, point: &str, window: HistoryWindow) -> Vec<RawSample> {
        self.query.get_point_history(point, window).await
    }

    pub async fn get_day_data(&self, date: NaiveDate) -> DayData {
        self.query.get_day_data(date).await
    }

    pub async fn get_date_range_data(&self, from: NaiveDate, to: NaiveDate) -> Vec<DayData> {
        self.query.get_date_range_data(from, to).await
    }

    pub async fn get_energy_summary(&self) -> EnergySummary {
        self.query.get_energy_summary().await
    }

    pub async fn delete_by_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        point: Option<&str>,
    ) -> u64 {
        self.query.delete_by_range(from, to, point).await
    }

    pub async fn cleanup_older_than(&self, days: u32) -> u64 {
        self.query.cleanup_older_than(days).await
    }

    pub fn spawn_reaper(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        self.registry.clone().spawn_reaper(interval, cancel)
    }

    /// 周期性保留期裁剪
    pub fn spawn_retention(
        self: &Arc<Self>,
        days: u32,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        engine.cleanup_older_than(days).await;
                    }
                }
            }
            info!(target: "ems.acquisition", "retention_stopped");
        })
    }

    /// 停止全部轮询并断开所有连接
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        self.registry.disconnect_all().await;
        info!(target: "ems.acquisition", "engine_stopped");
    }
}
