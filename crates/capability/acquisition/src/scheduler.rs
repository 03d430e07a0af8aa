//! 轮询调度器
//!
//! 每个设备键一个后台任务：
//!
//! ```text
//! interval(Skip) ──► tick ──► lease 驱动 ──► read(全部点位)
//!                                              │
//!            ┌─────────────────────────────────┤
//!            ▼                 ▼               ▼              ▼
//!       快照 + 环形缓冲     原始采样写入     轮询统计      能耗累计
//! ```
//!
//! 任务在 await 完一次轮询后才等待下一个 tick，轮询不会重叠；
//! 轮询耗时超过周期时错过的 tick 被跳过并计数。
//!
//! 注册时的连通性探测不持有任务表锁：探测期间该键记为 pending，
//! 其他设备的注册、停止与查询不受影响。

use crate::energy::EnergyAccumulator;
use crate::error::AcquisitionError;
use crate::registry::ConnectionRegistry;
use crate::snapshot::SnapshotCache;
use crate::stats::StatisticsBook;
use chrono::Local;
use domain::{
    DeviceKey, PointId, PointReading, RawSample, ReadOutcome, Snapshot, all_unavailable, all_zero,
    now_epoch_ms,
};
use ems_protocol::{ProtocolConfig, ProtocolError, ResolvedPoint};
use ems_storage::SampleStore;
use ems_telemetry::{
    record_poll_attempt, record_poll_failure, record_poll_latency_ms, record_poll_success,
    record_poll_zero_response, record_samples_written, record_skipped_ticks,
    record_storage_write_failure,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 轮询注册（创建后不可变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollRegistration {
    pub key: DeviceKey,
    pub points: Vec<PointId>,
    pub interval_ms: u64,
    pub config: ProtocolConfig,
    /// 能耗计数器点位（必须在 `points` 中）
    #[serde(default)]
    pub energy_point: Option<PointId>,
    /// 全部可用点位都为 0 时按失败处理
    #[serde(default)]
    pub treat_all_zero_as_failure: bool,
}

impl PollRegistration {
    pub fn new(
        key: DeviceKey,
        points: Vec<PointId>,
        interval_ms: u64,
        config: ProtocolConfig,
    ) -> Self {
        Self {
            key,
            points,
            interval_ms,
            config,
            energy_point: None,
            treat_all_zero_as_failure: false,
        }
    }

    pub fn with_energy_point(mut self, point: impl Into<PointId>) -> Self {
        self.energy_point = Some(point.into());
        self
    }

    /// 同步校验并解析点位地址
    pub fn validate(&self) -> Result<Vec<ResolvedPoint>, AcquisitionError> {
        if self.key.host.trim().is_empty() {
            return Err(AcquisitionError::validation("host is required"));
        }
        if self.key.port == 0 {
            return Err(AcquisitionError::validation("port is required"));
        }
        if self.points.is_empty() {
            return Err(AcquisitionError::validation("point set is empty"));
        }
        if self.interval_ms == 0 {
            return Err(AcquisitionError::validation("interval must be positive"));
        }
        if let Some(kind) = self.key.protocol {
            if kind != self.config.kind() {
                return Err(AcquisitionError::validation(format!(
                    "device key qualified as {} but config is {}",
                    kind,
                    self.config.kind()
                )));
            }
        }
        let points = self
            .config
            .resolve_points(&self.points)
            .map_err(|e| AcquisitionError::validation(e.to_string()))?;
        if let Some(energy) = &self.energy_point {
            if !points.iter().any(|point| &point.id == energy.trim()) {
                return Err(AcquisitionError::validation(format!(
                    "energy point {} is not in the point set",
                    energy
                )));
            }
        }
        Ok(points)
    }
}

/// 调度器依赖的共享状态
pub struct PollContext {
    pub registry: Arc<ConnectionRegistry>,
    pub cache: Arc<SnapshotCache>,
    pub stats: Arc<StatisticsBook>,
    pub samples: Arc<dyn SampleStore>,
    pub energy: Arc<EnergyAccumulator>,
}

struct DeviceTask {
    registration: Arc<PollRegistration>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct TaskTable {
    running: HashMap<DeviceKey, DeviceTask>,
    /// 探测中的注册：键 → 是否携带能耗点位
    pending: HashMap<DeviceKey, bool>,
}

impl TaskTable {
    fn energy_owner(&self) -> Option<DeviceKey> {
        self.running
            .values()
            .find(|task| task.registration.energy_point.is_some())
            .map(|task| task.registration.key.clone())
            .or_else(|| {
                self.pending
                    .iter()
                    .find(|(_, energy)| **energy)
                    .map(|(key, _)| key.clone())
            })
    }
}

fn lock_table(tasks: &Mutex<TaskTable>) -> MutexGuard<'_, TaskTable> {
    tasks.lock().unwrap_or_else(PoisonError::into_inner)
}

/// pending 占位；注册中途失败或 future 被丢弃时移除占位并解除驱动固定
struct PendingSlot<'a> {
    tasks: &'a Mutex<TaskTable>,
    registry: &'a ConnectionRegistry,
    key: DeviceKey,
    armed: bool,
}

impl PendingSlot<'_> {
    fn commit(&mut self, table: &mut TaskTable) {
        table.pending.remove(&self.key);
        self.armed = false;
    }
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        if self.armed {
            lock_table(self.tasks).pending.remove(&self.key);
            self.registry.release(&self.key);
        }
    }
}

/// 轮询调度器
pub struct PollingScheduler {
    ctx: Arc<PollContext>,
    tasks: Mutex<TaskTable>,
}

impl PollingScheduler {
    pub fn new(ctx: Arc<PollContext>) -> Self {
        Self {
            ctx,
            tasks: Mutex::new(TaskTable::default()),
        }
    }

    fn table(&self) -> MutexGuard<'_, TaskTable> {
        lock_table(&self.tasks)
    }

    /// 注册轮询。已注册的键直接返回 `Ok(false)`（先注册者的周期与点位生效）
    pub async fn register_polling(
        &self,
        registration: PollRegistration,
    ) -> Result<bool, AcquisitionError> {
        let points = registration.validate()?;
        let key = registration.key.clone();
        let has_energy = registration.energy_point.is_some();

        // 同一键的并发注册只有一个进入探测
        let mut slot = {
            let mut table = self.table();
            if table.running.contains_key(&key) || table.pending.contains_key(&key) {
                info!(target: "ems.acquisition", device = %key, "polling_already_registered");
                return Ok(false);
            }
            if has_energy {
                if let Some(owner) = table.energy_owner() {
                    return Err(AcquisitionError::validation(format!(
                        "energy point already registered by {}",
                        owner
                    )));
                }
            }
            table.pending.insert(key.clone(), has_energy);
            PendingSlot {
                tasks: &self.tasks,
                registry: &self.ctx.registry,
                key: key.clone(),
                armed: true,
            }
        };

        let driver = self
            .ctx
            .registry
            .pin(&key, &registration.config)
            .map_err(|e| AcquisitionError::validation(e.to_string()))?;

        if !registration.config.is_simulated() {
            let check = {
                let mut driver = driver.lock().await;
                driver.read(&points[..1]).await
            };
            let failure = match check {
                Ok(outcome) if all_unavailable(&outcome) => Some(describe_unavailable(&outcome)),
                Ok(_) => None,
                Err(err) => Some(err.to_string()),
            };
            if let Some(reason) = failure {
                warn!(
                    target: "ems.acquisition",
                    device = %key,
                    error = %reason,
                    "polling_connectivity_check_failed"
                );
                return Err(AcquisitionError::Protocol(ProtocolError::Connection(reason)));
            }
        }

        let registration = Arc::new(registration);
        let cancel = CancellationToken::new();
        {
            let mut table = self.table();
            slot.commit(&mut table);
            let handle = tokio::spawn(run_device_loop(
                self.ctx.clone(),
                registration.clone(),
                Arc::new(points),
                cancel.clone(),
            ));
            table.running.insert(
                key.clone(),
                DeviceTask {
                    registration: registration.clone(),
                    cancel,
                    handle,
                },
            );
        }
        info!(
            target: "ems.acquisition",
            device = %key,
            points = registration.points.len(),
            interval_ms = registration.interval_ms,
            protocol = %registration.config.kind(),
            "polling_registered"
        );
        Ok(true)
    }

    /// 停止轮询：取消任务（进行中的读取不被打断，结果到达后丢弃），驱动转为可回收
    pub async fn stop_polling(&self, key: &DeviceKey) -> bool {
        let Some(task) = self.table().running.remove(key) else {
            return false;
        };
        task.cancel.cancel();
        self.ctx.registry.release(key);
        if task.registration.energy_point.is_some() {
            self.ctx.energy.reset_baseline().await;
        }
        info!(target: "ems.acquisition", device = %key, "polling_stopped");
        true
    }

    pub async fn is_registered(&self, key: &DeviceKey) -> bool {
        self.table().running.contains_key(key)
    }

    pub async fn registration(&self, key: &DeviceKey) -> Option<PollRegistration> {
        self.table()
            .running
            .get(key)
            .map(|task| task.registration.as_ref().clone())
    }

    /// 已注册的设备（按键排序）
    pub async fn registered(&self) -> Vec<PollRegistration> {
        let mut list: Vec<PollRegistration> = self
            .table()
            .running
            .values()
            .map(|task| task.registration.as_ref().clone())
            .collect();
        list.sort_by(|a, b| a.key.cmp(&b.key));
        list
    }

    /// 停止全部任务并等待退出
    pub async fn shutdown(&self) {
        let drained: Vec<(DeviceKey, DeviceTask)> = self.table().running.drain().collect();
        for (key, task) in drained {
            task.cancel.cancel();
            self.ctx.registry.release(&key);
            if let Err(err) = task.handle.await {
                warn!(target: "ems.acquisition", device = %key, error = %err, "poll_task_join_failed");
            }
        }
        info!(target: "ems.acquisition", "scheduler_stopped");
    }
}

fn describe_unavailable(outcome: &ReadOutcome) -> String {
    let reasons: Vec<String> = outcome
        .iter()
        .filter_map(|(point, reading)| match reading {
            PointReading::Unavailable(reason) => Some(format!("{}: {}", point, reason)),
            PointReading::Value(_) => None,
        })
        .collect();
    if reasons.is_empty() {
        "no points returned".to_string()
    } else {
        format!("all points unavailable ({})", reasons.join("; "))
    }
}

async fn run_device_loop(
    ctx: Arc<PollContext>,
    registration: Arc<PollRegistration>,
    points: Arc<Vec<ResolvedPoint>>,
    cancel: CancellationToken,
) {
    let key = registration.key.clone();
    let period = Duration::from_millis(registration.interval_ms);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        // tick() 返回本次 tick 的计划时刻；迟到多少个周期就跳过了多少个 tick
        let deadline = tokio::select! {
            _ = cancel.cancelled() => break,
            at = ticker.tick() => at,
        };
        let skipped = skipped_ticks(Instant::now().saturating_duration_since(deadline), period);
        if skipped > 0 {
            warn!(
                target: "ems.acquisition",
                device = %key,
                skipped = skipped,
                interval_ms = registration.interval_ms,
                "poll_ticks_skipped"
            );
            ctx.stats.record_skipped(&key, &cancel, skipped);
            record_skipped_ticks(skipped);
        }

        let started = Instant::now();
        let result = poll_once(&ctx, &registration, &points).await;
        if cancel.is_cancelled() {
            debug!(target: "ems.acquisition", device = %key, "poll_result_discarded");
            break;
        }
        record_poll_latency_ms(started.elapsed().as_millis() as u64);
        apply_tick(&ctx, &registration, &points, &cancel, result).await;
    }

    debug!(target: "ems.acquisition", device = %key, "poll_loop_exited");
}

/// 迟到 `lateness` 的 tick 之后、下一个计划时刻之前被跳过的 tick 数
///
/// `MissedTickBehavior::Skip` 把下一个计划时刻推到 `now` 之后的第一个周期点，
/// 所以 (计划时刻, now] 内的每个周期点都被跳过。
fn skipped_ticks(lateness: Duration, period: Duration) -> u64 {
    let period_ms = period.as_millis().max(1);
    (lateness.as_millis() / period_ms) as u64
}

async fn poll_once(
    ctx: &PollContext,
    registration: &PollRegistration,
    points: &[ResolvedPoint],
) -> Result<ReadOutcome, ProtocolError> {
    record_poll_attempt();
    let lease = ctx.registry.lease(&registration.key, &registration.config)?;
    let mut driver = lease.driver().lock().await;
    driver.read(points).await
}

async fn apply_tick(
    ctx: &PollContext,
    registration: &PollRegistration,
    points: &[ResolvedPoint],
    live: &CancellationToken,
    result: Result<ReadOutcome, ProtocolError>,
) {
    let key = &registration.key;
    let ts_ms = now_epoch_ms();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            let message = err.to_string();
            let values = points
                .iter()
                .map(|point| (point.id.clone(), PointReading::Unavailable(message.clone())))
                .collect();
            record_failure(ctx, key, live, ts_ms, values, message);
            return;
        }
    };

    if all_unavailable(&outcome) {
        let message = describe_unavailable(&outcome);
        record_failure(ctx, key, live, ts_ms, outcome, message);
        return;
    }

    let zero = all_zero(&outcome);
    if zero {
        record_poll_zero_response();
        warn!(target: "ems.acquisition", device = %key, "poll_all_zero_response");
        if registration.treat_all_zero_as_failure {
            record_failure(
                ctx,
                key,
                live,
                ts_ms,
                outcome,
                "all points returned zero".to_string(),
            );
            return;
        }
    }

    let label = key.to_string();
    let samples: Vec<RawSample> = outcome
        .iter()
        .filter_map(|(point, reading)| {
            reading
                .value()
                .map(|value| RawSample::new(ts_ms, point.clone(), value, Some(label.clone())))
        })
        .collect();
    let energy_reading = registration
        .energy_point
        .as_ref()
        .and_then(|point| outcome.get(point.trim()))
        .and_then(PointReading::value);

    ctx.cache
        .record_tick(key, live, Snapshot::success(outcome, ts_ms), &samples);
    if let Some(transition) = ctx.stats.record_success(key, live, ts_ms, zero) {
        info!(
            target: "ems.acquisition",
            device = %key,
            from = ?transition.from,
            to = ?transition.to,
            "device_health_changed"
        );
    }
    record_poll_success();

    match ctx.samples.insert_samples(&samples).await {
        Ok(written) => record_samples_written(written as u64),
        Err(err) => {
            record_storage_write_failure();
            error!(
                target: "ems.acquisition",
                device = %key,
                error = %err,
                samples = samples.len(),
                "sample_write_failed"
            );
        }
    }

    if let Some(reading) = energy_reading {
        if let Err(err) = ctx
            .energy
            .record(reading, Local::now().naive_local(), ts_ms)
            .await
        {
            record_storage_write_failure();
            error!(
                target: "ems.acquisition",
                device = %key,
                error = %err,
                "energy_upsert_failed"
            );
        }
    }
}

fn record_failure(
    ctx: &PollContext,
    key: &DeviceKey,
    live: &CancellationToken,
    ts_ms: i64,
    values: ReadOutcome,
    message: String,
) {
    record_poll_failure();
    warn!(target: "ems.acquisition", device = %key, error = %message, "poll_tick_failed");
    if let Some(transition) = ctx.stats.record_failure(key, live, ts_ms, &message) {
        warn!(
            target: "ems.acquisition",
            device = %key,
            from = ?transition.from,
            to = ?transition.to,
            "device_health_changed"
        );
    }
    ctx.cache.record_tick(
        key,
        live,
        Snapshot {
            values,
            last_update_ms: ts_ms,
            error: Some(message),
            connected: false,
        },
        &[],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use ems_protocol::{ModbusConfig, SimulatedConfig};

    fn modbus_registration(points: Vec<&str>) -> PollRegistration {
        PollRegistration::new(
            DeviceKey::new("10.0.0.5", 502),
            points.into_iter().map(str::to_string).collect(),
            1000,
            ProtocolConfig::Modbus(ModbusConfig::default()),
        )
    }

    #[test]
    fn validation_rejects_bad_registrations() {
        assert!(modbus_registration(vec![]).validate().is_err());
        assert!(modbus_registration(vec!["abc"]).validate().is_err());

        let mut zero_interval = modbus_registration(vec!["50"]);
        zero_interval.interval_ms = 0;
        assert!(zero_interval.validate().is_err());

        let mut no_host = modbus_registration(vec!["50"]);
        no_host.key.host = String::new();
        assert!(no_host.validate().is_err());

        let bad_energy = modbus_registration(vec!["50"]).with_energy_point("51");
        assert!(bad_energy.validate().is_err());

        let ok = modbus_registration(vec!["50", "51"]).with_energy_point("51");
        assert_eq!(ok.validate().unwrap().len(), 2);
    }

    #[test]
    fn validation_rejects_qualifier_mismatch() {
        let registration = PollRegistration::new(
            DeviceKey::with_protocol("10.0.0.5", 502, domain::ProtocolKind::Mc),
            vec!["temp".to_string()],
            1000,
            ProtocolConfig::Simulated(SimulatedConfig::default()),
        );
        assert!(matches!(
            registration.validate(),
            Err(AcquisitionError::Validation(_))
        ));
    }

    #[test]
    fn skipped_tick_count() {
        let period = Duration::from_millis(1000);
        assert_eq!(skipped_ticks(Duration::ZERO, period), 0);
        assert_eq!(skipped_ticks(Duration::from_millis(999), period), 0);
        // 计划 1000 的 tick 在 2500 才触发：2000 被跳过，下一次 3000
        assert_eq!(skipped_ticks(Duration::from_millis(1500), period), 1);
        assert_eq!(skipped_ticks(Duration::from_millis(2000), period), 2);
    }

    #[test]
    fn registration_deserializes_with_defaults() {
        let json = r#"{
            "key": {"host": "10.0.0.5", "port": 5000, "protocol": "mc"},
            "points": ["D430", "D432:2"],
            "interval_ms": 1000,
            "config": {"protocol": "mc"}
        }"#;
        let registration: PollRegistration = serde_json::from_str(json).unwrap();
        assert_eq!(registration.energy_point, None);
        assert!(!registration.treat_all_zero_as_failure);
        assert_eq!(registration.validate().unwrap().len(), 2);
    }
}
