//! 能耗累计与跨日切换
//!
//! 能耗点位是单调递增的电度计数器。每次成功读数把增量
//! `当前读数 - 上次读数` 累加到当天当前小时列，然后只写回这一列。
//!
//! - 启动后的第一次读数只建立基线
//! - 增量为负（计数器复位或溢出）时重建基线，本次贡献 0
//! - 每次都重新计算日期；日期变化时从存储重新加载当天行（不存在则为全零行），
//!   前一天的行此后不再写入
//! - 小时列写入成功后才推进内存行与基线；写入失败的增量并入下一次成功写入

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use domain::DailyAggregateRow;
use ems_storage::{DailyAggregateStore, StorageError};
use ems_telemetry::record_energy_upsert;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 一次累计写入的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyUpdate {
    pub date: NaiveDate,
    pub hour: usize,
    pub delta: f64,
    /// 写入后的小时列值
    pub value: f64,
}

#[derive(Default)]
struct EnergyState {
    current: Option<DailyAggregateRow>,
    baseline: Option<f64>,
}

pub struct EnergyAccumulator {
    store: Arc<dyn DailyAggregateStore>,
    state: Mutex<EnergyState>,
}

impl EnergyAccumulator {
    pub fn new(store: Arc<dyn DailyAggregateStore>) -> Self {
        Self {
            store,
            state: Mutex::new(EnergyState::default()),
        }
    }

    /// 当前缓存的当天行（测试与诊断用）
    pub async fn current_row(&self) -> Option<DailyAggregateRow> {
        self.state.lock().await.current.clone()
    }

    /// 清除基线（能耗设备停止轮询时调用）
    pub async fn reset_baseline(&self) {
        self.state.lock().await.baseline = None;
    }

    /// 存储中 `[from, to]` 的日期行被删除后丢弃缓存，下一次读数从存储重新加载
    pub async fn invalidate_days(&self, from: NaiveDate, to: NaiveDate) {
        let mut state = self.state.lock().await;
        if state
            .current
            .as_ref()
            .is_some_and(|row| row.date >= from && row.date <= to)
        {
            debug!(target: "ems.acquisition", from = %from, to = %to, "energy_day_cache_evicted");
            state.current = None;
        }
    }

    /// 处理一次计数器读数
    ///
    /// 返回 `Ok(None)` 表示本次只建立了基线。加载或写入当天行失败时
    /// 基线与内存行都不变，增量会在下一次成功时一并计入。
    pub async fn record(
        &self,
        reading: f64,
        now: NaiveDateTime,
        updated_at_ms: i64,
    ) -> Result<Option<EnergyUpdate>, StorageError> {
        let mut state = self.state.lock().await;
        let date = now.date();
        let hour = now.hour() as usize;

        let needs_reload = state.current.as_ref().is_none_or(|row| row.date != date);
        if needs_reload {
            let row = self
                .store
                .get_day(date)
                .await?
                .unwrap_or_else(|| DailyAggregateRow::empty(date));
            if let Some(previous) = state.current.as_ref() {
                info!(
                    target: "ems.acquisition",
                    from = %previous.date,
                    to = %date,
                    previous_total = previous.total(),
                    "energy_day_rollover"
                );
            }
            state.current = Some(row);
        }

        let Some(baseline) = state.baseline else {
            state.baseline = Some(reading);
            debug!(target: "ems.acquisition", reading = reading, "energy_baseline_set");
            return Ok(None);
        };
        let delta = reading - baseline;
        if delta < 0.0 {
            state.baseline = Some(reading);
            warn!(
                target: "ems.acquisition",
                previous = baseline,
                reading = reading,
                "energy_counter_reset"
            );
            return Ok(None);
        }

        let Some(current) = state.current.as_ref().map(|row| row.hours[hour]) else {
            return Ok(None);
        };
        let value = current + delta;
        self.store
            .upsert_hour(date, hour, value, updated_at_ms)
            .await?;
        record_energy_upsert();

        state.baseline = Some(reading);
        if let Some(row) = state.current.as_mut() {
            row.hours[hour] = value;
            row.updated_at_ms = updated_at_ms;
        }

        Ok(Some(EnergyUpdate {
            date,
            hour,
            delta,
            value,
        }))
    }
}
