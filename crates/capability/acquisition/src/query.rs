//! 聚合与查询层
//!
//! 只读取存储（点位历史在存储不可用时回退到内存环形缓冲）。
//! 存储错误记录日志后返回空结果或默认值，不向调用方抛出。

use crate::energy::EnergyAccumulator;
use crate::snapshot::SnapshotCache;
use chrono::{Duration as ChronoDuration, Local, NaiveDate, TimeZone};
use domain::{DailyAggregateRow, HOURS_PER_DAY, RawSample, now_epoch_ms};
use ems_storage::{DailyAggregateStore, SampleQuery, SampleStore, TimeOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// 能耗汇总窗口天数
pub const SUMMARY_WINDOW_DAYS: i64 = 30;
const WEEK_DAYS: i64 = 7;
const MS_PER_HOUR: i64 = 3_600_000;
const MS_PER_DAY: i64 = 86_400_000;

/// 点位历史窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryWindow {
    /// 最近 N 小时
    HoursBack(u32),
    /// 最近 N 条
    Limit(u32),
}

/// 单日 24 小时数据（缺失小时为 0）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayData {
    pub date: NaiveDate,
    pub hours: [f64; HOURS_PER_DAY],
    pub last_update_ms: i64,
}

impl From<DailyAggregateRow> for DayData {
    fn from(row: DailyAggregateRow) -> Self {
        Self {
            date: row.date,
            hours: row.hours,
            last_update_ms: row.updated_at_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: f64,
}

/// 能耗汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergySummary {
    pub today: f64,
    /// 含今天在内的最近 7 天
    pub weekly: f64,
    /// 含今天在内的最近 30 天
    pub monthly: f64,
    /// 30 天逐日合计，日期升序，无记录的日期为 0
    pub daily_totals: Vec<DailyTotal>,
}

/// 本地日期的零点（毫秒）
///
/// 零点落在夏令时跳变的空档内时，取空档之后第一个有效时刻。
pub fn start_of_day_ms(date: NaiveDate) -> i64 {
    start_of_day_in(&Local, date)
}

/// 本地日期的最后一毫秒（次日零点前一毫秒）
pub fn end_of_day_ms(date: NaiveDate) -> i64 {
    end_of_day_in(&Local, date)
}

/// 跳变空档最长按一天搜索
const GAP_SEARCH_MINUTES: i64 = 24 * 60;

fn start_of_day_in<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> i64 {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    (0..=GAP_SEARCH_MINUTES)
        .map(|minutes| midnight + ChronoDuration::minutes(minutes))
        .find_map(|candidate| tz.from_local_datetime(&candidate).earliest())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| midnight.and_utc().timestamp_millis())
}

fn end_of_day_in<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> i64 {
    match date.succ_opt() {
        Some(next) => start_of_day_in(tz, next) - 1,
        None => {
            let last = date.and_hms_milli_opt(23, 59, 59, 999).unwrap_or_default();
            tz.from_local_datetime(&last)
                .earliest()
                .map(|dt| dt.timestamp_millis())
                .unwrap_or_else(|| last.and_utc().timestamp_millis())
        }
    }
}

pub struct QueryService {
    samples: Arc<dyn SampleStore>,
    daily: Arc<dyn DailyAggregateStore>,
    cache: Arc<SnapshotCache>,
    /// 删除聚合行后需丢弃其缓存的当天行
    energy: Arc<EnergyAccumulator>,
}

impl QueryService {
    pub fn new(
        samples: Arc<dyn SampleStore>,
        daily: Arc<dyn DailyAggregateStore>,
        cache: Arc<SnapshotCache>,
        energy: Arc<EnergyAccumulator>,
    ) -> Self {
        Self {
            samples,
            daily,
            cache,
            energy,
        }
    }

    /// 单日 24 小时数组，无记录时全零
    pub async fn get_day_data(&self, date: NaiveDate) -> DayData {
        match self.daily.get_day(date).await {
            Ok(Some(row)) => row.into(),
            Ok(None) => DailyAggregateRow::empty(date).into(),
            Err(err) => {
                error!(target: "ems.acquisition", date = %date, error = %err, "day_data_query_failed");
                DailyAggregateRow::empty(date).into()
            }
        }
    }

    /// 区间内已存在的行（不补零），日期升序
    pub async fn get_date_range_data(&self, from: NaiveDate, to: NaiveDate) -> Vec<DayData> {
        if from > to {
            warn!(target: "ems.acquisition", from = %from, to = %to, "date_range_inverted");
            return Vec::new();
        }
        match self.daily.get_days(from, to).await {
            Ok(rows) => rows.into_iter().map(DayData::from).collect(),
            Err(err) => {
                error!(target: "ems.acquisition", error = %err, "date_range_query_failed");
                Vec::new()
            }
        }
    }

    /// 以本地今天为窗口终点的能耗汇总
    pub async fn get_energy_summary(&self) -> EnergySummary {
        self.energy_summary_at(Local::now().date_naive()).await
    }

    /// 以指定日期为窗口终点的能耗汇总：逐日遍历 30 天，缺失日期计 0
    pub async fn energy_summary_at(&self, today: NaiveDate) -> EnergySummary {
        let start = today - ChronoDuration::days(SUMMARY_WINDOW_DAYS - 1);
        let rows = match self.daily.get_days(start, today).await {
            Ok(rows) => rows,
            Err(err) => {
                error!(target: "ems.acquisition", error = %err, "energy_summary_query_failed");
                Vec::new()
            }
        };

        let daily_totals: Vec<DailyTotal> = (0..SUMMARY_WINDOW_DAYS)
            .map(|offset| {
                let date = start + ChronoDuration::days(offset);
                let total = rows
                    .iter()
                    .find(|row| row.date == date)
                    .map(DailyAggregateRow::total)
                    .unwrap_or(0.0);
                DailyTotal { date, total }
            })
            .collect();

        let week_start = today - ChronoDuration::days(WEEK_DAYS - 1);
        let today_total = daily_totals
            .last()
            .map(|entry| entry.total)
            .unwrap_or(0.0);
        let weekly = daily_totals
            .iter()
            .filter(|entry| entry.date >= week_start)
            .map(|entry| entry.total)
            .sum();
        let monthly = daily_totals.iter().map(|entry| entry.total).sum();

        EnergySummary {
            today: today_total,
            weekly,
            monthly,
            daily_totals,
        }
    }

    /// 点位历史（时间升序）
    pub async fn get_point_history(&self, point: &str, window: HistoryWindow) -> Vec<RawSample> {
        self.point_history_at(point, window, now_epoch_ms()).await
    }

    pub async fn point_history_at(
        &self,
        point: &str,
        window: HistoryWindow,
        now_ms: i64,
    ) -> Vec<RawSample> {
        let query = match window {
            HistoryWindow::HoursBack(hours) => SampleQuery {
                from_ms: Some(now_ms - i64::from(hours) * MS_PER_HOUR),
                ..SampleQuery::for_point(point)
            },
            HistoryWindow::Limit(limit) => SampleQuery {
                order: TimeOrder::Desc,
                limit: Some(i64::from(limit)),
                ..SampleQuery::for_point(point)
            },
        };

        match self.samples.query_samples(&query).await {
            Ok(mut samples) => {
                if matches!(query.order, TimeOrder::Desc) {
                    samples.reverse();
                }
                samples
            }
            Err(err) => {
                warn!(
                    target: "ems.acquisition",
                    point = point,
                    error = %err,
                    "point_history_fallback_to_memory"
                );
                let mut recent = self.cache.recent_for_point(point);
                match window {
                    HistoryWindow::HoursBack(_) => {
                        let from = query.from_ms.unwrap_or(i64::MIN);
                        recent.retain(|sample| sample.ts_ms >= from);
                    }
                    HistoryWindow::Limit(limit) => {
                        let keep = limit as usize;
                        if recent.len() > keep {
                            recent.drain(..recent.len() - keep);
                        }
                    }
                }
                recent
            }
        }
    }

    /// 删除 [from 零点, to 末毫秒] 内的原始采样；未指定点位时同时删除区间内的每日行。
    /// 返回删除总数
    pub async fn delete_by_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        point: Option<&str>,
    ) -> u64 {
        if from > to {
            warn!(target: "ems.acquisition", from = %from, to = %to, "date_range_inverted");
            return 0;
        }
        let from_ms = start_of_day_ms(from);
        let to_ms = end_of_day_ms(to);

        let samples = match self.samples.delete_samples(from_ms, to_ms, point).await {
            Ok(count) => count,
            Err(err) => {
                error!(target: "ems.acquisition", error = %err, "sample_range_delete_failed");
                0
            }
        };
        let days = if point.is_none() {
            let deleted = self.daily.delete_days(from, to).await;
            self.energy.invalidate_days(from, to).await;
            match deleted {
                Ok(count) => count,
                Err(err) => {
                    error!(target: "ems.acquisition", error = %err, "daily_range_delete_failed");
                    0
                }
            }
        } else {
            0
        };

        info!(
            target: "ems.acquisition",
            from = %from,
            to = %to,
            point = point.unwrap_or("*"),
            samples = samples,
            days = days,
            "range_deleted"
        );
        samples + days
    }

    /// 保留期裁剪：删除早于 `days` 天的原始采样（每日行不受影响）
    pub async fn cleanup_older_than(&self, days: u32) -> u64 {
        self.cleanup_before(days, now_epoch_ms()).await
    }

    pub async fn cleanup_before(&self, days: u32, now_ms: i64) -> u64 {
        if days == 0 {
            warn!(target: "ems.acquisition", "retention_zero_days_ignored");
            return 0;
        }
        let cutoff_ms = now_ms - i64::from(days) * MS_PER_DAY;
        match self.samples.delete_samples_before(cutoff_ms).await {
            Ok(count) => {
                info!(
                    target: "ems.acquisition",
                    days = days,
                    removed = count,
                    "retention_cleanup"
                );
                count
            }
            Err(err) => {
                error!(target: "ems.acquisition", error = %err, "retention_cleanup_failed");
                0
            }
        }
    }
}
