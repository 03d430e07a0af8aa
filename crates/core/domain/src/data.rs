use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 每日聚合行的小时列数。
pub const HOURS_PER_DAY: usize = 24;

/// 原始采样记录（只追加，不可变）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub ts_ms: i64,
    pub point_id: String,
    pub value: f64,
    /// 可选标签（采集路径写入设备键）
    pub label: Option<String>,
}

impl RawSample {
    pub fn new(ts_ms: i64, point_id: impl Into<String>, value: f64, label: Option<String>) -> Self {
        Self {
            ts_ms,
            point_id: point_id.into(),
            value,
            label,
        }
    }
}

/// 按日历日期分桶的小时聚合行。
///
/// 未写入的小时列为 0，与真实的 0 读数无法区分。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregateRow {
    pub date: NaiveDate,
    pub hours: [f64; HOURS_PER_DAY],
    pub updated_at_ms: i64,
}

impl DailyAggregateRow {
    /// 全零行（日期尚无存储记录时使用）。
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            hours: [0.0; HOURS_PER_DAY],
            updated_at_ms: 0,
        }
    }

    /// 24 列之和。
    pub fn total(&self) -> f64 {
        self.hours.iter().sum()
    }

    pub fn hour(&self, hour: usize) -> f64 {
        self.hours.get(hour).copied().unwrap_or(0.0)
    }
}
