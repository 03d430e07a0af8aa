//! 存储接口 Trait 定义
//!
//! 定义时序数据的两种形态：
//! - SampleStore：原始采样日志（只追加，按保留期裁剪）
//! - DailyAggregateStore：按日期分桶的 24 小时聚合行（能耗统计）
//!
//! 设计原则：
//! - 所有接口返回 StorageError
//! - 使用 async_trait 支持动态分发

use crate::error::StorageError;
use async_trait::async_trait;
use chrono::NaiveDate;
use domain::{DailyAggregateRow, RawSample};

/// 时间排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeOrder {
    #[default]
    Asc,
    Desc,
}

/// 原始采样查询条件（时间边界均为闭区间）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleQuery {
    pub point_id: String,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
    pub order: TimeOrder,
    pub limit: Option<i64>,
}

impl SampleQuery {
    pub fn for_point(point_id: impl Into<String>) -> Self {
        Self {
            point_id: point_id.into(),
            from_ms: None,
            to_ms: None,
            order: TimeOrder::Asc,
            limit: None,
        }
    }
}

/// 原始采样存储接口
#[async_trait]
pub trait SampleStore: Send + Sync {
    /// 批量追加，返回写入条数
    async fn insert_samples(&self, samples: &[RawSample]) -> Result<usize, StorageError>;

    /// 按点位与时间范围查询
    async fn query_samples(&self, query: &SampleQuery) -> Result<Vec<RawSample>, StorageError>;

    /// 删除 `[from_ms, to_ms]` 内的采样，可按点位过滤
    async fn delete_samples(
        &self,
        from_ms: i64,
        to_ms: i64,
        point_id: Option<&str>,
    ) -> Result<u64, StorageError>;

    /// 删除早于 `cutoff_ms` 的采样（保留期裁剪）
    async fn delete_samples_before(&self, cutoff_ms: i64) -> Result<u64, StorageError>;
}

/// 每日聚合存储接口
///
/// 每个日期至多一行；未写入的小时列为 0。
#[async_trait]
pub trait DailyAggregateStore: Send + Sync {
    async fn get_day(&self, date: NaiveDate) -> Result<Option<DailyAggregateRow>, StorageError>;

    /// 闭区间内已存在的行，按日期升序
    async fn get_days(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyAggregateRow>, StorageError>;

    /// 只写入一个小时列：行不存在时插入（其余列为 0），存在时仅更新该列与更新时间
    async fn upsert_hour(
        &self,
        date: NaiveDate,
        hour: usize,
        value: f64,
        updated_at_ms: i64,
    ) -> Result<(), StorageError>;

    /// 删除闭区间内的行
    async fn delete_days(&self, from: NaiveDate, to: NaiveDate) -> Result<u64, StorageError>;
}
