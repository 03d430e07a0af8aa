//! 稳定的 DTO 与 API 响应契约。
//!
//! 字段统一 camelCase；点位值以 `value + available` 成对出现，
//! 不可用点位的 `value` 为 null，不会填 0。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 轮询注册请求体。
///
/// `config` 为带 `protocol` 标签的协议配置，如 `{"protocol":"mc","network_no":0}`。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPollingRequest {
    pub host: String,
    pub port: u16,
    pub points: Vec<String>,
    pub interval_ms: u64,
    pub config: Value,
    /// 是否把协议写入设备键（同一 host:port 上区分不同协议）
    #[serde(default)]
    pub qualify_protocol: bool,
    pub energy_point: Option<String>,
    #[serde(default)]
    pub treat_all_zero_as_failure: bool,
}

/// 轮询注册结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPollingResponse {
    pub device: String,
    /// false 表示该设备已在轮询，本次注册无效果
    pub registered: bool,
}

/// 临时读取请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadPointsRequest {
    pub host: String,
    pub port: u16,
    pub config: Value,
    pub points: Vec<String>,
    /// 与设备路由的 `?protocol=` 相同，用于命中协议限定的设备键
    #[serde(default)]
    pub protocol: Option<String>,
}

/// 临时写入请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritePointRequest {
    pub host: String,
    pub port: u16,
    pub config: Value,
    pub point: String,
    pub value: f64,
    #[serde(default)]
    pub protocol: Option<String>,
}

/// 单点读数。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointValueDto {
    pub point_id: String,
    pub value: Option<f64>,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PointValueDto {
    pub fn value(point_id: impl Into<String>, value: f64) -> Self {
        Self {
            point_id: point_id.into(),
            value: Some(value),
            available: true,
            error: None,
        }
    }

    pub fn unavailable(point_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            point_id: point_id.into(),
            value: None,
            available: false,
            error: Some(reason.into()),
        }
    }
}

/// 设备快照。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDto {
    pub device: String,
    pub values: Vec<PointValueDto>,
    pub last_update_ms: i64,
    pub error: Option<String>,
    pub connected: bool,
}

/// 轮询统计。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingStatisticsDto {
    pub health: String,
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub consecutive_failures: u32,
    pub zero_responses: u64,
    pub skipped_ticks: u64,
    pub last_success_ms: Option<i64>,
    pub last_failure_ms: Option<i64>,
    pub last_error: Option<String>,
}

/// 已注册设备。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    pub device: String,
    pub host: String,
    pub port: u16,
    pub protocol: String,
    pub points: Vec<String>,
    pub interval_ms: u64,
    pub energy_point: Option<String>,
    pub statistics: PollingStatisticsDto,
}

/// 原始采样。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleDto {
    pub ts_ms: i64,
    pub point_id: String,
    pub value: f64,
    pub label: Option<String>,
}

/// 单日 24 小时数据。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayDataDto {
    /// YYYY-MM-DD
    pub date: String,
    pub hours: Vec<f64>,
    pub last_update_ms: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTotalDto {
    pub date: String,
    pub total: f64,
}

/// 能耗汇总。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergySummaryDto {
    pub today: f64,
    pub weekly: f64,
    pub monthly: f64,
    pub daily_totals: Vec<DailyTotalDto>,
}

/// 删除 / 裁剪结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResultDto {
    pub deleted: u64,
}

/// 服务健康状态。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDto {
    pub status: String,
    pub polled_devices: usize,
    pub open_connections: usize,
}

/// 采集计数器快照。
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
    pub poll_attempts: u64,
    pub poll_successes: u64,
    pub poll_failures: u64,
    pub poll_zero_responses: u64,
    pub skipped_ticks: u64,
    pub poll_latency_ms_avg: f64,
    pub samples_written: u64,
    pub storage_write_failures: u64,
    pub energy_upserts: u64,
    pub adhoc_reads: u64,
    pub adhoc_writes: u64,
    pub reaper_evictions: u64,
}
