//! HTTP 响应辅助函数和 DTO 转换
//!
//! - 错误响应：bad_request_error, not_found_error, acquisition_error
//! - DTO 转换：snapshot_to_dto, statistics_to_dto, device_to_dto, sample_to_dto,
//!   day_to_dto, summary_to_dto
//!
//! 不可用点位在这里映射为 `value: null, available: false`，不填默认值。

use api_contract::{
    ApiResponse, DailyTotalDto, DayDataDto, DeviceDto, EnergySummaryDto, PointValueDto,
    PollingStatisticsDto, SampleDto, SnapshotDto,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::{
    DeviceHealth, DeviceKey, PointReading, PollingStatistics, RawSample, ReadOutcome, Snapshot,
};
use ems_acquisition::{AcquisitionError, DayData, DeviceStatus, EnergySummary};
use tracing::warn;

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error("INVALID.REQUEST", message.into())),
    )
        .into_response()
}

/// 资源未找到错误响应
pub fn not_found_error() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error("RESOURCE.NOT_FOUND", "not found")),
    )
        .into_response()
}

/// 采集引擎错误响应：校验失败 400，设备不可达 502，其余 500
pub fn acquisition_error(err: AcquisitionError) -> Response {
    let (status, code) = match &err {
        AcquisitionError::Validation(_) => (StatusCode::BAD_REQUEST, "INVALID.REQUEST"),
        AcquisitionError::Protocol(protocol) if protocol.is_transport() => {
            (StatusCode::BAD_GATEWAY, "DEVICE.UNREACHABLE")
        }
        AcquisitionError::Protocol(_) => (StatusCode::BAD_GATEWAY, "DEVICE.REJECTED"),
        AcquisitionError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL.ERROR"),
    };
    warn!(target: "ems.collector", code = code, error = %err, "request_failed");
    (
        status,
        Json(ApiResponse::<()>::error(code, err.to_string())),
    )
        .into_response()
}

pub fn health_label(health: DeviceHealth) -> &'static str {
    match health {
        DeviceHealth::Online => "online",
        DeviceHealth::Degraded => "degraded",
        DeviceHealth::Offline => "offline",
    }
}

pub fn readings_to_dto(values: &ReadOutcome) -> Vec<PointValueDto> {
    values
        .iter()
        .map(|(point, reading)| match reading {
            PointReading::Value(value) => PointValueDto::value(point, *value),
            PointReading::Unavailable(reason) => PointValueDto::unavailable(point, reason),
        })
        .collect()
}

/// Snapshot 转 SnapshotDto
pub fn snapshot_to_dto(key: &DeviceKey, snapshot: Snapshot) -> SnapshotDto {
    SnapshotDto {
        device: key.to_string(),
        values: readings_to_dto(&snapshot.values),
        last_update_ms: snapshot.last_update_ms,
        error: snapshot.error,
        connected: snapshot.connected,
    }
}

/// PollingStatistics 转 PollingStatisticsDto
pub fn statistics_to_dto(stats: PollingStatistics, health: DeviceHealth) -> PollingStatisticsDto {
    PollingStatisticsDto {
        health: health_label(health).to_string(),
        attempts: stats.attempts,
        successes: stats.successes,
        failures: stats.failures,
        consecutive_failures: stats.consecutive_failures,
        zero_responses: stats.zero_responses,
        skipped_ticks: stats.skipped_ticks,
        last_success_ms: stats.last_success_ms,
        last_failure_ms: stats.last_failure_ms,
        last_error: stats.last_error,
    }
}

/// DeviceStatus 转 DeviceDto
pub fn device_to_dto(status: DeviceStatus) -> DeviceDto {
    let registration = status.registration;
    DeviceDto {
        device: registration.key.to_string(),
        host: registration.key.host.clone(),
        port: registration.key.port,
        protocol: registration.config.kind().to_string(),
        points: registration.points,
        interval_ms: registration.interval_ms,
        energy_point: registration.energy_point,
        statistics: statistics_to_dto(status.statistics, status.health),
    }
}

pub fn sample_to_dto(sample: RawSample) -> SampleDto {
    SampleDto {
        ts_ms: sample.ts_ms,
        point_id: sample.point_id,
        value: sample.value,
        label: sample.label,
    }
}

pub fn day_to_dto(day: DayData) -> DayDataDto {
    DayDataDto {
        date: day.date.format("%Y-%m-%d").to_string(),
        hours: day.hours.to_vec(),
        last_update_ms: day.last_update_ms,
    }
}

pub fn summary_to_dto(summary: EnergySummary) -> EnergySummaryDto {
    EnergySummaryDto {
        today: summary.today,
        weekly: summary.weekly,
        monthly: summary.monthly,
        daily_totals: summary
            .daily_totals
            .into_iter()
            .map(|entry| DailyTotalDto {
                date: entry.date.format("%Y-%m-%d").to_string(),
                total: entry.total,
            })
            .collect(),
    }
}
