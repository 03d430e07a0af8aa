//! 健康检查与采集计数器
//!
//! - GET /health
//! - GET /metrics

use crate::AppState;
use api_contract::{ApiResponse, HealthDto, MetricsSnapshotDto};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ems_telemetry::metrics;

pub async fn health(State(state): State<AppState>) -> Response {
    let polled_devices = state.engine.registered_devices().await.len();
    let open_connections = state.engine.registry().len();
    (
        StatusCode::OK,
        Json(ApiResponse::success(HealthDto {
            status: "ok".to_string(),
            polled_devices,
            open_connections,
        })),
    )
        .into_response()
}

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    let poll_latency_ms_avg = if snapshot.poll_latency_ms_count == 0 {
        0.0
    } else {
        snapshot.poll_latency_ms_total as f64 / snapshot.poll_latency_ms_count as f64
    };
    (
        StatusCode::OK,
        Json(ApiResponse::success(MetricsSnapshotDto {
            poll_attempts: snapshot.poll_attempts,
            poll_successes: snapshot.poll_successes,
            poll_failures: snapshot.poll_failures,
            poll_zero_responses: snapshot.poll_zero_responses,
            skipped_ticks: snapshot.skipped_ticks,
            poll_latency_ms_avg,
            samples_written: snapshot.samples_written,
            storage_write_failures: snapshot.storage_write_failures,
            energy_upserts: snapshot.energy_upserts,
            adhoc_reads: snapshot.adhoc_reads,
            adhoc_writes: snapshot.adhoc_writes,
            reaper_evictions: snapshot.reaper_evictions,
        })),
    )
        .into_response()
}
