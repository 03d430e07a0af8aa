//! 设备实时数据与临时读写 handlers
//!
//! - GET /devices/{host}/{port}/snapshot - 最新快照
//! - GET /devices/{host}/{port}/stats - 轮询统计
//! - POST /devices/read - 临时读取（经连接注册表，不影响轮询）
//! - POST /devices/write - 临时写入单个点位
//!
//! 临时读写的 `protocol` 字段与设备路由的 `?protocol=` 含义相同，须与配置的协议一致。

use crate::AppState;
use crate::handlers::polling::{DevicePath, DeviceQuery};
use crate::utils::response::{
    acquisition_error, bad_request_error, not_found_error, readings_to_dto, snapshot_to_dto, statistics_to_dto,
};
use crate::utils::{device_key, normalize_required, parse_protocol_config};
use api_contract::{ApiResponse, ReadPointsRequest, WritePointRequest};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::{DeviceHealth, DeviceKey};
use ems_protocol::ProtocolConfig;

pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
    Query(query): Query<DeviceQuery>,
) -> Response {
    let key = match device_key(path.host, path.port, query.protocol.as_deref()) {
        Ok(key) => key,
        Err(response) => return response,
    };
    match state.engine.get_snapshot(&key) {
        Some(snapshot) => (
            StatusCode::OK,
            Json(ApiResponse::success(snapshot_to_dto(&key, snapshot))),
        )
            .into_response(),
        None => not_found_error(),
    }
}

pub async fn get_statistics(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
    Query(query): Query<DeviceQuery>,
) -> Response {
    let key = match device_key(path.host, path.port, query.protocol.as_deref()) {
        Ok(key) => key,
        Err(response) => return response,
    };
    match state.engine.statistics(&key) {
        Some(stats) => {
            let health = state.engine.health(&key).unwrap_or(DeviceHealth::Online);
            (
                StatusCode::OK,
                Json(ApiResponse::success(statistics_to_dto(stats, health))),
            )
                .into_response()
        }
        None => not_found_error(),
    }
}

/// 临时读写的设备键：限定协议时必须与配置一致
fn adhoc_key(
    host: String,
    port: u16,
    protocol: Option<&str>,
    config: &ProtocolConfig,
) -> Result<DeviceKey, Response> {
    let key = device_key(host, port, protocol)?;
    match key.protocol {
        Some(kind) if kind != config.kind() => Err(bad_request_error(format!(
            "protocol {} does not match config protocol {}",
            kind,
            config.kind()
        ))),
        _ => Ok(key),
    }
}

pub async fn read_points(
    State(state): State<AppState>,
    Json(req): Json<ReadPointsRequest>,
) -> Response {
    let config = match parse_protocol_config(req.config) {
        Ok(config) => config,
        Err(response) => return response,
    };
    let key = match adhoc_key(req.host, req.port, req.protocol.as_deref(), &config) {
        Ok(key) => key,
        Err(response) => return response,
    };
    match state.engine.read_points(&key, &config, req.points.as_slice()).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ApiResponse::success(readings_to_dto(&outcome))),
        )
            .into_response(),
        Err(err) => acquisition_error(err),
    }
}

pub async fn write_point(
    State(state): State<AppState>,
    Json(req): Json<WritePointRequest>,
) -> Response {
    let point = match normalize_required(req.point, "point") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let config = match parse_protocol_config(req.config) {
        Ok(config) => config,
        Err(response) => return response,
    };
    let key = match adhoc_key(req.host, req.port, req.protocol.as_deref(), &config) {
        Ok(key) => key,
        Err(response) => return response,
    };
    match state
        .engine
        .write_point(&key, &config, &point, req.value)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::success(true))).into_response(),
        Err(err) => acquisition_error(err),
    }
}
