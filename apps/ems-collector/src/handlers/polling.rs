//! 轮询注册 handlers
//!
//! - POST /polling - 注册设备轮询（重复注册无效果）
//! - DELETE /polling/{host}/{port} - 停止轮询
//! - GET /devices - 已注册设备及统计

use crate::AppState;
use crate::utils::response::{acquisition_error, device_to_dto, not_found_error};
use crate::utils::{device_key, normalize_required, parse_protocol_config};
use api_contract::{ApiResponse, DeviceDto, RegisterPollingRequest, RegisterPollingResponse};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::DeviceKey;
use ems_acquisition::PollRegistration;

#[derive(serde::Deserialize)]
pub struct DevicePath {
    pub(crate) host: String,
    pub(crate) port: u16,
}

#[derive(serde::Deserialize)]
pub struct DeviceQuery {
    pub(crate) protocol: Option<String>,
}

/// 注册轮询
///
/// 校验失败返回 400；连通性探测失败返回 502，且不启动任何任务。
pub async fn register_polling(
    State(state): State<AppState>,
    Json(req): Json<RegisterPollingRequest>,
) -> Response {
    let host = match normalize_required(req.host, "host") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let config = match parse_protocol_config(req.config) {
        Ok(config) => config,
        Err(response) => return response,
    };
    let key = if req.qualify_protocol {
        DeviceKey::with_protocol(host, req.port, config.kind())
    } else {
        DeviceKey::new(host, req.port)
    };
    let registration = PollRegistration {
        key: key.clone(),
        points: req.points,
        interval_ms: req.interval_ms,
        config,
        energy_point: req.energy_point,
        treat_all_zero_as_failure: req.treat_all_zero_as_failure,
    };
    match state.engine.register_polling(registration).await {
        Ok(registered) => (
            StatusCode::OK,
            Json(ApiResponse::success(RegisterPollingResponse {
                device: key.to_string(),
                registered,
            })),
        )
            .into_response(),
        Err(err) => acquisition_error(err),
    }
}

/// 停止轮询；未注册的设备返回 404
pub async fn stop_polling(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
    Query(query): Query<DeviceQuery>,
) -> Response {
    let key = match device_key(path.host, path.port, query.protocol.as_deref()) {
        Ok(key) => key,
        Err(response) => return response,
    };
    if state.engine.stop_polling(&key).await {
        (StatusCode::OK, Json(ApiResponse::success(true))).into_response()
    } else {
        not_found_error()
    }
}

pub async fn list_devices(State(state): State<AppState>) -> Response {
    let data: Vec<DeviceDto> = state
        .engine
        .registered_devices()
        .await
        .into_iter()
        .map(device_to_dto)
        .collect();
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}
