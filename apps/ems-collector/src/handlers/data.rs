//! 原始采样 handlers
//!
//! - GET /points/{point_id}/history?hoursBack=|limit= - 点位历史（时间升序）
//! - DELETE /data?from=&to=&pointId= - 按日期范围删除
//! - POST /data/cleanup?days= - 删除早于 N 天的原始采样

use crate::AppState;
use crate::utils::parse_date;
use crate::utils::response::{bad_request_error, sample_to_dto};
use api_contract::{ApiResponse, DeleteResultDto, SampleDto};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ems_acquisition::HistoryWindow;

/// 未指定窗口时返回最近 24 小时
const DEFAULT_HISTORY_HOURS: u32 = 24;

#[derive(serde::Deserialize)]
pub struct PointPath {
    point_id: String,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    hours_back: Option<u32>,
    limit: Option<u32>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRangeQuery {
    from: String,
    to: String,
    point_id: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct CleanupQuery {
    days: u32,
}

/// `limit` 与 `hoursBack` 同时给出时以 `limit` 为准
pub fn history_window(query: &HistoryQuery) -> Result<HistoryWindow, Response> {
    match (query.limit, query.hours_back) {
        (Some(0), _) => Err(bad_request_error("limit must be positive")),
        (Some(limit), _) => Ok(HistoryWindow::Limit(limit)),
        (None, Some(0)) => Err(bad_request_error("hoursBack must be positive")),
        (None, Some(hours)) => Ok(HistoryWindow::HoursBack(hours)),
        (None, None) => Ok(HistoryWindow::HoursBack(DEFAULT_HISTORY_HOURS)),
    }
}

pub async fn get_point_history(
    State(state): State<AppState>,
    Path(path): Path<PointPath>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let window = match history_window(&query) {
        Ok(window) => window,
        Err(response) => return response,
    };
    let data: Vec<SampleDto> = state
        .engine
        .get_point_history(path.point_id.trim(), window)
        .await
        .into_iter()
        .map(sample_to_dto)
        .collect();
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

pub async fn delete_by_range(
    State(state): State<AppState>,
    Query(query): Query<DeleteRangeQuery>,
) -> Response {
    let from = match parse_date(&query.from, "from") {
        Ok(date) => date,
        Err(response) => return response,
    };
    let to = match parse_date(&query.to, "to") {
        Ok(date) => date,
        Err(response) => return response,
    };
    if from > to {
        return bad_request_error("from must not be after to");
    }
    let point = query
        .point_id
        .as_deref()
        .map(str::trim)
        .filter(|point| !point.is_empty());
    let deleted = state.engine.delete_by_range(from, to, point).await;
    (
        StatusCode::OK,
        Json(ApiResponse::success(DeleteResultDto { deleted })),
    )
        .into_response()
}

pub async fn cleanup_older_than(
    State(state): State<AppState>,
    Query(query): Query<CleanupQuery>,
) -> Response {
    if query.days == 0 {
        return bad_request_error("days must be positive");
    }
    let deleted = state.engine.cleanup_older_than(query.days).await;
    (
        StatusCode::OK,
        Json(ApiResponse::success(DeleteResultDto { deleted })),
    )
        .into_response()
}
