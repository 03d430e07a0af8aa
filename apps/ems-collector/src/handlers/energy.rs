//! 能耗聚合查询 handlers
//!
//! - GET /energy/day/{date} - 单日 24 小时（缺失补 0）
//! - GET /energy/range?from=&to= - 区间内已存在的日期行
//! - GET /energy/summary - 今日 / 7 日 / 30 日合计与逐日序列

use crate::AppState;
use crate::utils::parse_date;
use crate::utils::response::{day_to_dto, summary_to_dto};
use api_contract::{ApiResponse, DayDataDto};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

#[derive(serde::Deserialize)]
pub struct DatePath {
    date: String,
}

#[derive(serde::Deserialize)]
pub struct DateRangeQuery {
    pub(crate) from: String,
    pub(crate) to: String,
}

pub async fn get_day_data(State(state): State<AppState>, Path(path): Path<DatePath>) -> Response {
    let date = match parse_date(&path.date, "date") {
        Ok(date) => date,
        Err(response) => return response,
    };
    let day = state.engine.get_day_data(date).await;
    (StatusCode::OK, Json(ApiResponse::success(day_to_dto(day)))).into_response()
}

pub async fn get_date_range_data(
    State(state): State<AppState>,
    Query(query): Query<DateRangeQuery>,
) -> Response {
    let from = match parse_date(&query.from, "from") {
        Ok(date) => date,
        Err(response) => return response,
    };
    let to = match parse_date(&query.to, "to") {
        Ok(date) => date,
        Err(response) => return response,
    };
    let data: Vec<DayDataDto> = state
        .engine
        .get_date_range_data(from, to)
        .await
        .into_iter()
        .map(day_to_dto)
        .collect();
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

pub async fn get_energy_summary(State(state): State<AppState>) -> Response {
    let summary = state.engine.get_energy_summary().await;
    (
        StatusCode::OK,
        Json(ApiResponse::success(summary_to_dto(summary))),
    )
        .into_response()
}
