//! 路由定义
//!
//! 集中管理所有 API 路由，将路径映射到对应的 handlers。
//! 路由包括：
//! - 健康检查与计数器：/health, /metrics
//! - 轮询注册：/polling, /polling/{host}/{port}
//! - 设备数据：/devices, /devices/{host}/{port}/snapshot|stats, /devices/read, /devices/write
//! - 点位历史：/points/{point_id}/history
//! - 能耗聚合：/energy/day/{date}, /energy/range, /energy/summary
//! - 数据维护：/data, /data/cleanup

use crate::AppState;
use crate::handlers::*;
use crate::middleware::request_context;
use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

/// 创建 API 路由（不含状态）
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/polling", post(register_polling))
        .route("/polling/:host/:port", delete(stop_polling))
        .route("/devices", get(list_devices))
        .route("/devices/read", post(read_points))
        .route("/devices/write", post(write_point))
        .route("/devices/:host/:port/snapshot", get(get_snapshot))
        .route("/devices/:host/:port/stats", get(get_statistics))
        .route("/points/:point_id/history", get(get_point_history))
        .route("/energy/day/:date", get(get_day_data))
        .route("/energy/range", get(get_date_range_data))
        .route("/energy/summary", get(get_energy_summary))
        .route("/data", delete(delete_by_range))
        .route("/data/cleanup", post(cleanup_older_than))
}

/// 创建完整应用路由
///
/// 支持 / 和 /api/ 两种前缀，并注入 request_id/trace_id
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(api_routes())
        .nest("/api", api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_context))
}
