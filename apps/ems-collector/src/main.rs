//! 采集服务：后台设备轮询 + HTTP 注册/查询接口与请求追踪 ID。

mod bootstrap;
mod handlers;
mod middleware;
mod routes;
mod utils;

use ems_acquisition::{Engine, EngineSettings};
use ems_config::AppConfig;
use ems_protocol::{DriverTimeouts, StandardDriverFactory};
use ems_storage::{
    DailyAggregateStore, InMemoryDailyAggregateStore, InMemorySampleStore, PgDailyAggregateStore,
    PgSampleStore, SampleStore, connect_pool, ensure_schema,
};
use ems_telemetry::init_tracing;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // 未配置数据库时退回内存存储（演示 / 本地调试）
    let (samples, daily): (Arc<dyn SampleStore>, Arc<dyn DailyAggregateStore>) =
        match &config.database_url {
            Some(url) => {
                let pool = connect_pool(url).await?;
                ensure_schema(&pool).await?;
                (
                    Arc::new(PgSampleStore::new(pool.clone())),
                    Arc::new(PgDailyAggregateStore::new(pool)),
                )
            }
            None => {
                warn!(target: "ems.collector", "database_url_missing_using_in_memory_store");
                (
                    Arc::new(InMemorySampleStore::new()),
                    Arc::new(InMemoryDailyAggregateStore::new()),
                )
            }
        };

    let factory = Arc::new(StandardDriverFactory::new(DriverTimeouts {
        connect: Duration::from_millis(config.connect_timeout_ms),
        io: Duration::from_millis(config.io_timeout_ms),
    }));
    let engine = Arc::new(Engine::new(
        factory,
        samples,
        daily,
        EngineSettings {
            idle_timeout: Duration::from_secs(config.idle_timeout_seconds),
            ring_buffer_size: config.ring_buffer_size,
            offline_after_failures: config.offline_after_failures,
        },
    ));

    // 后台任务：空闲连接回收、保留期裁剪
    let cancel = CancellationToken::new();
    let mut jobs = vec![engine.spawn_reaper(
        Duration::from_secs(config.reaper_interval_seconds),
        cancel.clone(),
    )];
    if let Some(days) = config.retention_days {
        jobs.push(engine.spawn_retention(
            days,
            Duration::from_secs(config.retention_interval_seconds),
            cancel.clone(),
        ));
    }

    if let Some(path) = &config.bootstrap_file {
        bootstrap::apply_file(&engine, path).await?;
    }

    let app = routes::create_router(AppState {
        engine: engine.clone(),
    });
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(target: "ems.collector", addr = %config.http_addr, "http_listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    for job in jobs {
        if let Err(err) = job.await {
            warn!(target: "ems.collector", error = %err, "background_job_join_failed");
        }
    }
    engine.shutdown().await;
    info!(target: "ems.collector", "collector_stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(target: "ems.collector", error = %err, "signal_listener_failed");
    }
    info!(target: "ems.collector", "shutdown_requested");
}
