//! 表结构初始化
//!
//! 启动时执行的幂等 DDL。

use crate::error::StorageError;
use crate::validation::hour_column;
use domain::HOURS_PER_DAY;
use sqlx::PgPool;
use tracing::info;

/// `h00, h01, ..., h23`
pub(crate) fn hour_columns() -> Result<Vec<String>, StorageError> {
    (0..HOURS_PER_DAY).map(hour_column).collect()
}

/// 创建 `raw_samples` 与 `daily_energy`（已存在时跳过）
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::query(
        "create table if not exists raw_samples ( \
           id bigserial primary key, \
           ts timestamptz not null, \
           point_id text not null, \
           value double precision not null, \
           label text \
         )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "create index if not exists idx_raw_samples_point_ts \
         on raw_samples (point_id, ts desc)",
    )
    .execute(pool)
    .await?;

    let hour_defs = hour_columns()?
        .iter()
        .map(|column| format!("{column} double precision not null default 0"))
        .collect::<Vec<_>>()
        .join(", ");
    let ddl = format!(
        "create table if not exists daily_energy ( \
           day date primary key, \
           {hour_defs}, \
           updated_at_ms bigint not null default 0 \
         )"
    );
    sqlx::query(&ddl).execute(pool).await?;

    info!(target: "ems.storage", "schema_ready");
    Ok(())
}
