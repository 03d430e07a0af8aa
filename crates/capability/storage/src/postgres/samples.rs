//! Postgres 原始采样实现

use crate::error::StorageError;
use crate::traits::{SampleQuery, SampleStore, TimeOrder};
use domain::RawSample;
use sqlx::{PgPool, Row};

pub struct PgSampleStore {
    pub pool: PgPool,
}

impl PgSampleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl SampleStore for PgSampleStore {
    async fn insert_samples(&self, samples: &[RawSample]) -> Result<usize, StorageError> {
        if samples.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for sample in samples {
            sqlx::query(
                "insert into raw_samples (ts, point_id, value, label) \
                 values (to_timestamp($1 / 1000.0), $2, $3, $4)",
            )
            .bind(sample.ts_ms as f64)
            .bind(&sample.point_id)
            .bind(sample.value)
            .bind(&sample.label)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(samples.len())
    }

    async fn query_samples(&self, query: &SampleQuery) -> Result<Vec<RawSample>, StorageError> {
        let order_by = match query.order {
            TimeOrder::Asc => "asc",
            TimeOrder::Desc => "desc",
        };
        let sql = format!(
            "select round(extract(epoch from ts) * 1000)::bigint as ts_ms, \
             point_id, value, label \
             from raw_samples \
             where point_id = $1 \
             and ($2::bigint is null or ts >= to_timestamp($2 / 1000.0)) \
             and ($3::bigint is null or ts <= to_timestamp($3 / 1000.0)) \
             order by ts {order_by}, id {order_by} \
             limit $4"
        );

        let rows = sqlx::query(&sql)
            .bind(&query.point_id)
            .bind(query.from_ms)
            .bind(query.to_ms)
            .bind(query.limit.map(|limit| limit.max(0)))
            .fetch_all(&self.pool)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(RawSample {
                ts_ms: row.try_get("ts_ms")?,
                point_id: row.try_get("point_id")?,
                value: row.try_get("value")?,
                label: row.try_get("label")?,
            });
        }
        Ok(items)
    }

    async fn delete_samples(
        &self,
        from_ms: i64,
        to_ms: i64,
        point_id: Option<&str>,
    ) -> Result<u64, StorageError> {
        let result = sqlx::query(
            "delete from raw_samples \
             where ts >= to_timestamp($1 / 1000.0) \
             and ts <= to_timestamp($2 / 1000.0) \
             and ($3::text is null or point_id = $3)",
        )
        .bind(from_ms as f64)
        .bind(to_ms as f64)
        .bind(point_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_samples_before(&self, cutoff_ms: i64) -> Result<u64, StorageError> {
        let result = sqlx::query("delete from raw_samples where ts < to_timestamp($1 / 1000.0)")
            .bind(cutoff_ms as f64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
