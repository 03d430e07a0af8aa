//! Postgres 每日能耗实现
//!
//! `daily_energy` 每个日期一行，`h00`..`h23` 为小时列。

use super::schema::hour_columns;
use crate::error::StorageError;
use crate::traits::DailyAggregateStore;
use crate::validation::{ensure_date_range, hour_column};
use chrono::NaiveDate;
use domain::{DailyAggregateRow, HOURS_PER_DAY};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

pub struct PgDailyAggregateStore {
    pub pool: PgPool,
}

impl PgDailyAggregateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn select_sql(filter: &str) -> Result<String, StorageError> {
        let columns = hour_columns()?.join(", ");
        Ok(format!(
            "select day, {columns}, updated_at_ms from daily_energy {filter} order by day asc"
        ))
    }
}

fn row_to_record(row: &PgRow) -> Result<DailyAggregateRow, StorageError> {
    let mut hours = [0.0; HOURS_PER_DAY];
    for (hour, slot) in hours.iter_mut().enumerate() {
        let column = hour_column(hour)?;
        *slot = row.try_get::<f64, _>(column.as_str())?;
    }
    Ok(DailyAggregateRow {
        date: row.try_get("day")?,
        hours,
        updated_at_ms: row.try_get("updated_at_ms")?,
    })
}

#[async_trait::async_trait]
impl DailyAggregateStore for PgDailyAggregateStore {
    async fn get_day(&self, date: NaiveDate) -> Result<Option<DailyAggregateRow>, StorageError> {
        let sql = Self::select_sql("where day = $1")?;
        let row = sqlx::query(&sql)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn get_days(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyAggregateRow>, StorageError> {
        ensure_date_range(from, to)?;
        let sql = Self::select_sql("where day >= $1 and day <= $2")?;
        let rows = sqlx::query(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn upsert_hour(
        &self,
        date: NaiveDate,
        hour: usize,
        value: f64,
        updated_at_ms: i64,
    ) -> Result<(), StorageError> {
        let column = hour_column(hour)?;
        let sql = format!(
            "insert into daily_energy (day, {column}, updated_at_ms) values ($1, $2, $3) \
             on conflict (day) do update set \
             {column} = excluded.{column}, \
             updated_at_ms = excluded.updated_at_ms"
        );
        sqlx::query(&sql)
            .bind(date)
            .bind(value)
            .bind(updated_at_ms)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_days(&self, from: NaiveDate, to: NaiveDate) -> Result<u64, StorageError> {
        ensure_date_range(from, to)?;
        let result = sqlx::query("delete from daily_energy where day >= $1 and day <= $2")
            .bind(from)
            .bind(to)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
