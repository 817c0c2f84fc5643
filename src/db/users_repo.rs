//! PostgreSQL store for the `users` relation

use super::UserStore;
use crate::error::{LoaderError, Result};
use crate::ingestion::ProjectedTuple;
use crate::report::{AgeBucket, AgeReport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

pub const COLUMNS_PER_ROW: usize = 4;

const AGE_DISTRIBUTION_SQL: &str = r#"
    SELECT
      age_group,
      ROUND(COUNT(*) * 100.0 / SUM(COUNT(*)) OVER (), 2)::float8 AS percentage
    FROM (
      SELECT
        CASE
          WHEN age < 20 THEN '< 20'
          WHEN age BETWEEN 20 AND 40 THEN '20 to 40'
          WHEN age BETWEEN 41 AND 60 THEN '40 to 60'
          ELSE '> 60'
        END AS age_group
      FROM users
    ) AS grouped
    GROUP BY age_group
    ORDER BY age_group
"#;

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `INSERT` with one `($n, $n+1, $n+2, $n+3)` group per row.
pub fn insert_statement(row_count: usize) -> String {
    let groups: Vec<String> = (0..row_count)
        .map(|i| {
            let base = i * COLUMNS_PER_ROW;
            format!("(${}, ${}, ${}, ${})", base + 1, base + 2, base + 3, base + 4)
        })
        .collect();

    format!(
        "INSERT INTO users (name, age, address, additional_info) VALUES {}",
        groups.join(", ")
    )
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert_batch(&self, rows: &[ProjectedTuple]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let sql = insert_statement(rows.len());
        let mut query = sqlx::query(&sql);
        for row in rows {
            query = query
                .bind(row.full_name.as_str())
                .bind(row.age.as_option())
                .bind(row.address.as_deref())
                .bind(row.additional_info.as_deref());
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| {
                LoaderError::Database(format!(
                    "Failed to insert batch of {} rows: {}",
                    rows.len(),
                    e
                ))
            })?;

        Ok(result.rows_affected())
    }

    async fn age_distribution(&self) -> Result<AgeReport> {
        let rows = sqlx::query(AGE_DISTRIBUTION_SQL)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                LoaderError::Database(format!("Failed to compute age distribution: {}", e))
            })?;

        let rows = rows
            .into_iter()
            .map(|row| {
                Ok(AgeBucket {
                    age_group: row.try_get("age_group")?,
                    percentage: row.try_get("percentage")?,
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

        Ok(AgeReport { rows })
    }

    async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM users")
            .execute(&self.pool)
            .await
            .map_err(|e| LoaderError::Database(format!("Failed to clear users: {}", e)))?;
        Ok(result.rows_affected())
    }

    async fn now(&self) -> Result<DateTime<Utc>> {
        let row = sqlx::query("SELECT NOW() AS now")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| LoaderError::Database(format!("Database not reachable: {}", e)))?;
        Ok(row.try_get("now")?)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id SERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                age INTEGER,
                address TEXT,
                additional_info TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LoaderError::Database(format!("Failed to create users table: {}", e)))?;
        Ok(())
    }
}
