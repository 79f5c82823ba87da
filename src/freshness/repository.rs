//! Fetch bookkeeping: last-fetch timestamps and source health.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::{format_timestamp, parse_datetime, DbPool};
use crate::Result;

/// Error marker recorded when a fetch succeeds with no items.
pub const EMPTY_RESULT: &str = "empty result: source returned no items";

/// Repository for the `source_freshness` table.
pub struct FreshnessRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FreshnessRepository<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Last successful fetch time for each known id.
    pub async fn last_fetched(&self, source_ids: &[String]) -> Result<HashMap<String, DateTime<Utc>>> {
        if source_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut query = sqlx::QueryBuilder::<sqlx::Sqlite>::new(
            "SELECT source_id, last_fetched_at FROM source_freshness WHERE source_id IN (",
        );
        let mut ids = query.separated(", ");
        for id in source_ids {
            ids.push_bind(id);
        }
        query.push(")");

        let rows: Vec<(String, String)> = query.build_query_as().fetch_all(self.pool).await?;
        Ok(rows
            .into_iter()
            .filter_map(|(id, at)| parse_datetime(&at).map(|at| (id, at)))
            .collect())
    }

    /// Record `at` as the last fetch time of every id.
    pub async fn mark_fetched(&self, source_ids: &[String], at: DateTime<Utc>) -> Result<()> {
        if source_ids.is_empty() {
            return Ok(());
        }
        let at = format_timestamp(&at);
        let mut tx = self.pool.begin().await?;
        for id in source_ids {
            sqlx::query(
                r#"
                INSERT INTO source_freshness (source_id, last_fetched_at) VALUES ($1, $2)
                ON CONFLICT(source_id) DO UPDATE SET last_fetched_at = excluded.last_fetched_at
                "#,
            )
            .bind(id)
            .bind(&at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Forget the fetch time of a source, making it stale.
    pub async fn clear(&self, source_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM source_freshness WHERE source_id = $1")
            .bind(source_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

/// Health of one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceHealth {
    pub source_id: String,
    pub last_fetch_at: DateTime<Utc>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_item_count: i64,
    pub consecutive_failures: i64,
    pub last_error: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct SourceHealthRow {
    source_id: String,
    last_fetch_at: String,
    last_success_at: Option<String>,
    last_item_count: i64,
    consecutive_failures: i64,
    last_error: Option<String>,
}

impl From<SourceHealthRow> for SourceHealth {
    fn from(row: SourceHealthRow) -> Self {
        SourceHealth {
            source_id: row.source_id,
            last_fetch_at: parse_datetime(&row.last_fetch_at).unwrap_or_else(Utc::now),
            last_success_at: row.last_success_at.and_then(|s| parse_datetime(&s)),
            last_item_count: row.last_item_count,
            consecutive_failures: row.consecutive_failures,
            last_error: row.last_error,
        }
    }
}

/// Repository for the `source_health` table.
pub struct HealthRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> HealthRepository<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// A fetch returned `item_count` > 0 items. Resets the failure counter.
    pub async fn record_success(&self, source_id: &str, item_count: usize, at: DateTime<Utc>) -> Result<()> {
        let at = format_timestamp(&at);
        sqlx::query(
            r#"
            INSERT INTO source_health
                (source_id, last_fetch_at, last_success_at, last_item_count, consecutive_failures, last_error)
            VALUES ($1, $2, $2, $3, 0, NULL)
            ON CONFLICT(source_id) DO UPDATE SET
                last_fetch_at = excluded.last_fetch_at,
                last_success_at = excluded.last_success_at,
                last_item_count = excluded.last_item_count,
                consecutive_failures = 0,
                last_error = NULL
            "#,
        )
        .bind(source_id)
        .bind(&at)
        .bind(item_count as i64)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// A fetch failed, or returned nothing. Increments the failure counter.
    pub async fn record_failure(&self, source_id: &str, error: &str, at: DateTime<Utc>) -> Result<()> {
        let at = format_timestamp(&at);
        sqlx::query(
            r#"
            INSERT INTO source_health
                (source_id, last_fetch_at, last_item_count, consecutive_failures, last_error)
            VALUES ($1, $2, 0, 1, $3)
            ON CONFLICT(source_id) DO UPDATE SET
                last_fetch_at = excluded.last_fetch_at,
                last_item_count = 0,
                consecutive_failures = source_health.consecutive_failures + 1,
                last_error = excluded.last_error
            "#,
        )
        .bind(source_id)
        .bind(&at)
        .bind(error)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// A fetch succeeded with zero items.
    pub async fn record_empty(&self, source_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.record_failure(source_id, EMPTY_RESULT, at).await
    }

    pub async fn get(&self, source_id: &str) -> Result<Option<SourceHealth>> {
        let row = sqlx::query_as::<_, SourceHealthRow>(
            "SELECT source_id, last_fetch_at, last_success_at, last_item_count, \
             consecutive_failures, last_error FROM source_health WHERE source_id = $1",
        )
        .bind(source_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(SourceHealth::from))
    }

    pub async fn list(&self) -> Result<Vec<SourceHealth>> {
        let rows = sqlx::query_as::<_, SourceHealthRow>(
            "SELECT source_id, last_fetch_at, last_success_at, last_item_count, \
             consecutive_failures, last_error FROM source_health ORDER BY source_id",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(SourceHealth::from).collect())
    }
}
