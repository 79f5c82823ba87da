//! Source table: registry mirror plus per-deployment overrides.

use super::types::{ResolvedSource, SourceConfig};
use crate::db::{format_timestamp, DbPool};
use crate::Result;

/// One row of the `sources` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SourceRecord {
    pub id: String,
    pub name: String,
    pub category: String,
    pub is_custom: bool,
    /// Override; `None` means the static default applies.
    pub enabled: Option<bool>,
    /// Override; `None` means the static default applies.
    pub priority: Option<i64>,
}

impl SourceRecord {
    pub fn new(id: &str, name: &str, category: &str, is_custom: bool) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            is_custom,
            enabled: None,
            priority: None,
        }
    }

    pub fn from_config(config: &SourceConfig, is_custom: bool) -> Self {
        Self::new(&config.id, &config.name, config.category.as_str(), is_custom)
    }

    /// The priority override, if it is a valid 1..=5 value.
    pub fn priority_override(&self) -> Option<u8> {
        self.priority
            .and_then(|p| u8::try_from(p).ok())
            .filter(|p| super::PRIORITY_RANGE.contains(p))
    }
}

impl From<&ResolvedSource> for SourceRecord {
    fn from(source: &ResolvedSource) -> Self {
        SourceRecord::from_config(&source.config, source.is_custom)
    }
}

/// Repository for the `sources` table.
pub struct SourceRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> SourceRepository<'a> {
    /// Create a new SourceRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert missing sources and refresh names and categories of known ones.
    ///
    /// Existing overrides are kept.
    pub async fn sync(&self, records: &[SourceRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let now = format_timestamp(&chrono::Utc::now());
        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO sources (id, name, category, is_custom, updated_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    category = excluded.category,
                    is_custom = excluded.is_custom,
                    updated_at = excluded.updated_at
                WHERE sources.name != excluded.name
                   OR sources.category != excluded.category
                   OR sources.is_custom != excluded.is_custom
                "#,
            )
            .bind(&record.id)
            .bind(&record.name)
            .bind(&record.category)
            .bind(record.is_custom)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Get a source by id.
    pub async fn get(&self, id: &str) -> Result<Option<SourceRecord>> {
        let record = sqlx::query_as::<_, SourceRecord>(
            "SELECT id, name, category, is_custom, enabled, priority FROM sources WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(record)
    }

    /// List all sources.
    pub async fn list(&self) -> Result<Vec<SourceRecord>> {
        let records = sqlx::query_as::<_, SourceRecord>(
            "SELECT id, name, category, is_custom, enabled, priority FROM sources ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(records)
    }

    /// Set override values. `None` leaves a field unchanged.
    ///
    /// Returns false if the source is unknown.
    pub async fn set_override(
        &self,
        id: &str,
        enabled: Option<bool>,
        priority: Option<u8>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sources SET
                enabled = COALESCE($2, enabled),
                priority = COALESCE($3, priority),
                updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(enabled)
        .bind(priority.map(i64::from))
        .bind(format_timestamp(&chrono::Utc::now()))
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Drop both overrides, reverting to static defaults.
    pub async fn clear_override(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE sources SET enabled = NULL, priority = NULL, updated_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(format_timestamp(&chrono::Utc::now()))
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a source row. Its cached items go with it.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sources WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
