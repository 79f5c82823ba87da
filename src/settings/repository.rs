//! Key/value settings storage.

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::db::{format_timestamp, DbPool};
use crate::Result;

/// Repository for the `settings` table. Values are stored as JSON text.
pub struct SettingsRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> SettingsRepository<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Every setting in one read. Rows that are not valid JSON are skipped.
    pub async fn get_all(&self) -> Result<HashMap<String, Value>> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
            .fetch_all(self.pool)
            .await?;

        let mut settings = HashMap::with_capacity(rows.len());
        for (key, raw) in rows {
            match serde_json::from_str(&raw) {
                Ok(value) => {
                    settings.insert(key, value);
                }
                Err(e) => warn!(key = %key, error = %e, "Skipping unreadable setting"),
            }
        }
        Ok(settings)
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(self.pool)
            .await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set(&self, key: &str, value: &Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES ($1, $2, $3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value.to_string())
        .bind(format_timestamp(&chrono::Utc::now()))
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM settings WHERE key = $1")
            .bind(key)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_overwrite() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = SettingsRepository::new(db.pool());

        assert!(repo.get("theme").await.unwrap().is_none());
        repo.set("theme", &json!("dark")).await.unwrap();
        repo.set("theme", &json!("light")).await.unwrap();
        assert_eq!(repo.get("theme").await.unwrap(), Some(json!("light")));

        repo.set("boost_keywords", &json!(["agents", "rust"])).await.unwrap();
        let all = repo.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["boost_keywords"], json!(["agents", "rust"]));

        assert!(repo.delete("theme").await.unwrap());
        assert!(!repo.delete("theme").await.unwrap());
    }
}
