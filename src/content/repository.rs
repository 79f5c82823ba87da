//! Content store: idempotent upserts and per-source-capped range queries.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info, warn};

use super::sentiment;
use super::types::{ContentItem, Engagement, Sentiment, TimeRange};
use crate::db::{format_timestamp, parse_datetime, Database};
use crate::Result;

/// Default number of items written per transaction.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default minimum per-source cap for range queries.
pub const DEFAULT_PER_SOURCE_FLOOR: usize = 5;

const ITEM_COLUMNS: &str = "id, source_id, title, description, url, image_url, author, tags, \
     published_at, fetched_at, engagement, sentiment, sentiment_score, velocity_score";

/// Row type for a content item.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ContentItemRow {
    id: String,
    source_id: String,
    title: String,
    description: String,
    url: String,
    image_url: Option<String>,
    author: Option<String>,
    tags: String,
    published_at: String,
    fetched_at: String,
    engagement: Option<String>,
    sentiment: Option<String>,
    sentiment_score: Option<f64>,
    velocity_score: Option<f64>,
}

impl From<ContentItemRow> for ContentItem {
    fn from(row: ContentItemRow) -> Self {
        let fetched_at = parse_datetime(&row.fetched_at).unwrap_or_else(Utc::now);
        ContentItem {
            id: row.id,
            source_id: row.source_id,
            title: row.title,
            description: row.description,
            url: row.url,
            image_url: row.image_url,
            author: row.author,
            tags: serde_json::from_str(&row.tags).unwrap_or_default(),
            published_at: parse_datetime(&row.published_at).unwrap_or(fetched_at),
            fetched_at,
            engagement: row
                .engagement
                .and_then(|e| serde_json::from_str::<Engagement>(&e).ok()),
            sentiment: row.sentiment.as_deref().and_then(Sentiment::parse),
            sentiment_score: row.sentiment_score,
            trending_score: None,
            velocity_score: row.velocity_score,
            matched_keywords: None,
        }
    }
}

/// Outcome of an upsert call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    /// Items handed to the store.
    pub submitted: usize,
    /// Items actually written.
    pub cached: usize,
    /// Batches rolled back.
    pub failed_batches: usize,
}

/// Per-source cap for a query over `source_count` sources.
///
/// The larger of `floor` and `ceil(limit / source_count * 2)`.
pub fn per_source_cap(limit: usize, source_count: usize, floor: usize) -> usize {
    if source_count == 0 {
        return floor;
    }
    let scaled = (limit * 2).div_ceil(source_count);
    scaled.max(floor)
}

/// Shared store of normalized items.
///
/// Writes are keyed by the deterministic item id, so concurrent writers of
/// the same upstream item converge on the last write.
#[derive(Debug, Clone)]
pub struct ContentStore {
    db: Database,
    batch_size: usize,
    per_source_floor: usize,
}

impl ContentStore {
    /// Create a store with default batch size and per-source floor.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            batch_size: DEFAULT_BATCH_SIZE,
            per_source_floor: DEFAULT_PER_SOURCE_FLOOR,
        }
    }

    /// Set the upsert batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the per-source floor for range queries.
    pub fn with_per_source_floor(mut self, floor: usize) -> Self {
        self.per_source_floor = floor;
        self
    }

    /// Insert or update items by id.
    ///
    /// Items are written in batches of `batch_size`, one transaction each. A
    /// failing batch (for example an item whose source is unknown) is rolled
    /// back and logged; the remaining batches are still written.
    pub async fn upsert(&self, items: &[ContentItem]) -> Result<UpsertSummary> {
        let mut summary = UpsertSummary {
            submitted: items.len(),
            ..Default::default()
        };
        if items.is_empty() {
            return Ok(summary);
        }

        for (index, batch) in items.chunks(self.batch_size).enumerate() {
            match self.upsert_batch(batch).await {
                Ok(()) => summary.cached += batch.len(),
                Err(e) => {
                    summary.failed_batches += 1;
                    warn!(batch = index, size = batch.len(), error = %e, "Upsert batch dropped");
                }
            }
        }

        if summary.cached < summary.submitted {
            warn!(
                cached = summary.cached,
                submitted = summary.submitted,
                "Cached fewer items than submitted"
            );
        } else {
            info!(cached = summary.cached, "Cached items");
        }
        Ok(summary)
    }

    async fn upsert_batch(&self, batch: &[ContentItem]) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;

        for item in batch {
            let (label, score) = match (item.sentiment, item.sentiment_score) {
                (Some(label), Some(score)) => (label, score),
                _ => sentiment::classify(&item.search_text()),
            };
            let engagement = match &item.engagement {
                Some(e) => Some(serde_json::to_string(e)?),
                None => None,
            };

            sqlx::query(
                r#"
                INSERT INTO content_items
                    (id, source_id, title, description, url, image_url, author, tags,
                     published_at, fetched_at, engagement, sentiment, sentiment_score, velocity_score)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                ON CONFLICT(id) DO UPDATE SET
                    source_id = excluded.source_id,
                    title = excluded.title,
                    description = excluded.description,
                    url = excluded.url,
                    image_url = excluded.image_url,
                    author = excluded.author,
                    tags = excluded.tags,
                    published_at = excluded.published_at,
                    fetched_at = excluded.fetched_at,
                    engagement = excluded.engagement,
                    sentiment = excluded.sentiment,
                    sentiment_score = excluded.sentiment_score,
                    velocity_score = COALESCE(excluded.velocity_score, content_items.velocity_score)
                "#,
            )
            .bind(&item.id)
            .bind(&item.source_id)
            .bind(&item.title)
            .bind(&item.description)
            .bind(&item.url)
            .bind(&item.image_url)
            .bind(&item.author)
            .bind(serde_json::to_string(&item.tags)?)
            .bind(format_timestamp(&item.published_at))
            .bind(format_timestamp(&item.fetched_at))
            .bind(engagement)
            .bind(label.as_str())
            .bind(score)
            .bind(item.velocity_score)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Items from `source_ids` published within `range`, newest first.
    pub async fn query_by_time_range(
        &self,
        source_ids: &[String],
        range: TimeRange,
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        self.query_since(source_ids, range.cutoff(Utc::now()), limit)
            .await
    }

    /// Items from `source_ids` published at or after `cutoff`, newest first.
    ///
    /// Each source contributes at most [`per_source_cap`] items before the
    /// global `limit` applies.
    pub async fn query_since(
        &self,
        source_ids: &[String],
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        if source_ids.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let cap = per_source_cap(limit, source_ids.len(), self.per_source_floor);
        debug!(sources = source_ids.len(), cap, limit, "Querying content");

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {ITEM_COLUMNS} FROM (SELECT {ITEM_COLUMNS}, ROW_NUMBER() OVER \
             (PARTITION BY source_id ORDER BY published_at DESC, id DESC) AS source_rank \
             FROM content_items WHERE published_at >= "
        ));
        query.push_bind(format_timestamp(&cutoff));
        query.push(" AND source_id IN (");
        let mut ids = query.separated(", ");
        for id in source_ids {
            ids.push_bind(id);
        }
        query.push(")) WHERE source_rank <= ");
        query.push_bind(cap as i64);
        query.push(" ORDER BY published_at DESC, id DESC LIMIT ");
        query.push_bind(limit as i64);

        let rows = query
            .build_query_as::<ContentItemRow>()
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.into_iter().map(ContentItem::from).collect())
    }

    /// Get an item by id.
    pub async fn get(&self, id: &str) -> Result<Option<ContentItem>> {
        let row = sqlx::query_as::<_, ContentItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM content_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(ContentItem::from))
    }

    /// Count all stored items.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content_items")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Count stored items per source.
    pub async fn count_by_source(&self) -> Result<BTreeMap<String, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT source_id, COUNT(*) FROM content_items GROUP BY source_id",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.into_iter().collect())
    }

    /// Delete items fetched more than `retention_days` ago.
    ///
    /// Engagement snapshots older than the same cutoff go too. Returns the
    /// number of items removed.
    pub async fn sweep(&self, retention_days: u32) -> Result<u64> {
        let cutoff = format_timestamp(&(Utc::now() - Duration::days(retention_days as i64)));

        let removed = sqlx::query("DELETE FROM content_items WHERE fetched_at < $1")
            .bind(&cutoff)
            .execute(self.db.pool())
            .await?
            .rows_affected();

        let snapshots = sqlx::query("DELETE FROM engagement_snapshots WHERE snapshot_at < $1")
            .bind(&cutoff)
            .execute(self.db.pool())
            .await?
            .rows_affected();

        info!(removed, snapshots, retention_days, "Swept expired content");
        Ok(removed)
    }
}
