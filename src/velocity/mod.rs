//! Engagement velocity tracking.
//!
//! Every freshness pass appends one engagement snapshot per item. Velocity is
//! the change of the item's primary metric per hour between its newest
//! snapshot and the most recent prior one.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use crate::content::Engagement;
use crate::db::{format_timestamp, parse_datetime, Database};
use crate::Result;

/// How far back a prior snapshot counts when recording.
pub const WRITE_LOOKBACK_HOURS: i64 = 6;

/// How far back snapshots count when reading velocities for scoring.
pub const READ_LOOKBACK_HOURS: i64 = 24;

/// Below this gap the prior velocity is carried forward unchanged.
pub const MIN_INTERVAL_MINUTES: i64 = 30;

/// SQLite bind-parameter budget per statement chunk.
const CHUNK: usize = 400;

/// The previous observation of an item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorSnapshot {
    pub snapshot_at: DateTime<Utc>,
    pub metric: u64,
    pub velocity: f64,
}

/// Velocity for a new observation of `current`.
///
/// Zero with no prior snapshot; the prior velocity when the prior snapshot is
/// under [`MIN_INTERVAL_MINUTES`] old; otherwise metric change per hour.
pub fn compute_velocity(current: u64, prior: Option<&PriorSnapshot>, now: DateTime<Utc>) -> f64 {
    let Some(prior) = prior else {
        return 0.0;
    };
    let elapsed = now - prior.snapshot_at;
    if elapsed < Duration::minutes(MIN_INTERVAL_MINUTES) {
        return prior.velocity;
    }
    let hours = elapsed.num_seconds() as f64 / 3600.0;
    (current as f64 - prior.metric as f64) / hours
}

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    content_id: String,
    snapshot_at: String,
    views: Option<i64>,
    upvotes: Option<i64>,
    stars: Option<i64>,
    likes: Option<i64>,
    comments: Option<i64>,
    forks: Option<i64>,
    downloads: Option<i64>,
    claps: Option<i64>,
    velocity_score: f64,
}

impl SnapshotRow {
    fn engagement(&self) -> Engagement {
        let n = |v: Option<i64>| v.and_then(|x| u64::try_from(x).ok());
        Engagement {
            views: n(self.views),
            upvotes: n(self.upvotes),
            stars: n(self.stars),
            likes: n(self.likes),
            comments: n(self.comments),
            forks: n(self.forks),
            downloads: n(self.downloads),
            claps: n(self.claps),
        }
    }
}

fn to_db(v: Option<u64>) -> Option<i64> {
    v.and_then(|x| i64::try_from(x).ok())
}

/// Records snapshots and serves velocities.
#[derive(Debug, Clone)]
pub struct VelocityTracker {
    db: Database,
}

impl VelocityTracker {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Latest snapshot per id at or after `cutoff`, in one query per chunk.
    async fn latest_snapshots(
        &self,
        content_ids: &[String],
        cutoff: DateTime<Utc>,
    ) -> Result<HashMap<String, SnapshotRow>> {
        let mut latest = HashMap::with_capacity(content_ids.len());
        for chunk in content_ids.chunks(CHUNK) {
            let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT content_id, snapshot_at, views, upvotes, stars, likes, comments, forks, \
                 downloads, claps, velocity_score FROM (SELECT *, ROW_NUMBER() OVER \
                 (PARTITION BY content_id ORDER BY snapshot_at DESC, id DESC) AS rn \
                 FROM engagement_snapshots WHERE snapshot_at >= ",
            );
            query.push_bind(format_timestamp(&cutoff));
            query.push(" AND content_id IN (");
            let mut ids = query.separated(", ");
            for id in chunk {
                ids.push_bind(id);
            }
            query.push(")) WHERE rn = 1");

            let rows = query
                .build_query_as::<SnapshotRow>()
                .fetch_all(self.db.pool())
                .await?;
            latest.extend(rows.into_iter().map(|r| (r.content_id.clone(), r)));
        }
        Ok(latest)
    }

    /// Append a snapshot for each item and refresh its stored velocity.
    ///
    /// Returns the number of snapshots written.
    pub async fn record_snapshots_batch(
        &self,
        items: &[(String, Engagement)],
        now: DateTime<Utc>,
    ) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = items.iter().map(|(id, _)| id.clone()).collect();
        let prior = self
            .latest_snapshots(&ids, now - Duration::hours(WRITE_LOOKBACK_HOURS))
            .await?;

        let snapshot_at = format_timestamp(&now);
        let mut tx = self.db.pool().begin().await?;
        for chunk in items.chunks(CHUNK / 12) {
            let mut velocities = Vec::with_capacity(chunk.len());
            let mut insert: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO engagement_snapshots (content_id, snapshot_at, views, upvotes, stars, \
                 likes, comments, forks, downloads, claps, velocity_score) ",
            );
            insert.push_values(chunk, |mut row, (id, engagement)| {
                let previous = prior.get(id).and_then(|r| {
                    Some(PriorSnapshot {
                        snapshot_at: parse_datetime(&r.snapshot_at)?,
                        metric: r.engagement().primary_metric(),
                        velocity: r.velocity_score,
                    })
                });
                let velocity = compute_velocity(engagement.primary_metric(), previous.as_ref(), now);
                velocities.push((id.clone(), velocity));

                row.push_bind(id.clone())
                    .push_bind(snapshot_at.clone())
                    .push_bind(to_db(engagement.views))
                    .push_bind(to_db(engagement.upvotes))
                    .push_bind(to_db(engagement.stars))
                    .push_bind(to_db(engagement.likes))
                    .push_bind(to_db(engagement.comments))
                    .push_bind(to_db(engagement.forks))
                    .push_bind(to_db(engagement.downloads))
                    .push_bind(to_db(engagement.claps))
                    .push_bind(velocity);
            });
            insert.build().execute(&mut *tx).await?;

            for (id, velocity) in velocities {
                sqlx::query("UPDATE content_items SET velocity_score = $1 WHERE id = $2")
                    .bind(velocity)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;

        debug!(snapshots = items.len(), "Recorded engagement snapshots");
        Ok(items.len())
    }

    /// Most recent velocity per id over the last 24 hours.
    ///
    /// Ids without a snapshot in that window are absent from the map.
    pub async fn bulk_velocities(
        &self,
        content_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<HashMap<String, f64>> {
        let latest = self
            .latest_snapshots(content_ids, now - Duration::hours(READ_LOOKBACK_HOURS))
            .await?;
        Ok(latest
            .into_iter()
            .map(|(id, row)| (id, row.velocity_score))
            .collect())
    }
}
