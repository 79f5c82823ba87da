//! Database schema and migrations for trendfeed.
//!
//! Migrations are applied sequentially when the database is opened.
//! Timestamps are stored as fixed-width RFC 3339 UTC strings
//! (`YYYY-MM-DDTHH:MM:SS.mmmZ`) so they sort lexicographically.

/// Database migrations.
///
/// Each migration is a SQL script executed in order. The `schema_version`
/// table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: source registry with per-deployment overrides
    r#"
CREATE TABLE sources (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    category    TEXT NOT NULL,
    is_custom   INTEGER NOT NULL DEFAULT 0,
    enabled     INTEGER,                -- NULL = static default
    priority    INTEGER,                -- NULL = static default
    created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX idx_sources_category ON sources(category);
"#,
    // v2: normalized content items
    r#"
CREATE TABLE content_items (
    id               TEXT PRIMARY KEY,   -- truncated sha256 of (source_id, native id)
    source_id        TEXT NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
    title            TEXT NOT NULL,
    description      TEXT NOT NULL DEFAULT '',
    url              TEXT NOT NULL,
    image_url        TEXT,
    author           TEXT,
    tags             TEXT NOT NULL DEFAULT '[]',  -- JSON array
    published_at     TEXT NOT NULL,
    fetched_at       TEXT NOT NULL,
    engagement       TEXT,                         -- JSON object, sparse
    sentiment        TEXT,
    sentiment_score  REAL,
    velocity_score   REAL
);

CREATE INDEX idx_content_items_source_published ON content_items(source_id, published_at DESC);
CREATE INDEX idx_content_items_published ON content_items(published_at DESC);
CREATE INDEX idx_content_items_fetched ON content_items(fetched_at);
"#,
    // v3: freshness bookkeeping and source health
    r#"
CREATE TABLE source_freshness (
    source_id        TEXT PRIMARY KEY,
    last_fetched_at  TEXT NOT NULL
);

CREATE TABLE source_health (
    source_id             TEXT PRIMARY KEY,
    last_fetch_at         TEXT NOT NULL,
    last_success_at       TEXT,
    last_item_count       INTEGER NOT NULL DEFAULT 0,
    consecutive_failures  INTEGER NOT NULL DEFAULT 0,
    last_error            TEXT
);
"#,
    // v4: engagement snapshots (append-only)
    r#"
CREATE TABLE engagement_snapshots (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    content_id      TEXT NOT NULL,
    snapshot_at     TEXT NOT NULL,
    views           INTEGER,
    upvotes         INTEGER,
    stars           INTEGER,
    likes           INTEGER,
    comments        INTEGER,
    forks           INTEGER,
    downloads       INTEGER,
    claps           INTEGER,
    velocity_score  REAL NOT NULL DEFAULT 0
);

CREATE INDEX idx_engagement_snapshots_content ON engagement_snapshots(content_id, snapshot_at DESC);
"#,
    // v5: key/value settings (JSON values)
    r#"
CREATE TABLE settings (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);
"#,
];
