//! JSON shape of a feed response.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use crate::content::{ContentItem, Engagement, TimeRange};
use crate::sources::Category;

fn iso8601<S: Serializer>(at: &DateTime<Utc>, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub meta: FeedMeta,
    pub items: Vec<FeedItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FeedFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMeta {
    /// Items matching the request before pagination.
    pub total_items: usize,
    pub returned_items: usize,
    pub offset: usize,
    pub limit: usize,
    pub time_range: TimeRange,
    /// Returned items per category key.
    pub categories: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    /// Display name of the source.
    pub source: String,
    pub source_id: String,
    pub summary: String,
    pub url: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub trending_score: f64,
    #[serde(serialize_with = "iso8601")]
    pub published_at: DateTime<Utc>,
    #[serde(serialize_with = "iso8601")]
    pub added_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement: Option<Engagement>,
    pub velocity: f64,
    pub matched_keywords: Vec<String>,
}

impl FeedItem {
    pub fn new(item: ContentItem, source_name: &str, category: Category) -> Self {
        Self {
            trending_score: item.trending_score.unwrap_or(0.0),
            velocity: item.velocity_score.unwrap_or(0.0),
            matched_keywords: item.matched_keywords.unwrap_or_default(),
            source: source_name.to_string(),
            category,
            id: item.id,
            title: item.title,
            source_id: item.source_id,
            summary: item.description,
            url: item.url,
            tags: item.tags,
            published_at: item.published_at,
            added_at: item.fetched_at,
            author: item.author,
            image_url: item.image_url,
            engagement: item.engagement,
        }
    }
}

/// A source that could not be refreshed for this response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedFailure {
    pub source: String,
    pub error: String,
}
