//! Hacker News front page via the Algolia search API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{finish, SourceAdapter};
use crate::content::{ContentItem, Engagement};
use crate::ingest::{clean_description, retry_with_backoff};
use crate::sources::http::HttpFetcher;
use crate::sources::types::{FetchOptions, SourceConfig};
use crate::Result;

const ITEM_URL: &str = "https://news.ycombinator.com/item?id=";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "objectID")]
    object_id: String,
    title: Option<String>,
    url: Option<String>,
    author: Option<String>,
    points: Option<u64>,
    num_comments: Option<u64>,
    created_at_i: Option<i64>,
    story_text: Option<String>,
}

/// Adapter for the Hacker News front page.
pub struct HackerNewsAdapter {
    source: SourceConfig,
    http: HttpFetcher,
}

impl HackerNewsAdapter {
    pub fn new(source: SourceConfig, http: HttpFetcher) -> Self {
        Self { source, http }
    }

    fn to_item(&self, hit: Hit, now: DateTime<Utc>) -> Option<ContentItem> {
        let title = hit.title.filter(|t| !t.trim().is_empty())?;
        let discussion = format!("{}{}", ITEM_URL, hit.object_id);
        let url = hit.url.filter(|u| !u.is_empty()).unwrap_or(discussion);
        let published_at = hit
            .created_at_i
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .unwrap_or(now);

        let mut item = ContentItem::new(&self.source.id, &hit.object_id, title, url, published_at)
            .with_engagement(Engagement {
                upvotes: hit.points,
                comments: hit.num_comments,
                ..Default::default()
            });
        if let Some(author) = hit.author {
            item = item.with_author(author);
        }
        if let Some(text) = hit.story_text {
            item = item.with_description(clean_description(&text));
        }
        Some(item)
    }
}

#[async_trait]
impl SourceAdapter for HackerNewsAdapter {
    fn source_id(&self) -> &str {
        &self.source.id
    }

    async fn try_fetch(&self, options: &FetchOptions) -> Result<Vec<ContentItem>> {
        let http = &self.http;
        let url = self.source.url.as_str();
        let response: SearchResponse = retry_with_backoff(&self.source.id, options.retry_policy(), move || {
            http.get_json(url, None)
        })
        .await?;

        let now = Utc::now();
        let items = response
            .hits
            .into_iter()
            .filter_map(|hit| self.to_item(hit, now))
            .collect();
        Ok(finish(&self.source, items, options))
    }
}
