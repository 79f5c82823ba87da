//! RSS/Atom feed adapter.

use async_trait::async_trait;
use chrono::Utc;
use feed_rs::model::Entry;
use feed_rs::parser;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{finish, SourceAdapter};
use crate::content::ContentItem;
use crate::ingest::{clean_description, retry_with_backoff, strip_html};
use crate::sources::http::HttpFetcher;
use crate::sources::types::{FetchOptions, SourceConfig};
use crate::{Result, TrendError};

const FEED_ACCEPT: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.8, */*;q=0.5";

static IMG_SRC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<img[^>]+src\s*=\s*["']([^"']+)["']"#).expect("valid regex"));

/// Adapter for any RSS 2.0 / Atom / JSON Feed source.
pub struct FeedAdapter {
    source: SourceConfig,
    http: HttpFetcher,
}

impl FeedAdapter {
    pub fn new(source: SourceConfig, http: HttpFetcher) -> Self {
        Self { source, http }
    }

    /// Download and parse the feed, without filtering.
    pub(crate) async fn fetch_entries(&self, options: &FetchOptions) -> Result<Vec<ContentItem>> {
        let http = &self.http;
        let url = self.source.fetch_url();
        let bytes = retry_with_backoff(&self.source.id, options.retry_policy(), move || {
            http.get_bytes(url, None, FEED_ACCEPT)
        })
        .await?;
        parse_feed(&self.source.id, &bytes)
    }

    pub(crate) fn source(&self) -> &SourceConfig {
        &self.source
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    fn source_id(&self) -> &str {
        &self.source.id
    }

    async fn try_fetch(&self, options: &FetchOptions) -> Result<Vec<ContentItem>> {
        let items = self.fetch_entries(options).await?;
        Ok(finish(&self.source, items, options))
    }
}

/// Parse feed bytes into content items for `source_id`.
///
/// Entries without both a title and a link are dropped.
pub fn parse_feed(source_id: &str, bytes: &[u8]) -> Result<Vec<ContentItem>> {
    let feed = parser::parse(bytes)
        .map_err(|e| TrendError::Parse(format!("failed to parse feed: {}", e)))?;

    let now = Utc::now();
    let items = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let title = entry
                .title
                .as_ref()
                .map(|t| strip_html(&t.content))
                .filter(|t| !t.is_empty());
            let link = entry_link(&entry);
            if title.is_none() && link.is_none() {
                return None;
            }

            let native_id = if entry.id.trim().is_empty() {
                link.clone().or_else(|| title.clone()).unwrap_or_default()
            } else {
                entry.id.clone()
            };
            let published_at = entry.published.or(entry.updated).unwrap_or(now);

            let body = entry
                .summary
                .as_ref()
                .map(|s| s.content.clone())
                .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()));

            let mut item = ContentItem::new(
                source_id,
                &native_id,
                title.unwrap_or_else(|| "Untitled".to_string()),
                link.unwrap_or_default(),
                published_at,
            )
            .with_tags(entry_tags(&entry));
            if let Some(body) = &body {
                item = item.with_description(clean_description(body));
            }
            if let Some(author) = entry.authors.first() {
                item = item.with_author(author.name.clone());
            }
            if let Some(image) = entry_image(&entry, body.as_deref()) {
                item = item.with_image_url(image);
            }
            Some(item)
        })
        .collect();

    Ok(items)
}

/// The alternate link, else the first link.
fn entry_link(entry: &Entry) -> Option<String> {
    entry
        .links
        .iter()
        .find(|l| l.rel.as_deref() == Some("alternate"))
        .or_else(|| entry.links.first())
        .map(|l| l.href.clone())
        .filter(|h| !h.is_empty())
}

fn entry_tags(entry: &Entry) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for category in &entry.categories {
        let tag = category
            .label
            .clone()
            .unwrap_or_else(|| category.term.clone())
            .trim()
            .to_string();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Best-effort image: media thumbnails, media content, image enclosures, then
/// the first `<img>` in the body.
fn entry_image(entry: &Entry, body: Option<&str>) -> Option<String> {
    let from_media = entry.media.iter().find_map(|m| {
        m.thumbnails
            .first()
            .map(|t| t.image.uri.clone())
            .or_else(|| {
                m.content.iter().find_map(|c| {
                    let is_image = c
                        .content_type
                        .as_ref()
                        .map_or(true, |t| t.essence().to_string().starts_with("image/"));
                    c.url.as_ref().filter(|_| is_image).map(|u| u.to_string())
                })
            })
    });
    if from_media.is_some() {
        return from_media;
    }

    let from_enclosure = entry.links.iter().find_map(|l| {
        let is_image = l
            .media_type
            .as_deref()
            .is_some_and(|t| t.starts_with("image/"));
        (l.rel.as_deref() == Some("enclosure") && is_image).then(|| l.href.clone())
    });
    if from_enclosure.is_some() {
        return from_enclosure;
    }

    let html = body.or_else(|| entry.content.as_ref().and_then(|c| c.body.as_deref()))?;
    IMG_SRC.captures(html).map(|c| c[1].to_string())
}
