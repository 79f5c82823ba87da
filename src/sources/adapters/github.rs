//! GitHub trending repositories via the search API.
//!
//! "Trending" is approximated as the most-starred repositories created inside
//! the requested window (one week when no range is given).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::{finish, SourceAdapter};
use crate::content::{ContentItem, Engagement};
use crate::ingest::{clean_description, retry_with_backoff};
use crate::sources::http::HttpFetcher;
use crate::sources::types::{FetchOptions, SourceConfig};
use crate::{Result, TrendError};

const PER_PAGE: u32 = 30;
const MAX_TAGS: usize = 6;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Repository>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    id: u64,
    full_name: String,
    html_url: String,
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    language: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    created_at: Option<DateTime<Utc>>,
    owner: Option<Owner>,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
    avatar_url: Option<String>,
}

/// Adapter for GitHub trending repositories.
pub struct GitHubTrendingAdapter {
    source: SourceConfig,
    http: HttpFetcher,
    token: Option<String>,
}

impl GitHubTrendingAdapter {
    /// `token` is sent as a bearer token when present, raising rate limits.
    pub fn new(source: SourceConfig, http: HttpFetcher, token: Option<String>) -> Self {
        Self {
            source,
            http,
            token,
        }
    }

    fn search_url(&self, options: &FetchOptions, now: DateTime<Utc>) -> Result<String> {
        let since = options
            .time_range
            .map(|r| r.cutoff(now))
            .unwrap_or_else(|| now - Duration::days(7));
        let mut url = url::Url::parse(&self.source.url)
            .map_err(|e| TrendError::Config(format!("bad GitHub endpoint: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("q", &format!("created:>{}", since.format("%Y-%m-%d")))
            .append_pair("sort", "stars")
            .append_pair("order", "desc")
            .append_pair("per_page", &PER_PAGE.to_string());
        Ok(url.to_string())
    }

    fn to_item(&self, repo: Repository, now: DateTime<Utc>) -> ContentItem {
        let mut tags: Vec<String> = repo.language.into_iter().collect();
        tags.extend(repo.topics);
        tags.truncate(MAX_TAGS);

        let mut item = ContentItem::new(
            &self.source.id,
            &repo.id.to_string(),
            repo.full_name,
            repo.html_url,
            repo.created_at.unwrap_or(now),
        )
        .with_tags(tags)
        .with_engagement(Engagement {
            stars: Some(repo.stargazers_count),
            forks: Some(repo.forks_count),
            ..Default::default()
        });
        if let Some(description) = repo.description {
            item = item.with_description(clean_description(&description));
        }
        if let Some(owner) = repo.owner {
            item = item.with_author(owner.login);
            if let Some(avatar) = owner.avatar_url {
                item = item.with_image_url(avatar);
            }
        }
        item
    }
}

#[async_trait]
impl SourceAdapter for GitHubTrendingAdapter {
    fn source_id(&self) -> &str {
        &self.source.id
    }

    async fn try_fetch(&self, options: &FetchOptions) -> Result<Vec<ContentItem>> {
        let now = Utc::now();
        let url = self.search_url(options, now)?;
        let http = &self.http;
        let url = url.as_str();
        let token = self.token.as_deref();
        let response: SearchResponse = retry_with_backoff(&self.source.id, options.retry_policy(), move || {
            http.get_json(url, token)
        })
        .await?;

        let items = response
            .items
            .into_iter()
            .map(|repo| self.to_item(repo, now))
            .collect();
        Ok(finish(&self.source, items, options))
    }
}
