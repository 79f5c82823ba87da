//! Hugging Face model hub listing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{finish, SourceAdapter};
use crate::content::{ContentItem, Engagement};
use crate::ingest::retry_with_backoff;
use crate::sources::http::HttpFetcher;
use crate::sources::types::{FetchOptions, SourceConfig};
use crate::Result;

const MODEL_URL: &str = "https://huggingface.co/";
const MAX_TAGS: usize = 8;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Model {
    id: Option<String>,
    model_id: Option<String>,
    likes: Option<u64>,
    downloads: Option<u64>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(rename = "pipeline_tag")]
    pipeline_tag: Option<String>,
    created_at: Option<DateTime<Utc>>,
    last_modified: Option<DateTime<Utc>>,
    author: Option<String>,
}

/// Adapter for trending Hugging Face models.
pub struct HuggingFaceAdapter {
    source: SourceConfig,
    http: HttpFetcher,
    token: Option<String>,
}

impl HuggingFaceAdapter {
    pub fn new(source: SourceConfig, http: HttpFetcher, token: Option<String>) -> Self {
        Self {
            source,
            http,
            token,
        }
    }
}

fn to_item(source_id: &str, model: Model, now: DateTime<Utc>) -> Option<ContentItem> {
    let name = model.id.or(model.model_id).filter(|n| !n.is_empty())?;
    let author = model
        .author
        .clone()
        .or_else(|| name.split_once('/').map(|(owner, _)| owner.to_string()));

    let description = match (&model.pipeline_tag, &author) {
        (Some(task), Some(author)) => format!("{} model by {}", task, author),
        (Some(task), None) => format!("{} model", task),
        (None, Some(author)) => format!("Model by {}", author),
        (None, None) => String::new(),
    };

    let mut tags: Vec<String> = model.pipeline_tag.iter().cloned().collect();
    for tag in model.tags {
        // skip hub bookkeeping tags like "license:mit" or "region:us"
        if !tag.contains(':') && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags.truncate(MAX_TAGS);

    let mut item = ContentItem::new(
        source_id,
        &name,
        name.clone(),
        format!("{}{}", MODEL_URL, name),
        model.created_at.or(model.last_modified).unwrap_or(now),
    )
    .with_description(description)
    .with_tags(tags)
    .with_engagement(Engagement {
        likes: model.likes,
        downloads: model.downloads,
        ..Default::default()
    });
    if let Some(author) = author {
        item = item.with_author(author);
    }
    Some(item)
}

#[async_trait]
impl SourceAdapter for HuggingFaceAdapter {
    fn source_id(&self) -> &str {
        &self.source.id
    }

    async fn try_fetch(&self, options: &FetchOptions) -> Result<Vec<ContentItem>> {
        let http = &self.http;
        let url = self.source.url.as_str();
        let token = self.token.as_deref();
        let models: Vec<Model> = retry_with_backoff(&self.source.id, options.retry_policy(), move || {
            http.get_json(url, token)
        })
        .await?;

        let now = Utc::now();
        let items = models
            .into_iter()
            .filter_map(|m| to_item(&self.source.id, m, now))
            .collect();
        Ok(finish(&self.source, items, options))
    }
}
