//! Content item types for trendfeed.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::TrendError;

/// Maximum length for an item description, in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

/// Derive the stable id of an item from its source and upstream identifier.
///
/// SHA-256 over `source_id`, a NUL separator and the native identifier,
/// truncated to 64 bits and rendered as 16 lowercase hex digits.
pub fn content_id(source_id: &str, native_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(native_id.as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    format!("{:016x}", u64::from_be_bytes(prefix))
}

/// Requested look-back window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeRange {
    /// Last hour.
    #[serde(rename = "1h")]
    Hour,
    /// Last 12 hours.
    #[serde(rename = "12h")]
    HalfDay,
    /// Last 24 hours.
    #[serde(rename = "24h")]
    Day,
    /// Last 48 hours.
    #[serde(rename = "48h")]
    TwoDays,
    /// Last 7 days.
    #[serde(rename = "7d")]
    Week,
}

impl TimeRange {
    /// Every range, narrowest first.
    pub const ALL: [TimeRange; 5] = [
        TimeRange::Hour,
        TimeRange::HalfDay,
        TimeRange::Day,
        TimeRange::TwoDays,
        TimeRange::Week,
    ];

    /// Wire name of the range.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Hour => "1h",
            TimeRange::HalfDay => "12h",
            TimeRange::Day => "24h",
            TimeRange::TwoDays => "48h",
            TimeRange::Week => "7d",
        }
    }

    /// Length of the window.
    pub fn duration(&self) -> Duration {
        match self {
            TimeRange::Hour => Duration::hours(1),
            TimeRange::HalfDay => Duration::hours(12),
            TimeRange::Day => Duration::hours(24),
            TimeRange::TwoDays => Duration::hours(48),
            TimeRange::Week => Duration::days(7),
        }
    }

    /// Oldest publish time still inside the window.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }

    /// Wire names of all ranges, for validation messages.
    pub fn valid_values() -> Vec<String> {
        Self::ALL.iter().map(|r| r.as_str().to_string()).collect()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = TrendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeRange::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| TrendError::Validation(format!("invalid time range: {s}")))
    }
}

/// Sparse engagement counters.
///
/// Only the counters meaningful to the source's platform are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engagement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upvotes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stars: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forks: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claps: Option<u64>,
}

impl Engagement {
    /// The metric velocity is measured on.
    ///
    /// First non-zero value in the order views, upvotes, stars, likes,
    /// downloads, claps; zero when none is set.
    pub fn primary_metric(&self) -> u64 {
        [
            self.views,
            self.upvotes,
            self.stars,
            self.likes,
            self.downloads,
            self.claps,
        ]
        .into_iter()
        .flatten()
        .find(|v| *v > 0)
        .unwrap_or(0)
    }

    /// Whether no counter is set.
    pub fn is_empty(&self) -> bool {
        *self == Engagement::default()
    }
}

/// Classifier label stored with an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    /// Stored name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }

    /// Parse a stored name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Sentiment::Positive),
            "negative" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }
}

/// A normalized content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    /// Stable id, see [`content_id`].
    pub id: String,
    /// Source this item came from.
    pub source_id: String,
    /// Item title.
    pub title: String,
    /// Plain-text summary (HTML stripped, capped).
    pub description: String,
    /// Link to the original content.
    pub url: String,
    /// Preview image.
    pub image_url: Option<String>,
    /// Author name.
    pub author: Option<String>,
    /// Upstream tags, in upstream order.
    pub tags: Vec<String>,
    /// When the content was published upstream.
    pub published_at: DateTime<Utc>,
    /// When we ingested it.
    pub fetched_at: DateTime<Utc>,
    /// Engagement counters, when the platform exposes any.
    pub engagement: Option<Engagement>,
    /// Sentiment label.
    pub sentiment: Option<Sentiment>,
    /// Sentiment score in [-1, 1].
    pub sentiment_score: Option<f64>,
    /// Read-time rank, never persisted.
    #[serde(skip)]
    pub trending_score: Option<f64>,
    /// Latest engagement velocity.
    pub velocity_score: Option<f64>,
    /// Boost keywords found in the item's text, set at read time.
    #[serde(skip)]
    pub matched_keywords: Option<Vec<String>>,
}

impl ContentItem {
    /// Create an item with the derived id and the minimum required fields.
    pub fn new(
        source_id: impl Into<String>,
        native_id: &str,
        title: impl Into<String>,
        url: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        let source_id = source_id.into();
        Self {
            id: content_id(&source_id, native_id),
            source_id,
            title: title.into(),
            description: String::new(),
            url: url.into(),
            image_url: None,
            author: None,
            tags: Vec::new(),
            published_at,
            fetched_at: Utc::now(),
            engagement: None,
            sentiment: None,
            sentiment_score: None,
            trending_score: None,
            velocity_score: None,
            matched_keywords: None,
        }
    }

    /// Set the description, truncated to [`MAX_DESCRIPTION_LENGTH`] characters.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let desc = description.into();
        self.description = if desc.chars().count() > MAX_DESCRIPTION_LENGTH {
            desc.chars().take(MAX_DESCRIPTION_LENGTH).collect()
        } else {
            desc
        };
        self
    }

    /// Set the author, ignoring blank names.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        let author = author.into();
        if !author.trim().is_empty() {
            self.author = Some(author.trim().to_string());
        }
        self
    }

    /// Set the preview image.
    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Set the tags.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the engagement counters.
    pub fn with_engagement(mut self, engagement: Engagement) -> Self {
        self.engagement = if engagement.is_empty() {
            None
        } else {
            Some(engagement)
        };
        self
    }

    /// Title and description joined, for keyword matching.
    pub fn search_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_is_deterministic() {
        assert_eq!(content_id("hn", "123"), content_id("hn", "123"));
        assert_eq!(content_id("hn", "123").len(), 16);
    }

    #[test]
    fn test_content_id_differs_by_native_id_and_source() {
        assert_ne!(content_id("hn", "123"), content_id("hn", "124"));
        assert_ne!(content_id("hn", "123"), content_id("lobsters", "123"));
        // the separator keeps ("ab", "c") and ("a", "bc") apart
        assert_ne!(content_id("ab", "c"), content_id("a", "bc"));
    }

    #[test]
    fn test_time_range_parse() {
        assert_eq!("1h".parse::<TimeRange>().unwrap(), TimeRange::Hour);
        assert_eq!("7d".parse::<TimeRange>().unwrap(), TimeRange::Week);
        assert!("3d".parse::<TimeRange>().is_err());
        assert_eq!(TimeRange::valid_values(), vec!["1h", "12h", "24h", "48h", "7d"]);
    }

    #[test]
    fn test_time_range_serde_uses_wire_names() {
        let json = serde_json::to_string(&TimeRange::TwoDays).unwrap();
        assert_eq!(json, "\"48h\"");
        let parsed: TimeRange = serde_json::from_str("\"12h\"").unwrap();
        assert_eq!(parsed, TimeRange::HalfDay);
    }

    #[test]
    fn test_time_ranges_are_nested() {
        let now = Utc::now();
        for pair in TimeRange::ALL.windows(2) {
            assert!(pair[0].cutoff(now) > pair[1].cutoff(now));
        }
    }

    #[test]
    fn test_primary_metric_preference() {
        let e = Engagement {
            upvotes: Some(10),
            stars: Some(99),
            ..Default::default()
        };
        assert_eq!(e.primary_metric(), 10);

        let zero_views = Engagement {
            views: Some(0),
            likes: Some(7),
            ..Default::default()
        };
        assert_eq!(zero_views.primary_metric(), 7);

        // comments and forks never drive velocity
        let comments_only = Engagement {
            comments: Some(50),
            forks: Some(3),
            ..Default::default()
        };
        assert_eq!(comments_only.primary_metric(), 0);
    }

    #[test]
    fn test_description_truncated_by_chars() {
        let long = "é".repeat(MAX_DESCRIPTION_LENGTH + 10);
        let item = ContentItem::new("s", "1", "t", "https://x", Utc::now()).with_description(long);
        assert_eq!(item.description.chars().count(), MAX_DESCRIPTION_LENGTH);
    }

    #[test]
    fn test_empty_engagement_is_dropped() {
        let item = ContentItem::new("s", "1", "t", "https://x", Utc::now())
            .with_engagement(Engagement::default());
        assert!(item.engagement.is_none());
    }

    #[test]
    fn test_blank_author_ignored() {
        let item = ContentItem::new("s", "1", "t", "https://x", Utc::now()).with_author("   ");
        assert!(item.author.is_none());
    }
}
