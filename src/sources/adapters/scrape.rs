//! HTML listing scraper.
//!
//! Works from loose structural hints instead of exact markup: entries are
//! `<article>` elements, else elements whose class mentions card/post/item,
//! else list items. Inside an entry the title comes from a heading (or a
//! title-ish class), the date from `<time>` or a recognizable date string.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{finish, SourceAdapter};
use crate::content::ContentItem;
use crate::ingest::{clean_description, retry_with_backoff, strip_html};
use crate::sources::http::HttpFetcher;
use crate::sources::types::{FetchOptions, SourceConfig};
use crate::Result;

static ARTICLE: Lazy<Selector> = Lazy::new(|| selector("article"));
static HINTED: Lazy<Selector> = Lazy::new(|| {
    selector(r#"[class*="card"], [class*="post"], [class*="item"], [class*="entry"]"#)
});
static LIST_ITEM: Lazy<Selector> = Lazy::new(|| selector("li"));
static HEADING: Lazy<Selector> = Lazy::new(|| selector("h1, h2, h3, h4"));
static TITLE_CLASS: Lazy<Selector> = Lazy::new(|| selector(r#"[class*="title"], [class*="headline"]"#));
static LINK: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static TIME: Lazy<Selector> = Lazy::new(|| selector("time"));
static SUMMARY: Lazy<Selector> = Lazy::new(|| selector("p"));
static IMAGE: Lazy<Selector> = Lazy::new(|| selector("img[src]"));

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:\d{4}-\d{2}-\d{2}|(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4}|\d{1,2}\s+(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{4})\b",
    )
    .expect("valid regex")
});

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// Adapter that scrapes a listing page.
pub struct ScrapeAdapter {
    source: SourceConfig,
    http: HttpFetcher,
}

impl ScrapeAdapter {
    pub fn new(source: SourceConfig, http: HttpFetcher) -> Self {
        Self { source, http }
    }
}

#[async_trait]
impl SourceAdapter for ScrapeAdapter {
    fn source_id(&self) -> &str {
        &self.source.id
    }

    async fn try_fetch(&self, options: &FetchOptions) -> Result<Vec<ContentItem>> {
        let http = &self.http;
        let url = self.source.url.as_str();
        let html = retry_with_backoff(&self.source.id, options.retry_policy(), move || {
            http.get_text(url, None)
        })
        .await?;

        let items = parse_listing(&self.source.id, &self.source.url, &html, Utc::now());
        Ok(finish(&self.source, items, options))
    }
}

/// Extract entries from a listing page.
///
/// Entries with neither a title nor a date are navigation or boilerplate
/// and are skipped. Entries without a date are stamped `now`.
pub fn parse_listing(source_id: &str, page_url: &str, html: &str, now: DateTime<Utc>) -> Vec<ContentItem> {
    let document = Html::parse_document(html);
    let base = url::Url::parse(page_url).ok();

    let candidates: Vec<ElementRef> = [&*ARTICLE, &*HINTED, &*LIST_ITEM]
        .into_iter()
        .map(|sel| document.select(sel).collect::<Vec<_>>())
        .find(|found| !found.is_empty())
        .unwrap_or_default();

    let mut items: Vec<ContentItem> = Vec::new();
    for element in candidates {
        let title = element
            .select(&HEADING)
            .chain(element.select(&TITLE_CLASS))
            .map(text_of)
            .find(|t| !t.is_empty());
        let date = entry_date(element);
        if title.is_none() && date.is_none() {
            continue;
        }

        let link = element
            .select(&LINK)
            .filter_map(|a| a.value().attr("href"))
            .find(|href| !href.starts_with('#') && !href.starts_with("javascript:"))
            .map(|href| resolve(base.as_ref(), href));

        let title = match title.or_else(|| element.select(&LINK).map(text_of).find(|t| !t.is_empty())) {
            Some(t) => t,
            None => continue,
        };
        let url = link.clone().unwrap_or_else(|| page_url.to_string());
        let native_id = link.unwrap_or_else(|| title.clone());

        let mut item = ContentItem::new(source_id, &native_id, title, url, date.unwrap_or(now));
        if let Some(summary) = element.select(&SUMMARY).map(text_of).find(|t| !t.is_empty()) {
            item = item.with_description(clean_description(&summary));
        }
        if let Some(src) = element.select(&IMAGE).filter_map(|i| i.value().attr("src")).next() {
            item = item.with_image_url(resolve(base.as_ref(), src));
        }
        items.push(item);
    }
    items
}

fn text_of(element: ElementRef) -> String {
    strip_html(&element.text().collect::<Vec<_>>().join(" "))
}

fn resolve(base: Option<&url::Url>, href: &str) -> String {
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}

fn entry_date(element: ElementRef) -> Option<DateTime<Utc>> {
    if let Some(time) = element.select(&TIME).next() {
        let parsed = time
            .value()
            .attr("datetime")
            .and_then(parse_date)
            .or_else(|| parse_date(&text_of(time)));
        if parsed.is_some() {
            return parsed;
        }
    }
    let text = text_of(element);
    DATE_PATTERN.find(&text).and_then(|m| parse_date(m.as_str()))
}

/// Parse the date formats listing pages commonly use.
pub(crate) fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // "Sept. 5, 2025" -> "Sep 5, 2025"
    let cleaned = raw.replace('.', "").replace("Sept ", "Sep ");
    const FORMATS: &[&str] = &["%Y-%m-%d", "%b %d, %Y", "%B %d, %Y", "%b %d %Y", "%B %d %Y", "%d %B %Y", "%d %b %Y"];
    FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(&cleaned, f).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    const PAGE: &str = r#"<html><body>
        <nav><ul><li><a href="/">Home</a></li><li><a href="/about">About</a></li></ul></nav>
        <main>
          <article>
            <a href="/news/claude-update"><h3>Introducing a faster model</h3></a>
            <time datetime="2025-03-04T00:00:00Z">Mar 4, 2025</time>
            <p>Today we release a faster model.</p>
            <img src="/img/hero.png">
          </article>
          <article>
            <a href="https://example.com/news/policy"><span class="post-title">Policy update</span></a>
            <span>Feb 20, 2025</span>
          </article>
          <article><div class="share">Share this</div></article>
        </main>
    </body></html>"#;

    #[test]
    fn test_parse_listing_articles() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
        let items = parse_listing("lab", "https://example.com/news", PAGE, now);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Introducing a faster model");
        assert_eq!(items[0].url, "https://example.com/news/claude-update");
        assert_eq!(items[0].published_at.day(), 4);
        assert_eq!(items[0].description, "Today we release a faster model.");
        assert_eq!(items[0].image_url.as_deref(), Some("https://example.com/img/hero.png"));

        assert_eq!(items[1].title, "Policy update");
        assert_eq!(items[1].published_at, Utc.with_ymd_and_hms(2025, 2, 20, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_falls_back_to_hinted_classes() {
        let page = r#"<div class="card"><h2>Model A</h2><a href="/a">open</a></div>
                      <div class="card"><h2>Model B</h2><a href="/b">open</a></div>"#;
        let items = parse_listing("lb", "https://lb.example.com/", page, Utc::now());
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].url, "https://lb.example.com/b");
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 9, 5, 0, 0, 0).unwrap();
        assert_eq!(parse_date("2025-09-05"), Some(expected));
        assert_eq!(parse_date("Sept. 5, 2025"), Some(expected));
        assert_eq!(parse_date("September 5, 2025"), Some(expected));
        assert_eq!(parse_date("5 Sep 2025"), Some(expected));
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_boilerplate_page_yields_nothing() {
        let items = parse_listing("x", "https://x.example.com", "<ul><li><a href='/'>Home</a></li></ul>", Utc::now());
        assert!(items.is_empty());
    }
}
