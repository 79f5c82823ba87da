//! Text normalization and batch filters shared by every adapter.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::content::{ContentItem, TimeRange, MAX_DESCRIPTION_LENGTH};

/// Strip HTML tags from text, decode common entities and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut in_entity = false;
    let mut entity = String::new();

    for ch in html.chars() {
        match ch {
            '<' if !in_entity => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                // tags separate words
                result.push(' ');
            }
            '&' if !in_tag => {
                if in_entity {
                    // a bare ampersand followed by another one
                    result.push('&');
                    result.push_str(&entity);
                }
                in_entity = true;
                entity.clear();
            }
            ';' if in_entity => {
                in_entity = false;
                push_entity(&mut result, &entity);
            }
            _ if in_entity => {
                if ch.is_alphanumeric() || ch == '#' {
                    entity.push(ch);
                } else {
                    in_entity = false;
                    result.push('&');
                    result.push_str(&entity);
                    result.push(ch);
                }
            }
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    if in_entity {
        result.push('&');
        result.push_str(&entity);
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_entity(out: &mut String, entity: &str) {
    match entity {
        "amp" => out.push('&'),
        "lt" => out.push('<'),
        "gt" => out.push('>'),
        "quot" => out.push('"'),
        "apos" | "#39" => out.push('\''),
        "nbsp" => out.push(' '),
        "mdash" => out.push('\u{2014}'),
        "ndash" => out.push('\u{2013}'),
        "hellip" => out.push('\u{2026}'),
        _ if entity.starts_with('#') => {
            if let Some(c) = parse_numeric_entity(entity).and_then(char::from_u32) {
                out.push(c);
            }
        }
        _ => {
            out.push('&');
            out.push_str(entity);
            out.push(';');
        }
    }
}

/// Parse a numeric HTML entity (`#123` or `#x7B`).
fn parse_numeric_entity(entity: &str) -> Option<u32> {
    let body = entity.strip_prefix('#')?;
    match body.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => body.parse().ok(),
    }
}

/// Truncate to [`MAX_DESCRIPTION_LENGTH`] characters.
pub fn truncate_description(text: &str) -> String {
    if text.chars().count() <= MAX_DESCRIPTION_LENGTH {
        text.to_string()
    } else {
        text.chars().take(MAX_DESCRIPTION_LENGTH).collect()
    }
}

/// Strip markup and cap length, for upstream summaries.
pub fn clean_description(raw: &str) -> String {
    truncate_description(&strip_html(raw))
}

/// Drop items published before the range cutoff.
///
/// `None` keeps everything.
pub fn filter_by_time_range(
    items: Vec<ContentItem>,
    range: Option<TimeRange>,
    now: DateTime<Utc>,
) -> Vec<ContentItem> {
    match range {
        None => items,
        Some(range) => {
            let cutoff = range.cutoff(now);
            items
                .into_iter()
                .filter(|item| item.published_at >= cutoff)
                .collect()
        }
    }
}

/// Remove items with a repeated id. The first occurrence wins.
pub fn dedup_by_id(items: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(native: &str, title: &str, age_hours: i64) -> ContentItem {
        ContentItem::new(
            "src",
            native,
            title,
            "https://example.com",
            Utc::now() - Duration::hours(age_hours),
        )
    }

    #[test]
    fn test_strip_html_basic() {
        assert_eq!(strip_html("<p>Hello</p>"), "Hello");
        assert_eq!(strip_html("<b>Bold</b> text"), "Bold text");
        assert_eq!(strip_html("<p>one</p><p>two</p>"), "one two");
    }

    #[test]
    fn test_strip_html_entities() {
        assert_eq!(strip_html("&amp;"), "&");
        assert_eq!(strip_html("&lt;tag&gt;"), "<tag>");
        assert_eq!(strip_html("&quot;quoted&quot;"), "\"quoted\"");
        assert_eq!(strip_html("it&#39;s"), "it's");
        assert_eq!(strip_html("&#x41;&#66;"), "AB");
        assert_eq!(strip_html("&unknown;"), "&unknown;");
    }

    #[test]
    fn test_strip_html_bare_ampersand() {
        assert_eq!(strip_html("R&D budget"), "R&D budget");
        assert_eq!(strip_html("Q & A"), "Q & A");
        assert_eq!(strip_html("AT&T"), "AT&T");
    }

    #[test]
    fn test_strip_html_whitespace() {
        assert_eq!(strip_html("<p>\n\tNewlines\n\tand\ttabs\n</p>"), "Newlines and tabs");
    }

    #[test]
    fn test_clean_description_caps_length() {
        let long = format!("<div>{}</div>", "a".repeat(MAX_DESCRIPTION_LENGTH * 2));
        assert_eq!(clean_description(&long).len(), MAX_DESCRIPTION_LENGTH);
    }

    #[test]
    fn test_filter_by_time_range() {
        let now = Utc::now();
        let items = vec![item("1", "new", 0), item("2", "old", 30)];

        let kept = filter_by_time_range(items.clone(), Some(TimeRange::Day), now);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "new");

        let all = filter_by_time_range(items, None, now);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_dedup_first_occurrence_wins() {
        let items = vec![item("1", "first", 0), item("2", "other", 0), item("1", "second", 0)];
        let deduped = dedup_by_id(items);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "first");
    }
}
