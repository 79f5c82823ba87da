//! Feed request parameters.

use serde::Deserialize;

use crate::content::TimeRange;
use crate::sources::Category;
use crate::{Result, TrendError};

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 200;

/// Raw query string, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedParams {
    pub time_range: Option<String>,
    /// Comma-separated category list.
    pub category: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// A validated feed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    /// `None` uses the stored default range.
    pub time_range: Option<TimeRange>,
    /// Empty means every category.
    pub categories: Vec<Category>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            time_range: None,
            categories: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl TryFrom<FeedParams> for FeedQuery {
    type Error = TrendError;

    fn try_from(params: FeedParams) -> Result<Self> {
        let time_range = params
            .time_range
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<TimeRange>().map_err(|_| TrendError::InvalidParameter {
                    message: format!("Invalid timeRange: {s}"),
                    valid_values: TimeRange::valid_values(),
                })
            })
            .transpose()?;

        let mut categories = Vec::new();
        for name in params
            .category
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let category = name.parse::<Category>().map_err(|_| TrendError::InvalidParameter {
                message: format!("Invalid category: {name}"),
                valid_values: Category::valid_values(),
            })?;
            if !categories.contains(&category) {
                categories.push(category);
            }
        }

        let limit = match params.limit.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_LIMIT,
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| (1..=MAX_LIMIT).contains(n))
                .ok_or_else(|| {
                    TrendError::Validation(format!("limit must be between 1 and {MAX_LIMIT}"))
                })?,
        };

        let offset = match params.offset.as_deref().map(str::trim) {
            None | Some("") => 0,
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| TrendError::Validation("offset must be a non-negative integer".into()))?,
        };

        Ok(FeedQuery {
            time_range,
            categories,
            limit,
            offset,
        })
    }
}
