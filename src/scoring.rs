//! Trending score.
//!
//! ```text
//! score = 100 * priority/5 * category_weight * 0.5^(age_h / half_life)
//!         * (1 + ew * ln(1 + metric)) * (1 + vw * ln(1 + max(velocity, 0)))
//!         + boost_bonus * matched_keywords
//! ```
//!
//! Scoring is a pure function of the item, its source's priority and
//! category, its velocity and `now`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::config::ScoringConfig;
use crate::content::ContentItem;
use crate::ingest::KeywordMatcher;
use crate::sources::{Category, DEFAULT_PRIORITY, PRIORITY_RANGE};

/// Per-request inputs to [`Scorer::rank`].
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub priorities: &'a BTreeMap<String, u8>,
    pub categories: &'a HashMap<String, Category>,
    pub velocities: &'a HashMap<String, f64>,
    pub boost: &'a KeywordMatcher,
    pub now: DateTime<Utc>,
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

/// Computes trending scores.
#[derive(Debug, Clone)]
pub struct Scorer {
    config: ScoringConfig,
    category_weights: HashMap<Category, f64>,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> Self {
        let category_weights = config
            .category_weights
            .iter()
            .filter_map(|(name, w)| name.parse::<Category>().ok().map(|c| (c, *w)))
            .collect();
        Self {
            config,
            category_weights,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    fn category_weight(&self, category: Option<Category>) -> f64 {
        category
            .and_then(|c| self.category_weights.get(&c).copied())
            .unwrap_or(1.0)
    }

    /// Score of one item. Also returns the boost keywords it matched.
    pub fn score(&self, item: &ContentItem, ctx: &ScoringContext<'_>) -> (f64, Vec<String>) {
        let priority = ctx
            .priorities
            .get(&item.source_id)
            .copied()
            .unwrap_or(DEFAULT_PRIORITY) as f64;
        let priority_weight = priority / f64::from(*PRIORITY_RANGE.end());
        let category_weight = self.category_weight(ctx.categories.get(&item.source_id).copied());

        let age_hours = ((ctx.now - item.published_at).num_seconds().max(0) as f64) / 3600.0;
        let half_life = self.config.half_life_hours.max(f64::MIN_POSITIVE);
        let recency = 0.5f64.powf(age_hours / half_life);

        let metric = item
            .engagement
            .as_ref()
            .map(|e| e.primary_metric())
            .unwrap_or(0) as f64;
        let engagement = 1.0 + self.config.engagement_weight * metric.ln_1p();

        let velocity = ctx
            .velocities
            .get(&item.id)
            .copied()
            .or(item.velocity_score)
            .unwrap_or(0.0)
            .max(0.0);
        let momentum = 1.0 + self.config.velocity_weight * velocity.ln_1p();

        let matched = if ctx.boost.is_empty() {
            Vec::new()
        } else {
            ctx.boost.find_matches(&item.search_text())
        };
        let bonus = self.config.boost_bonus * matched.len() as f64;

        let score = 100.0 * priority_weight * category_weight * recency * engagement * momentum + bonus;
        (score, matched)
    }

    /// Score every item and sort best first.
    ///
    /// Ties break on newer publish time, then id.
    pub fn rank(&self, items: Vec<ContentItem>, ctx: &ScoringContext<'_>) -> Vec<ContentItem> {
        let mut scored: Vec<ContentItem> = items
            .into_iter()
            .map(|mut item| {
                let (score, matched) = self.score(&item, ctx);
                item.trending_score = Some(score);
                item.matched_keywords = Some(matched);
                if let Some(v) = ctx.velocities.get(&item.id) {
                    item.velocity_score = Some(*v);
                }
                item
            })
            .collect();

        scored.sort_by(|a, b| {
            let (sa, sb) = (a.trending_score.unwrap_or(0.0), b.trending_score.unwrap_or(0.0));
            sb.partial_cmp(&sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.published_at.cmp(&a.published_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        scored
    }
}
