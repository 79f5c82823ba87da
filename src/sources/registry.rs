//! Built-in source definitions.

use super::types::{Category, FetchMethod, SourceConfig};

/// Source id of the Hacker News front page adapter.
pub const HACKER_NEWS: &str = "hacker-news";
/// Source id of the GitHub trending adapter.
pub const GITHUB_TRENDING: &str = "github-trending";
/// Source id of the Hugging Face models adapter.
pub const HUGGINGFACE_MODELS: &str = "huggingface-models";
/// Prefix of sources routed to the Medium enrichment adapter.
pub const MEDIUM_PREFIX: &str = "medium-";

/// The static source list, in display order.
pub fn static_sources() -> Vec<SourceConfig> {
    use Category::*;

    vec![
        // community
        SourceConfig::endpoint(
            HACKER_NEWS,
            "Hacker News",
            Community,
            "https://hn.algolia.com/api/v1/search?tags=front_page&hitsPerPage=50",
            FetchMethod::Api,
        )
        .with_priority(5)
        .with_relevance_filter(),
        SourceConfig::feed("lobsters", "Lobsters", Community, "https://lobste.rs", "https://lobste.rs/rss")
            .with_relevance_filter(),
        SourceConfig::feed(
            "reddit-machinelearning",
            "r/MachineLearning",
            Community,
            "https://www.reddit.com/r/MachineLearning",
            "https://www.reddit.com/r/MachineLearning/.rss",
        )
        .with_priority(4),
        // social
        SourceConfig::feed(
            "medium-ai",
            "Medium: Artificial Intelligence",
            Social,
            "https://medium.com/tag/artificial-intelligence",
            "https://medium.com/feed/tag/artificial-intelligence",
        ),
        SourceConfig::feed("devto-ai", "DEV Community: AI", Social, "https://dev.to/t/ai", "https://dev.to/feed/tag/ai")
            .with_priority(2),
        // news
        SourceConfig::feed(
            "techcrunch-ai",
            "TechCrunch AI",
            News,
            "https://techcrunch.com/category/artificial-intelligence",
            "https://techcrunch.com/category/artificial-intelligence/feed/",
        )
        .with_priority(4),
        SourceConfig::feed(
            "the-verge-ai",
            "The Verge AI",
            News,
            "https://www.theverge.com/ai-artificial-intelligence",
            "https://www.theverge.com/rss/ai-artificial-intelligence/index.xml",
        ),
        SourceConfig::feed(
            "ars-technica",
            "Ars Technica",
            News,
            "https://arstechnica.com",
            "https://feeds.arstechnica.com/arstechnica/technology-lab",
        )
        .with_relevance_filter(),
        // ai-labs
        SourceConfig::feed("openai-news", "OpenAI News", AiLabs, "https://openai.com/news", "https://openai.com/news/rss.xml")
            .with_priority(5),
        SourceConfig::feed(
            "google-deepmind",
            "Google DeepMind",
            AiLabs,
            "https://deepmind.google/discover/blog",
            "https://deepmind.google/blog/rss.xml",
        )
        .with_priority(5),
        SourceConfig::endpoint(
            "anthropic-news",
            "Anthropic News",
            AiLabs,
            "https://www.anthropic.com/news",
            FetchMethod::Scrape,
        )
        .with_priority(5),
        // dev-platforms
        SourceConfig::endpoint(
            GITHUB_TRENDING,
            "GitHub Trending",
            DevPlatforms,
            "https://api.github.com/search/repositories",
            FetchMethod::Api,
        )
        .with_priority(4)
        .with_api_key("GITHUB_TOKEN", false),
        SourceConfig::endpoint(
            HUGGINGFACE_MODELS,
            "Hugging Face Models",
            DevPlatforms,
            "https://huggingface.co/api/models?sort=likes7d&direction=-1&limit=30",
            FetchMethod::Api,
        )
        .with_api_key("HF_TOKEN", false),
        // newsletters
        SourceConfig::feed("import-ai", "Import AI", Newsletters, "https://importai.substack.com", "https://importai.substack.com/feed"),
        SourceConfig::feed("latent-space", "Latent Space", Newsletters, "https://www.latent.space", "https://www.latent.space/feed"),
        // leaderboards
        SourceConfig::endpoint(
            "lmarena",
            "LMArena Leaderboard",
            Leaderboards,
            "https://lmarena.ai/leaderboard",
            FetchMethod::Scrape,
        )
        .with_priority(2),
    ]
}

/// Look up a static source by id.
pub fn find_static(id: &str) -> Option<SourceConfig> {
    static_sources().into_iter().find(|s| s.id == id)
}
