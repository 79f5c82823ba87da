//! Keyword matching for topical filtering and boost keywords.
//!
//! Short keywords such as "AI" or "ML" collide with ordinary words ("said",
//! "html"), so they are matched only at word boundaries. Longer keywords and
//! multi-word phrases are matched as case-insensitive substrings.

use once_cell::sync::Lazy;
use regex::Regex;

/// Keywords at or below this many characters need a word-boundary match.
pub const SHORT_KEYWORD_MAX_LEN: usize = 3;

/// Default topic list for sources flagged with a relevance filter.
pub const AI_KEYWORDS: &[&str] = &[
    "ai",
    "ml",
    "llm",
    "gpt",
    "agi",
    "rag",
    "nlp",
    "artificial intelligence",
    "machine learning",
    "deep learning",
    "neural network",
    "language model",
    "transformer",
    "diffusion",
    "openai",
    "anthropic",
    "claude",
    "gemini",
    "mistral",
    "llama",
    "hugging face",
    "huggingface",
    "chatbot",
    "embedding",
    "fine-tun",
    "inference",
    "reinforcement learning",
    "computer vision",
    "copilot",
];

static DEFAULT_AI_MATCHER: Lazy<KeywordMatcher> =
    Lazy::new(|| KeywordMatcher::new(AI_KEYWORDS.iter().copied()));

#[derive(Debug, Clone)]
enum Pattern {
    Word(Regex),
    Substring(String),
}

#[derive(Debug, Clone)]
struct Keyword {
    original: String,
    pattern: Pattern,
}

/// Whole-word pattern for a short keyword.
///
/// `\b` only holds next to a word character, so a side that starts or ends
/// with a symbol (`c#`, `c++`) is anchored on a non-word character instead.
fn word_pattern(keyword: &str) -> Option<Regex> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let start = if keyword.starts_with(is_word) { r"\b" } else { r"(?:^|[^\w])" };
    let end = if keyword.ends_with(is_word) { r"\b" } else { r"(?:$|[^\w])" };
    Regex::new(&format!("(?i){start}{}{end}", regex::escape(keyword))).ok()
}

/// Compiled keyword set.
#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    keywords: Vec<Keyword>,
}

impl KeywordMatcher {
    /// Compile a keyword list. Blank entries are ignored.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .filter_map(|k| {
                let original = k.as_ref().trim().to_string();
                if original.is_empty() {
                    return None;
                }
                let lowered = original.to_lowercase();
                let pattern = if lowered.chars().count() <= SHORT_KEYWORD_MAX_LEN
                    && !lowered.contains(char::is_whitespace)
                {
                    Pattern::Word(word_pattern(&lowered)?)
                } else {
                    Pattern::Substring(lowered)
                };
                Some(Keyword { original, pattern })
            })
            .collect();
        Self { keywords }
    }

    /// The built-in AI topic matcher.
    pub fn ai_default() -> &'static KeywordMatcher {
        &DEFAULT_AI_MATCHER
    }

    /// Whether no keywords are configured.
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Keywords found in `text`, in configuration order, as configured.
    pub fn find_matches(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.keywords
            .iter()
            .filter(|k| match &k.pattern {
                Pattern::Word(re) => re.is_match(text),
                Pattern::Substring(s) => lowered.contains(s.as_str()),
            })
            .map(|k| k.original.clone())
            .collect()
    }

    /// Whether any keyword is found in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.keywords.iter().any(|k| match &k.pattern {
            Pattern::Word(re) => re.is_match(text),
            Pattern::Substring(s) => lowered.contains(s.as_str()),
        })
    }
}
