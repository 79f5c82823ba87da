//! Lexicon-based sentiment classifier.
//!
//! Runs when items are written to the store and have no sentiment yet.

use super::types::Sentiment;

/// Score magnitude below which an item is neutral.
const NEUTRAL_BAND: f64 = 0.05;

/// Tokens within this distance after a negator have their polarity flipped.
const NEGATION_WINDOW: usize = 3;

const POSITIVE: &[&str] = &[
    "achieve", "advance", "amazing", "beat", "best", "better", "boost", "breakthrough",
    "efficient", "excellent", "exciting", "faster", "gain", "great", "improve", "improved",
    "improves", "innovative", "launch", "launches", "leading", "milestone", "outperform",
    "outperforms", "powerful", "record", "release", "robust", "success", "surpass", "win",
];

const NEGATIVE: &[&str] = &[
    "attack", "ban", "breach", "bug", "concern", "crash", "critical", "decline", "delay",
    "fail", "failure", "fails", "fake", "fine", "flaw", "fraud", "harm", "lawsuit", "layoffs",
    "leak", "loss", "outage", "risk", "risks", "scam", "slow", "sued", "threat", "vulnerability",
    "warn", "warning", "worse", "worst",
];

const NEGATORS: &[&str] = &[
    "not", "no", "never", "without", "isn't", "wasn't", "aren't", "won't", "can't", "cannot",
    "don't", "doesn't",
];

fn tokenize(s: &str) -> Vec<String> {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn word_polarity(w: &str) -> i32 {
    if POSITIVE.contains(&w) {
        1
    } else if NEGATIVE.contains(&w) {
        -1
    } else {
        0
    }
}

/// Classify text, returning a label and a score in [-1, 1].
///
/// The score is the net polarity normalized by the number of polar hits,
/// damped for very short texts.
pub fn classify(text: &str) -> (Sentiment, f64) {
    let tokens = tokenize(text);
    let mut net = 0i32;
    let mut hits = 0u32;

    for (i, tok) in tokens.iter().enumerate() {
        let base = word_polarity(tok);
        if base == 0 {
            continue;
        }
        let negated = (1..=NEGATION_WINDOW)
            .any(|k| i >= k && NEGATORS.contains(&tokens[i - k].as_str()));
        net += if negated { -base } else { base };
        hits += 1;
    }

    if hits == 0 {
        return (Sentiment::Neutral, 0.0);
    }

    let damping = (hits as f64 / (hits as f64 + 1.0)).min(1.0);
    let score = (net as f64 / hits as f64 * damping).clamp(-1.0, 1.0);

    let label = if score > NEUTRAL_BAND {
        Sentiment::Positive
    } else if score < -NEUTRAL_BAND {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    };
    (label, score)
}
