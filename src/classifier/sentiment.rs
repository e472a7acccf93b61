//! Word-list sentiment scoring.

use super::Sentiment;

/// Strong praise words, +2 each.
pub(crate) const POSITIVE_WORDS: &[&str] = &[
    "thank",
    "thanks",
    "grateful",
    "appreciate",
    "excellent",
    "great",
    "outstanding",
    "wonderful",
    "amazing",
    "perfect",
    "love",
    "happy",
];

/// Strong complaint words, -2 each.
pub(crate) const NEGATIVE_WORDS: &[&str] = &[
    "problem",
    "issue",
    "error",
    "bug",
    "broken",
    "failed",
    "trouble",
    "frustrated",
    "angry",
    "disappointed",
    "terrible",
    "awful",
    "hate",
];

/// General lexicon, ±1 each.
const LEXICON: &[(&str, i32)] = &[
    ("good", 1),
    ("nice", 1),
    ("glad", 1),
    ("pleased", 1),
    ("helpful", 1),
    ("resolved", 1),
    ("quickly", 1),
    ("professionally", 1),
    ("appreciated", 1),
    ("interested", 1),
    ("bad", -1),
    ("slow", -1),
    ("wrong", -1),
    ("unable", -1),
    ("cannot", -1),
    ("fail", -1),
    ("losing", -1),
    ("unhappy", -1),
    ("worried", -1),
    ("unavailable", -1),
    ("invalid", -1),
    ("urgent", -1),
    ("critical", -1),
];

/// Lower-case word tokens; anything that is not alphanumeric or `_` separates words.
pub(crate) fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

/// Raw sentiment score of `text`.
pub fn sentiment_score(text: &str) -> i32 {
    tokenize(text).fold(0_i32, |score, word| {
        let mut delta = LEXICON
            .iter()
            .find(|(w, _)| *w == word)
            .map_or(0, |(_, s)| *s);
        if POSITIVE_WORDS.contains(&word.as_str()) {
            delta = delta.saturating_add(2);
        }
        if NEGATIVE_WORDS.contains(&word.as_str()) {
            delta = delta.saturating_sub(2);
        }
        score.saturating_add(delta)
    })
}

/// Label `text` positive (score > 1), negative (score < -1) or neutral.
pub fn analyze_sentiment(text: &str) -> Sentiment {
    match sentiment_score(text) {
        s if s > 1 => Sentiment::Positive,
        s if s < -1 => Sentiment::Negative,
        _ => Sentiment::Neutral,
    }
}
