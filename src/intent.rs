//! Natural-language intent parsing.
//!
//! Best-effort extraction of a (topic, style) pair from a free-text
//! request. Ordered keyword matching plus one extraction pattern; this is
//! a heuristic, not a grammar — the accepted failure mode is a wrong
//! topic, never a crash.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::HookStyle;

/// Style keyword table, scanned in fixed priority order. The first style
/// whose keyword set has any substring match wins.
const STYLE_KEYWORDS: &[(HookStyle, &[&str])] = &[
    (HookStyle::Meme, &["meme", "funny", "joke"]),
    (HookStyle::Analogy, &["analogy", "compare", "like", "as if"]),
    (HookStyle::Story, &["story", "narrative", "imagine"]),
];

static TOPIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:for|about|on|regarding|re:?)\s+(.+)").unwrap());
static IMPERATIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:make|create|generate|write)\b.*?\b(?:for|about|on)\b").unwrap());
static ARTICLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*an?\s+").unwrap());
static PLEASE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+please.*$").unwrap());
static TRAILING_PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.?!]$").unwrap());

/// Parsed intent of a free-text request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub topic: String,
    pub style: HookStyle,
}

/// Extract a (topic, style) pair from free text.
///
/// If the cleaned topic comes out empty the original raw input is
/// returned as the topic, so an empty topic means the input itself was
/// empty.
pub fn parse(free_text: &str) -> Intent {
    let lowered = free_text.to_lowercase();

    let mut style = HookStyle::Meme;
    for (candidate, keywords) in STYLE_KEYWORDS {
        if keywords.iter().any(|k| lowered.contains(k)) {
            style = *candidate;
            break;
        }
    }

    let raw_topic = TOPIC_RE
        .captures(&lowered)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| lowered.clone());

    let cleaned = IMPERATIVE_RE.replace(&raw_topic, "");
    let cleaned = ARTICLE_RE.replace(&cleaned, "");
    let cleaned = PLEASE_RE.replace(&cleaned, "");
    let cleaned = TRAILING_PUNCT_RE.replace(&cleaned, "");
    let cleaned = cleaned.trim().to_string();

    let topic = if cleaned.is_empty() {
        free_text.to_string()
    } else {
        cleaned
    };

    Intent { topic, style }
}
