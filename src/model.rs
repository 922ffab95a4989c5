//! Core records: hooks, quiz items, grounding context.

use serde::{Deserialize, Serialize};

/// Presentation style of a generated hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookStyle {
    Meme,
    Analogy,
    Story,
}

impl HookStyle {
    /// Parse a style name leniently. Unknown or missing values map to `Meme`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "analogy" => HookStyle::Analogy,
            "story" => HookStyle::Story,
            _ => HookStyle::Meme,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HookStyle::Meme => "meme",
            HookStyle::Analogy => "analogy",
            HookStyle::Story => "story",
        }
    }
}

impl Default for HookStyle {
    fn default() -> Self {
        HookStyle::Meme
    }
}

impl std::fmt::Display for HookStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a topic for matching: lowercase, drop non-alphanumerics,
/// collapse whitespace. Idempotent.
pub fn canonical_topic(topic: &str) -> String {
    let mapped: String = topic
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A generated teaser sentence for a topic.
///
/// Immutable once created; `id` is `None` when the external store write
/// failed and the record was returned unpersisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hook {
    pub id: Option<String>,
    pub topic: String,
    pub canonical_topic: String,
    pub style: HookStyle,
    pub text: String,
    pub tags: Vec<String>,
    #[serde(default)]
    pub graph_signals: Vec<String>,
    #[serde(default)]
    pub vector_signals: Vec<String>,
}

impl Hook {
    pub fn new(topic: &str, style: HookStyle, text: String) -> Self {
        Self {
            id: None,
            topic: topic.to_string(),
            canonical_topic: canonical_topic(topic),
            style,
            text,
            tags: vec![style.as_str().to_string(), "education".to_string(), "hook".to_string()],
            graph_signals: Vec::new(),
            vector_signals: Vec::new(),
        }
    }

    pub fn with_signals(mut self, graph: Vec<String>, vector: Vec<String>) -> Self {
        self.graph_signals = graph;
        self.vector_signals = vector;
        self
    }
}

/// One multiple-choice question. Produced in batches of three.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub topic: String,
    pub question: String,
    pub choices: Vec<String>,
    pub answer: String,
    #[serde(default)]
    pub difficulty: String,
}

impl QuizItem {
    /// A well-formed item has exactly four choices and an answer among them.
    pub fn is_valid(&self) -> bool {
        !self.question.trim().is_empty()
            && self.choices.len() == 4
            && self.choices.iter().any(|c| c == &self.answer)
    }
}

/// Per-request grounding snippets. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct GroundingContext {
    pub graph_snippets: Vec<String>,
    pub vector_snippets: Vec<String>,
}

impl GroundingContext {
    pub fn is_empty(&self) -> bool {
        self.graph_snippets.is_empty() && self.vector_snippets.is_empty()
    }
}
