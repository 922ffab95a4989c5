//! Generation orchestrator.
//!
//! Decides, per request, which of {language model, vector store, static
//! template} actually produces the text. Grounding is gathered first
//! (graph lookup is local, vector grounding is network I/O under a
//! timeout), merged into a single prompt, and the model gets exactly one
//! call — any failure or empty output falls back to the deterministic
//! templates. Model errors never propagate to the caller; they surface
//! only through the advisory `warning` field.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::graphrag::GraphIndex;
use crate::llm::LlmBackend;
use crate::model::{GroundingContext, HookStyle, QuizItem};
use crate::prompts::Prompt;
use crate::store::StoreBackend;
use crate::templates;

/// Snippet cap per grounding source.
pub const MAX_SNIPPETS: usize = 3;

const FALLBACK_HOOK_SYSTEM: &str = "You generate short, classroom-appropriate hooks \
    (1-2 sentences) for middle/high school lessons. Use vivid, fun language.";
const FALLBACK_QUIZ_INSTRUCTIONS: &str = "Return a JSON array of objects with keys: \
    question, choices (array of 4), answer (exact string).";

/// Result of a hook generation: the text, the grounding that informed
/// it, and an advisory warning when a fallback absorbed an error.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub text: String,
    pub context: GroundingContext,
    pub warning: Option<String>,
}

/// Result of a quiz generation: always exactly three items.
#[derive(Debug, Clone)]
pub struct QuizOutcome {
    pub items: Vec<QuizItem>,
    pub warning: Option<String>,
}

pub struct Orchestrator {
    llm: LlmBackend,
    graph: Arc<GraphIndex>,
    store: Arc<StoreBackend>,
    grounding_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        llm: LlmBackend,
        graph: Arc<GraphIndex>,
        store: Arc<StoreBackend>,
        grounding_timeout: Duration,
    ) -> Self {
        Self {
            llm,
            graph,
            store,
            grounding_timeout,
        }
    }

    pub fn llm_enabled(&self) -> bool {
        self.llm.is_enabled()
    }

    /// Gather grounding snippets for a topic. The graph lookup is local;
    /// the vector call is bounded by the grounding timeout and treated
    /// as empty past it (the in-flight call is abandoned, not
    /// cancelled).
    pub async fn gather_context(&self, topic: &str) -> GroundingContext {
        let graph_snippets = self.graph.lookup(topic, MAX_SNIPPETS);

        let vector_snippets = match tokio::time::timeout(
            self.grounding_timeout,
            self.store.ground(topic, MAX_SNIPPETS),
        )
        .await
        {
            Ok(snippets) => snippets,
            Err(_) => {
                warn!("Vector grounding timed out after {:?}", self.grounding_timeout);
                Vec::new()
            }
        };

        GroundingContext {
            graph_snippets,
            vector_snippets,
        }
    }

    /// Generate hook text for a topic and style. Never fails for a
    /// non-empty topic: the template path is always available.
    pub async fn generate(&self, topic: &str, style: HookStyle) -> GenerationOutcome {
        let context = self.gather_context(topic).await;

        if self.llm.is_enabled() {
            let (system, user) = build_hook_prompt(topic, style, &context);
            match self.llm.complete(Some(&system), &user).await {
                Ok(text) if !text.trim().is_empty() => {
                    return GenerationOutcome {
                        text: text.trim().to_string(),
                        context,
                        warning: None,
                    };
                }
                Ok(_) => {
                    warn!("Language model returned empty text; using template");
                    return GenerationOutcome {
                        text: templates::hook_template(topic, style),
                        context,
                        warning: Some("language model returned empty output".to_string()),
                    };
                }
                Err(err) => {
                    warn!("Language model call failed: {err}; using template");
                    return GenerationOutcome {
                        text: templates::hook_template(topic, style),
                        context,
                        warning: Some(err.to_string()),
                    };
                }
            }
        }

        GenerationOutcome {
            text: templates::hook_template(topic, style),
            context,
            warning: None,
        }
    }

    /// Generate exactly three quiz items for a topic and level.
    pub async fn generate_quiz(&self, topic: &str, level: &str) -> QuizOutcome {
        if self.llm.is_enabled() {
            let prompt = build_quiz_prompt(topic, level);
            match self.llm.complete(None, &prompt).await {
                Ok(raw) => match parse_quiz_items(&raw, topic, level) {
                    Some(items) => {
                        debug!("Parsed {} quiz items from model output", items.len());
                        return QuizOutcome {
                            items,
                            warning: None,
                        };
                    }
                    None => {
                        warn!("Quiz output unparsable; using template");
                        return QuizOutcome {
                            items: templates::quiz_template(topic, level),
                            warning: Some("quiz output could not be parsed".to_string()),
                        };
                    }
                },
                Err(err) => {
                    warn!("Quiz generation failed: {err}; using template");
                    return QuizOutcome {
                        items: templates::quiz_template(topic, level),
                        warning: Some(err.to_string()),
                    };
                }
            }
        }

        QuizOutcome {
            items: templates::quiz_template(topic, level),
            warning: None,
        }
    }
}

fn build_hook_prompt(topic: &str, style: HookStyle, context: &GroundingContext) -> (String, String) {
    let system = Prompt::HookSystem
        .load()
        .unwrap_or_else(|_| FALLBACK_HOOK_SYSTEM.to_string());

    let mut sections = Vec::new();
    if !context.graph_snippets.is_empty() {
        sections.push(format!("Graph context:\n- {}", context.graph_snippets.join("\n- ")));
    }
    if !context.vector_snippets.is_empty() {
        sections.push(format!(
            "Related hooks/snippets:\n- {}",
            context.vector_snippets.join("\n- ")
        ));
    }
    let guidance = if sections.is_empty() {
        "(No extra context)".to_string()
    } else {
        sections.join("\n\n")
    };

    let user = format!(
        "Create a {style} style hook for topic \"{topic}\".\n\
         If possible, weave in ideas from the context below without quoting verbatim.\n\n\
         {guidance}\n\
         Output: 1-2 sentences only."
    );

    (system, user)
}

fn build_quiz_prompt(topic: &str, level: &str) -> String {
    let instructions = Prompt::QuizInstructions
        .load()
        .unwrap_or_else(|_| FALLBACK_QUIZ_INSTRUCTIONS.to_string());

    format!(
        "Create 3 multiple-choice questions about \"{topic}\" for {level} level students.\n\
         {instructions}"
    )
}

#[derive(Debug, serde::Deserialize)]
struct QuizDraft {
    question: String,
    choices: Vec<String>,
    answer: String,
    #[serde(default)]
    difficulty: Option<String>,
}

/// Parse model output into exactly three valid quiz items, or `None`.
fn parse_quiz_items(raw: &str, topic: &str, level: &str) -> Option<Vec<QuizItem>> {
    let value = extract_json_value(raw)?;
    let drafts: Vec<QuizDraft> = serde_json::from_value(value).ok()?;

    let items: Vec<QuizItem> = drafts
        .into_iter()
        .map(|draft| QuizItem {
            id: None,
            topic: topic.to_string(),
            question: draft.question,
            choices: draft.choices,
            answer: draft.answer,
            difficulty: draft.difficulty.unwrap_or_else(|| level.to_string()),
        })
        .filter(QuizItem::is_valid)
        .take(3)
        .collect();

    if items.len() == 3 {
        Some(items)
    } else {
        None
    }
}

/// Find the first balanced `[...]` or `{...}` span that parses as JSON.
///
/// Lenient by design: model output is not guaranteed well-formed, so the
/// scan is string- and escape-aware and keeps trying later spans until
/// one parses.
pub fn extract_json_value(text: &str) -> Option<serde_json::Value> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();

    for (pos, &(start, open)) in chars.iter().enumerate() {
        if open != '[' && open != '{' {
            continue;
        }

        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for &(idx, ch) in &chars[pos..] {
            if escaped {
                escaped = false;
                continue;
            }
            match ch {
                '\\' if in_string => escaped = true,
                '"' => in_string = !in_string,
                '[' | '{' if !in_string => depth += 1,
                ']' | '}' if !in_string => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        let span = &text[start..idx + ch.len_utf8()];
                        if let Ok(value) = serde_json::from_str(span) {
                            return Some(value);
                        }
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    None
}
