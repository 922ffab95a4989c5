//! Static template generator: the always-available fallback.
//!
//! Pure functions, deterministic output, zero external dependencies.

use crate::model::{HookStyle, QuizItem};

/// Produce a fixed-pattern hook sentence for a topic and style.
pub fn hook_template(topic: &str, style: HookStyle) -> String {
    match style {
        HookStyle::Meme => {
            format!("If {topic} were a meme: “Sun hits leaf — *PhotosynTHIS!* 🌞➡️🔋”")
        }
        HookStyle::Analogy => {
            format!("{topic} is like a factory: inputs in, energy out, waste managed.")
        }
        HookStyle::Story => {
            format!("Imagine you're a {topic} manager on a spaceship keeping the crew energized…")
        }
    }
}

/// Produce the fixed three-question quiz for a topic and level.
pub fn quiz_template(topic: &str, level: &str) -> Vec<QuizItem> {
    vec![
        QuizItem {
            id: None,
            topic: topic.to_string(),
            question: format!("Which statement best describes {topic}?"),
            choices: vec![
                "Definition A".to_string(),
                "Definition B".to_string(),
                "Definition C".to_string(),
                "Definition D".to_string(),
            ],
            answer: "Definition B".to_string(),
            difficulty: level.to_string(),
        },
        QuizItem {
            id: None,
            topic: topic.to_string(),
            question: format!("Which is NOT related to {topic}?"),
            choices: vec![
                "X".to_string(),
                "Y".to_string(),
                "Z".to_string(),
                "Totally unrelated thing".to_string(),
            ],
            answer: "Totally unrelated thing".to_string(),
            difficulty: level.to_string(),
        },
        QuizItem {
            id: None,
            topic: topic.to_string(),
            question: format!("Which analogy fits {topic} the best?"),
            choices: vec![
                "Factory".to_string(),
                "Concert".to_string(),
                "Desert".to_string(),
                "Random".to_string(),
            ],
            answer: "Factory".to_string(),
            difficulty: level.to_string(),
        },
    ]
}
