//! In-process store: mutex-guarded append-only lists.
//!
//! Handlers only ever append and scan; there is no read-modify-write, so
//! a plain mutex around each list is enough.

use std::sync::Mutex;

use crate::model::{canonical_topic, Hook, QuizItem};

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Locally generated identifier: timestamp plus a short base36 suffix.
/// Uniqueness is not guaranteed, collisions are astronomically unlikely.
pub fn memory_id() -> String {
    use rand::Rng;

    let millis = chrono::Utc::now().timestamp_millis();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..5)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();

    format!("mem-{}-{}", millis, suffix)
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    hooks: Mutex<Vec<Hook>>,
    quiz_items: Mutex<Vec<QuizItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook and return its assigned id.
    pub fn save_hook(&self, mut hook: Hook) -> String {
        let id = memory_id();
        hook.id = Some(id.clone());

        let mut hooks = self.hooks.lock().unwrap_or_else(|e| e.into_inner());
        hooks.push(hook);
        id
    }

    /// Append a quiz item and return its assigned id.
    pub fn save_quiz_item(&self, mut item: QuizItem) -> String {
        let id = memory_id();
        item.id = Some(id.clone());

        let mut items = self.quiz_items.lock().unwrap_or_else(|e| e.into_inner());
        items.push(item);
        id
    }

    /// Substring search over stored hooks.
    ///
    /// Matches on canonical topic or hook text; duplicates by
    /// `(canonical_topic, style)` are suppressed at query time, first
    /// match in insertion order wins.
    pub fn search_hooks(&self, query: &str, limit: usize) -> Vec<Hook> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return Vec::new();
        }
        let canonical_q = canonical_topic(&q);

        let hooks = self.hooks.lock().unwrap_or_else(|e| e.into_inner());
        let mut seen = std::collections::HashSet::new();
        let mut results = Vec::new();

        for hook in hooks.iter() {
            if results.len() >= limit {
                break;
            }

            let matches = (!canonical_q.is_empty() && hook.canonical_topic.contains(&canonical_q))
                || hook.text.to_lowercase().contains(&q);
            if !matches {
                continue;
            }

            let key = (hook.canonical_topic.clone(), hook.style);
            if seen.insert(key) {
                results.push(hook.clone());
            }
        }

        results
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn quiz_count(&self) -> usize {
        self.quiz_items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}
