//! Persistence adapter: one abstraction, two backends.
//!
//! The external (Qdrant) variant owns durability and hybrid search; the
//! memory variant is the always-available degradation. Write failures on
//! the external store are absorbed — the record comes back with `id =
//! None`, is not retried and is not queued.

use futures::future::join_all;
use tracing::{error, warn};

use crate::model::{Hook, QuizItem};

pub mod memory;
pub mod vector;

pub use memory::{memory_id, MemoryStore};
pub use vector::VectorStore;

/// Store backend, selected once at startup.
pub enum StoreBackend {
    Memory(MemoryStore),
    Vector(VectorStore),
}

impl StoreBackend {
    pub fn in_memory() -> Self {
        StoreBackend::Memory(MemoryStore::new())
    }

    pub fn is_external(&self) -> bool {
        matches!(self, StoreBackend::Vector(_))
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            StoreBackend::Memory(_) => "memory",
            StoreBackend::Vector(_) => "qdrant",
        }
    }

    /// Persist a hook. The returned record carries the assigned id, or
    /// `None` when the external write failed.
    pub async fn save_hook(&self, mut hook: Hook) -> Hook {
        match self {
            StoreBackend::Memory(store) => {
                let id = store.save_hook(hook.clone());
                hook.id = Some(id);
            }
            StoreBackend::Vector(store) => match store.save_hook(&hook).await {
                Ok(id) => hook.id = Some(id),
                Err(err) => {
                    error!("Vector store hook write failed: {err:#}");
                    hook.id = None;
                }
            },
        }
        hook
    }

    /// Persist a quiz batch item-by-item; external writes run
    /// concurrently. Each item keeps its own id (or `None` on failure).
    pub async fn save_quiz_batch(&self, mut items: Vec<QuizItem>) -> Vec<QuizItem> {
        match self {
            StoreBackend::Memory(store) => {
                for item in &mut items {
                    item.id = Some(store.save_quiz_item(item.clone()));
                }
            }
            StoreBackend::Vector(store) => {
                let writes = join_all(items.iter().map(|item| store.save_quiz_item(item))).await;
                for (item, result) in items.iter_mut().zip(writes) {
                    match result {
                        Ok(id) => item.id = Some(id),
                        Err(err) => {
                            error!("Vector store quiz write failed: {err:#}");
                            item.id = None;
                        }
                    }
                }
            }
        }
        items
    }

    /// Vector grounding snippets. Empty when the backend is the memory
    /// variant or the external query fails.
    pub async fn ground(&self, query: &str, limit: usize) -> Vec<String> {
        match self {
            StoreBackend::Memory(_) => Vec::new(),
            StoreBackend::Vector(store) => match store.ground(query, limit).await {
                Ok(snippets) => snippets,
                Err(err) => {
                    warn!("Vector grounding failed: {err:#}");
                    Vec::new()
                }
            },
        }
    }

    /// Search stored hooks. External failures degrade to empty.
    pub async fn search_hooks(&self, query: &str, limit: usize) -> Vec<Hook> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        match self {
            StoreBackend::Memory(store) => store.search_hooks(query, limit),
            StoreBackend::Vector(store) => match store.search_hooks(query, limit as u64).await {
                Ok(hooks) => hooks,
                Err(err) => {
                    warn!("Vector search failed: {err:#}");
                    Vec::new()
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HookStyle;

    #[tokio::test]
    async fn memory_backend_assigns_ids() {
        let store = StoreBackend::in_memory();
        assert!(!store.is_external());
        assert_eq!(store.backend_name(), "memory");

        let hook = store
            .save_hook(Hook::new("gravity", HookStyle::Meme, "text".to_string()))
            .await;
        assert!(hook.id.as_deref().unwrap().starts_with("mem-"));
    }

    #[tokio::test]
    async fn memory_backend_grounding_is_empty() {
        let store = StoreBackend::in_memory();
        store
            .save_hook(Hook::new("gravity", HookStyle::Meme, "text".to_string()))
            .await;

        assert!(store.ground("gravity", 3).await.is_empty());
    }

    #[tokio::test]
    async fn memory_backend_search_finds_saved_hooks() {
        let store = StoreBackend::in_memory();
        store
            .save_hook(Hook::new("photosynthesis", HookStyle::Meme, "light".to_string()))
            .await;

        let hits = store.search_hooks("photosynthesis", 10).await;
        assert_eq!(hits.len(), 1);

        assert!(store.search_hooks("", 10).await.is_empty());
    }

    #[tokio::test]
    async fn memory_backend_saves_quiz_batch_with_ids() {
        let store = StoreBackend::in_memory();
        let items = crate::templates::quiz_template("gravity", "easy");

        let saved = store.save_quiz_batch(items).await;
        assert_eq!(saved.len(), 3);
        assert!(saved.iter().all(|item| item.id.is_some()));
    }

    fn unreachable_vector_backend() -> StoreBackend {
        let embedder = crate::embeddings::EmbedBackend::from_provider("local");
        // Nothing listens on this port; every call fails at use time.
        StoreBackend::Vector(VectorStore::new("http://127.0.0.1:9", embedder).unwrap())
    }

    #[tokio::test]
    async fn vector_write_failure_returns_record_without_id() {
        let store = unreachable_vector_backend();

        let hook = store
            .save_hook(Hook::new("gravity", HookStyle::Meme, "still here".to_string()))
            .await;
        assert!(hook.id.is_none());
        assert_eq!(hook.text, "still here");
    }

    #[tokio::test]
    async fn vector_quiz_write_failure_nulls_every_id() {
        let store = unreachable_vector_backend();
        let items = crate::templates::quiz_template("gravity", "easy");

        let saved = store.save_quiz_batch(items).await;
        assert_eq!(saved.len(), 3);
        assert!(saved.iter().all(|item| item.id.is_none()));
    }

    #[tokio::test]
    async fn vector_grounding_and_search_failures_degrade_to_empty() {
        let store = unreachable_vector_backend();

        assert!(store.ground("gravity", 3).await.is_empty());
        assert!(store.search_hooks("gravity", 10).await.is_empty());
    }
}
