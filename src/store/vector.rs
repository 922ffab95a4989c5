//! External vector store backed by Qdrant.
//!
//! Two collections, `hooks` and `quiz_items`, created idempotently at
//! startup. The hook collection carries one migration rule: when its
//! vector size no longer matches the configured embedding backend it is
//! dropped and recreated, but ONLY when the destructive-reindex flag is
//! set — the reset deletes every stored hook.

use std::collections::HashMap;

use anyhow::{bail, Result};
use qdrant_client::qdrant::{
    value::Kind as ValueKind, vectors_config, CreateCollectionBuilder, Distance, ListValue,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::embeddings::EmbedBackend;
use crate::model::{Hook, HookStyle, QuizItem};

const HOOK_COLLECTION: &str = "hooks";
const QUIZ_COLLECTION: &str = "quiz_items";

/// Score bump for vector hits whose text or topic contains the query
/// verbatim; makes the search hybrid rather than purely semantic.
const LEXICAL_BOOST: f32 = 0.25;

pub struct VectorStore {
    client: Qdrant,
    embedder: EmbedBackend,
}

impl VectorStore {
    /// Build a client without touching the server. Calls fail at use
    /// time if the backend is unreachable.
    pub fn new(url: &str, embedder: EmbedBackend) -> Result<Self> {
        let client = Qdrant::from_url(url).build()?;
        Ok(Self { client, embedder })
    }

    /// Connect and make sure both collections exist.
    pub async fn connect(
        url: &str,
        embedder: EmbedBackend,
        allow_destructive_reindex: bool,
    ) -> Result<Self> {
        let store = Self::new(url, embedder)?;
        store.ensure_collections(allow_destructive_reindex).await?;
        Ok(store)
    }

    /// Idempotent schema setup.
    async fn ensure_collections(&self, allow_destructive_reindex: bool) -> Result<()> {
        let collections = self.client.list_collections().await?;
        let have = |name: &str| collections.collections.iter().any(|c| c.name == name);
        let expected = self.embedder.dimension() as u64;

        if !have(HOOK_COLLECTION) {
            info!("Creating collection '{}'", HOOK_COLLECTION);
            self.create_collection(HOOK_COLLECTION, expected).await?;
        } else if let Some(current) = self.collection_dimension(HOOK_COLLECTION).await? {
            if current != expected {
                if allow_destructive_reindex {
                    warn!(
                        "Resetting '{}' (vector size {} -> {}): this deletes all stored hooks",
                        HOOK_COLLECTION, current, expected
                    );
                    self.client.delete_collection(HOOK_COLLECTION).await?;
                    self.create_collection(HOOK_COLLECTION, expected).await?;
                } else {
                    bail!(
                        "collection '{}' has vector size {} but the embedding backend \
                         produces {}; set ALLOW_DESTRUCTIVE_REINDEX=true to drop and recreate it",
                        HOOK_COLLECTION,
                        current,
                        expected
                    );
                }
            }
        }

        if !have(QUIZ_COLLECTION) {
            info!("Creating collection '{}'", QUIZ_COLLECTION);
            self.create_collection(QUIZ_COLLECTION, expected).await?;
        }

        info!("Vector store schema ready");
        Ok(())
    }

    async fn create_collection(&self, name: &str, dimension: u64) -> Result<()> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dimension, Distance::Cosine)),
            )
            .await?;
        Ok(())
    }

    /// Current vector size of a collection, if reported.
    async fn collection_dimension(&self, name: &str) -> Result<Option<u64>> {
        let info = self.client.collection_info(name).await?;
        let size = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|c| match c {
                vectors_config::Config::Params(params) => Some(params.size),
                _ => None,
            });
        Ok(size)
    }

    /// Upsert a hook and return the assigned point id.
    pub async fn save_hook(&self, hook: &Hook) -> Result<String> {
        let embedding = self.embedder.embed(&hook.text).await?;
        if embedding.is_empty() {
            bail!("refusing to store hook with empty embedding");
        }

        let mut payload: HashMap<String, QdrantValue> = HashMap::new();
        payload.insert("topic".into(), hook.topic.clone().into());
        payload.insert("canonical_topic".into(), hook.canonical_topic.clone().into());
        payload.insert("style".into(), hook.style.as_str().to_string().into());
        payload.insert("text".into(), hook.text.clone().into());
        payload.insert("tags".into(), list_value(&hook.tags));
        payload.insert("graph_signals".into(), list_value(&hook.graph_signals));
        payload.insert("vector_signals".into(), list_value(&hook.vector_signals));

        let id = Uuid::new_v4().to_string();
        let point = PointStruct::new(id.clone(), embedding, payload);

        debug!("Upserting hook {} to '{}'", id, HOOK_COLLECTION);
        self.client
            .upsert_points(UpsertPointsBuilder::new(HOOK_COLLECTION, vec![point]))
            .await?;

        Ok(id)
    }

    /// Upsert one quiz item and return the assigned point id.
    pub async fn save_quiz_item(&self, item: &QuizItem) -> Result<String> {
        let embedding = self.embedder.embed(&item.question).await?;
        if embedding.is_empty() {
            bail!("refusing to store quiz item with empty embedding");
        }

        let mut payload: HashMap<String, QdrantValue> = HashMap::new();
        payload.insert("topic".into(), item.topic.clone().into());
        payload.insert("question".into(), item.question.clone().into());
        payload.insert("choices".into(), list_value(&item.choices));
        payload.insert("answer".into(), item.answer.clone().into());
        payload.insert("difficulty".into(), item.difficulty.clone().into());

        let id = Uuid::new_v4().to_string();
        let point = PointStruct::new(id.clone(), embedding, payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(QUIZ_COLLECTION, vec![point]))
            .await?;

        Ok(id)
    }

    /// Hybrid search over stored hooks: vector similarity plus a lexical
    /// boost for hits containing the query verbatim.
    pub async fn search_hooks(&self, query: &str, limit: u64) -> Result<Vec<Hook>> {
        let embedding = self.embedder.embed(query).await?;
        if embedding.is_empty() {
            return Ok(Vec::new());
        }

        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(HOOK_COLLECTION, embedding, limit).with_payload(true),
            )
            .await?;

        let q = query.to_lowercase();
        let mut scored: Vec<(f32, Hook)> = results
            .result
            .into_iter()
            .filter_map(|point| {
                let id = point.id.as_ref().and_then(|id| {
                    match id.point_id_options.as_ref()? {
                        qdrant_client::qdrant::point_id::PointIdOptions::Uuid(s) => {
                            Some(s.clone())
                        }
                        qdrant_client::qdrant::point_id::PointIdOptions::Num(n) => {
                            Some(n.to_string())
                        }
                    }
                });

                let payload = point.payload;
                let topic = payload.get("topic")?.as_str()?.to_string();
                let text = payload.get("text")?.as_str()?.to_string();
                let hook = Hook {
                    id,
                    canonical_topic: payload
                        .get("canonical_topic")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| crate::model::canonical_topic(&topic)),
                    style: HookStyle::parse(
                        payload
                            .get("style")
                            .and_then(|v| v.as_str())
                            .map(String::as_str)
                            .unwrap_or(""),
                    ),
                    tags: payload
                        .get("tags")
                        .and_then(|v| v.as_string_list())
                        .unwrap_or_default(),
                    graph_signals: payload
                        .get("graph_signals")
                        .and_then(|v| v.as_string_list())
                        .unwrap_or_default(),
                    vector_signals: payload
                        .get("vector_signals")
                        .and_then(|v| v.as_string_list())
                        .unwrap_or_default(),
                    topic,
                    text,
                };

                let mut score = point.score;
                if hook.text.to_lowercase().contains(&q) || hook.topic.to_lowercase().contains(&q)
                {
                    score += LEXICAL_BOOST;
                }

                Some((score, hook))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().map(|(_, hook)| hook).collect())
    }

    /// Grounding snippets: hook texts (or topics) for the query.
    pub async fn ground(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let hooks = self.search_hooks(query, limit as u64).await?;
        Ok(hooks
            .into_iter()
            .map(|h| if h.text.is_empty() { h.topic } else { h.text })
            .filter(|s| !s.is_empty())
            .take(limit)
            .collect())
    }
}

fn list_value(items: &[String]) -> QdrantValue {
    QdrantValue {
        kind: Some(ValueKind::ListValue(ListValue {
            values: items
                .iter()
                .map(|s| QdrantValue::from(s.clone()))
                .collect(),
        })),
    }
}

trait QdrantValueExt {
    fn as_str(&self) -> Option<&str>;
    fn as_string_list(&self) -> Option<Vec<String>>;
}

impl QdrantValueExt for QdrantValue {
    fn as_str(&self) -> Option<&str> {
        match &self.kind {
            Some(ValueKind::StringValue(v)) => Some(v),
            _ => None,
        }
    }

    fn as_string_list(&self) -> Option<Vec<String>> {
        match &self.kind {
            Some(ValueKind::ListValue(list)) => Some(
                list.values
                    .iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect(),
            ),
            _ => None,
        }
    }
}
