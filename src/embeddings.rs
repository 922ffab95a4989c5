//! Embedding backends for the vector store.
//!
//! `openai` provider uses the hosted embedding API; the local provider is
//! a deterministic hashed bag-of-words, always available offline.

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::{CreateEmbeddingRequestArgs, EmbeddingInput},
    Client as OpenAIClient,
};
use tracing::{debug, info, warn};

/// Dimension of the local hashed embedder.
pub const LOCAL_EMBEDDING_DIM: usize = 256;

/// Embedding provider, selected once at startup.
pub enum EmbedBackend {
    OpenAI(EmbeddingService),
    Local(LocalEmbedder),
}

impl EmbedBackend {
    /// Resolve a backend from the configured provider name. An `openai`
    /// request without a usable API key falls back to the local embedder.
    pub fn from_provider(provider: &str) -> Self {
        match provider.to_lowercase().as_str() {
            "openai" => match EmbeddingService::new() {
                Ok(service) => {
                    info!("Embeddings: using OpenAI provider");
                    EmbedBackend::OpenAI(service)
                }
                Err(err) => {
                    warn!("Embeddings: falling back to local provider ({err})");
                    EmbedBackend::Local(LocalEmbedder::new(LOCAL_EMBEDDING_DIM))
                }
            },
            _ => EmbedBackend::Local(LocalEmbedder::new(LOCAL_EMBEDDING_DIM)),
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match self {
            EmbedBackend::OpenAI(service) => service.embed(text).await,
            EmbedBackend::Local(local) => Ok(local.embed(text)),
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            EmbedBackend::OpenAI(service) => service.dimension(),
            EmbedBackend::Local(local) => local.dimension(),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            EmbedBackend::OpenAI(_) => "openai",
            EmbedBackend::Local(_) => "local",
        }
    }
}

/// Service for generating text embeddings via the OpenAI API.
pub struct EmbeddingService {
    client: OpenAIClient<OpenAIConfig>,
    model: String,
}

impl EmbeddingService {
    pub fn new() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let config = OpenAIConfig::new().with_api_key(api_key);
        let client = OpenAIClient::with_config(config);

        Ok(Self {
            client,
            model: "text-embedding-3-small".to_string(),
        })
    }

    /// Generate an embedding for a single text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        // The embedding API rejects very long inputs; hooks never come
        // close, but queries are caller-supplied.
        let input: String = trimmed.chars().take(8000).collect();

        debug!("Generating embedding for {} chars", input.len());

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::String(input))
            .build()?;

        let response = self.client.embeddings().create(request).await?;

        response
            .data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))
    }

    pub fn dimension(&self) -> usize {
        match self.model.as_str() {
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            "text-embedding-ada-002" => 1536,
            _ => 1536,
        }
    }
}

/// Deterministic, fast embedding for offline/local use.
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dim: usize,
}

impl LocalEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut vec = vec![0.0f32; self.dim];
        for token in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.dim;
            vec[idx] += 1.0;
        }

        normalize(&mut vec);
        vec
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}
