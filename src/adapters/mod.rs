//! Narrow interfaces to external collaborators. Stages consume these
//! traits, never a concrete implementation; "adapter missing" is a static
//! type (a null-object/mock implementation), not a null-check scattered
//! through stage code (see `SPEC_FULL.md` §9).

pub mod llm_anthropic;
pub mod mock;
pub mod sqlite_store;

#[cfg(test)]
pub mod test_support {
    use std::sync::Arc;

    use super::mock::{InMemoryDiscoveryStore, MockCorpusSearch, MockLlm};
    use crate::stages::StageContext;

    /// A `StageContext` wired entirely to mock adapters, for stage unit
    /// tests that don't need a real corpus/LLM/store.
    pub fn mock_context() -> StageContext {
        StageContext {
            corpus: Arc::new(MockCorpusSearch),
            embeddings: None,
            llm: Arc::new(MockLlm),
            store: Arc::new(InMemoryDiscoveryStore::default()),
            cancellation: tokio_util::sync::CancellationToken::new(),
        }
    }
}

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::HashMap;

use crate::errors::StageError;
use crate::state::{TafseerEntry, VerseRecord};

#[async_trait]
pub trait CorpusSearch: Send + Sync {
    async fn search_by_vector(
        &self,
        vector: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<VerseRecord>, StageError>;

    async fn search_by_text(&self, query: &str, top_k: usize) -> Result<Vec<VerseRecord>, StageError>;

    async fn fetch_exegesis_for(
        &self,
        verse_keys: &[String],
    ) -> Result<HashMap<String, Vec<TafseerEntry>>, StageError>;
}

#[async_trait]
pub trait Embeddings: Send + Sync {
    async fn embed(&self, query: &str) -> Result<Vec<f32>, StageError>;
}

#[async_trait]
pub trait Llm: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, StageError>;

    /// Lazily yields text fragments. Stages that want incremental
    /// `synthesis_token` events consume this; implementations without
    /// real streaming support may yield the whole completion as one item.
    async fn stream_complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<BoxStream<'static, String>, StageError>;
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DiscoveryRecord {
    pub discovery_id: String,
    pub query: String,
    pub synthesis: String,
    pub confidence_tier: String,
    pub quality_score: f64,
}

#[async_trait]
pub trait DiscoveryStore: Send + Sync {
    async fn save(&self, record: DiscoveryRecord) -> Result<String, StageError>;

    async fn list(&self, tier_filter: Option<&str>) -> Result<Vec<DiscoveryRecord>, StageError>;
}
