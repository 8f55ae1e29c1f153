//! `quran_rag` — retrieves verses via the corpus adapter (vector search
//! if embeddings are available, else text search), attaches exegesis
//! entries, and reports `{verse_count, source}`.
//!
//! `source` is `"database"` when the corpus adapter answers normally and
//! `"mock"` when it fails and the stage falls back to a local static
//! fixture — a narrower version of the original's three-way
//! database/llm/mock fallback chain. The middle rung (an LLM asked to
//! recall verse text) would require generating Quranic corpus content,
//! which is explicitly out of scope (§1); see `DESIGN.md`.

use async_trait::async_trait;
use std::sync::Arc;

use super::{PartialUpdate, Stage, StageContext};
use crate::adapters::mock::MockCorpusSearch;
use crate::adapters::CorpusSearch;
use crate::errors::StageError;
use crate::state::{DiscoveryState, ProgressRecord, VerseRecord};

const TOP_K: usize = 10;
const SIMILARITY_THRESHOLD: f32 = 0.75;

pub struct QuranRagStage;

#[async_trait]
impl Stage for QuranRagStage {
    fn name(&self) -> &'static str {
        crate::dag::STAGE_QURAN_RAG
    }

    async fn run(
        &self,
        snapshot: Arc<DiscoveryState>,
        ctx: &StageContext,
    ) -> Result<PartialUpdate, StageError> {
        let retrieval = match &ctx.embeddings {
            Some(embeddings) => match embeddings.embed(&snapshot.query).await {
                Ok(vector) => {
                    ctx.corpus
                        .search_by_vector(&vector, TOP_K, SIMILARITY_THRESHOLD)
                        .await
                }
                Err(err) => Err(err),
            },
            None => ctx.corpus.search_by_text(&snapshot.query, TOP_K).await,
        };

        let (mut verses, source) = match retrieval {
            Ok(verses) => (verses, "database"),
            Err(err) => {
                tracing::warn!(error = %err, "corpus search failed, falling back to mock verses");
                (
                    MockCorpusSearch
                        .search_by_text(&snapshot.query, TOP_K)
                        .await
                        .unwrap_or_default(),
                    "mock",
                )
            }
        };

        if !verses.is_empty() {
            let keys: Vec<String> = verses.iter().map(|v| v.verse_key.clone()).collect();
            if let Ok(exegesis) = ctx.corpus.fetch_exegesis_for(&keys).await {
                for verse in &mut verses {
                    if let Some(entries) = exegesis.get(&verse.verse_key) {
                        verse.tafseers = entries.clone();
                    }
                }
            }
        }

        let tafseer_context = build_tafseer_context(&verses);

        let progress = ProgressRecord::ok(self.name())
            .with_field("verse_count", serde_json::json!(verses.len()))
            .with_field("source", serde_json::json!(source));

        Ok(PartialUpdate {
            verses: Some(verses),
            tafseer_context: Some(tafseer_context),
            ..Default::default()
        }
        .with_progress(progress))
    }
}

fn build_tafseer_context(verses: &[VerseRecord]) -> String {
    verses
        .iter()
        .flat_map(|v| v.tafseers.iter().map(|t| format!("{}: {}", v.verse_key, t.text)))
        .collect::<Vec<_>>()
        .join("\n")
}
