//! Deterministic fallback adapters. These back every stage when no real
//! backend is configured, so the pipeline produces a realistic discovery
//! record end to end even with all adapters absent (see §4.6).

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::Mutex;

use super::{CorpusSearch, DiscoveryRecord, DiscoveryStore, Llm};
use crate::errors::StageError;
use crate::state::{TafseerEntry, VerseRecord};

/// The three illustrative water verses used when no corpus backend is
/// configured (mirrors the original system's DB-absent fallback).
fn mock_water_verses() -> Vec<VerseRecord> {
    vec![
        VerseRecord::new(
            21,
            30,
            "وَجَعَلْنَا مِنَ الْمَاءِ كُلَّ شَيْءٍ حَيٍّ",
            "And We made from water every living thing",
        ),
        VerseRecord::new(
            24,
            45,
            "وَاللَّهُ خَلَقَ كُلَّ دَابَّةٍ مِنْ مَاءٍ",
            "And Allah created every [moving] creature from water",
        ),
        VerseRecord::new(
            25,
            54,
            "وَهُوَ الَّذِي خَلَقَ مِنَ الْمَاءِ بَشَرًا",
            "And it is He who created from water a human being",
        ),
    ]
}

/// Corpus search mock: returns the illustrative water-verse fixture for
/// any query, tagging the progress record's `source` field as `"mock"`
/// via the caller (see `stages::quran_rag`).
pub struct MockCorpusSearch;

#[async_trait]
impl CorpusSearch for MockCorpusSearch {
    async fn search_by_vector(
        &self,
        _vector: &[f32],
        top_k: usize,
        _threshold: f32,
    ) -> Result<Vec<VerseRecord>, StageError> {
        Ok(mock_water_verses().into_iter().take(top_k).collect())
    }

    async fn search_by_text(&self, _query: &str, top_k: usize) -> Result<Vec<VerseRecord>, StageError> {
        Ok(mock_water_verses().into_iter().take(top_k).collect())
    }

    async fn fetch_exegesis_for(
        &self,
        verse_keys: &[String],
    ) -> Result<HashMap<String, Vec<TafseerEntry>>, StageError> {
        let mut map = HashMap::new();
        for key in verse_keys {
            map.insert(
                key.clone(),
                vec![TafseerEntry {
                    source: "mock".to_string(),
                    text: format!("# MOCK: DB not connected for {key}"),
                    priority: 0,
                }],
            );
        }
        Ok(map)
    }
}

const MOCK_SYNTHESIS_TEMPLATE: &str = "## 1. Summary\n\
Mock synthesis generated without a configured LLM backend.\n\n\
## 2. Linguistic Notes\nNo live linguistic analysis available.\n\n\
## 3. Scientific Correlations\nNo live scientific correlation available.\n\n\
## 4. Tafseer Consensus\nNo live exegesis consensus available.\n\n\
## 5. Humanities Perspective\nNo live humanities correlation available.\n\n\
## 6. Confidence\nThis is an illustrative placeholder result (tier_2).";

/// LLM mock: every call falls back to a static response rather than
/// failing, so the pipeline is never blocked by a missing provider.
pub struct MockLlm;

#[async_trait]
impl Llm for MockLlm {
    async fn complete(
        &self,
        _system: &str,
        _user: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, StageError> {
        Ok(MOCK_SYNTHESIS_TEMPLATE.to_string())
    }

    async fn stream_complete(
        &self,
        _system: &str,
        _user: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<BoxStream<'static, String>, StageError> {
        let fragments: Vec<String> = MOCK_SYNTHESIS_TEMPLATE
            .as_bytes()
            .chunks(50)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect();
        Ok(stream::iter(fragments).boxed())
    }
}

/// In-memory discovery store: a null-object persister. `save` always
/// succeeds; `list` reflects only what this process has saved, which is
/// sufficient for a process without a durable-storage non-goal (§1).
#[derive(Default)]
pub struct InMemoryDiscoveryStore {
    records: Mutex<Vec<DiscoveryRecord>>,
}

#[async_trait]
impl DiscoveryStore for InMemoryDiscoveryStore {
    async fn save(&self, record: DiscoveryRecord) -> Result<String, StageError> {
        let id = record.discovery_id.clone();
        self.records.lock().unwrap().push(record);
        Ok(id)
    }

    async fn list(&self, tier_filter: Option<&str>) -> Result<Vec<DiscoveryRecord>, StageError> {
        let records = self.records.lock().unwrap();
        Ok(match tier_filter {
            Some(tier) => records.iter().filter(|r| r.confidence_tier == tier).cloned().collect(),
            None => records.clone(),
        })
    }
}
