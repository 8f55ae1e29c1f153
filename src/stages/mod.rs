//! The nine-stage registry. Every stage is a uniform unit — a name and
//! `run(snapshot) -> partial-update-or-error` — so the engine (`dag::engine`)
//! can drive them without knowing their internals.

pub mod humanities;
pub mod kg_update;
pub mod linguistic;
pub mod quality_review;
pub mod quran_rag;
pub mod route_query;
pub mod science;
pub mod synthesis;
pub mod tafseer;

use async_trait::async_trait;
use std::sync::Arc;

use crate::adapters::{CorpusSearch, DiscoveryStore, Embeddings, Llm};
use crate::errors::StageError;
use crate::state::{
    ConfidenceTier, DiscoveryState, HumanitiesFinding, LinguisticAnalysis, Mode, ProgressRecord,
    ScienceFinding, TafseerFindings, VerseRecord,
};

/// Services injected into every stage. Stages never know which concrete
/// adapter implementation is wired in (see `adapters`).
#[derive(Clone)]
pub struct StageContext {
    pub corpus: Arc<dyn CorpusSearch>,
    pub embeddings: Option<Arc<dyn Embeddings>>,
    pub llm: Arc<dyn Llm>,
    pub store: Arc<dyn DiscoveryStore>,
    pub cancellation: tokio_util::sync::CancellationToken,
}

/// A stage's output: the fields it owns, plus the progress records it
/// appends to the event log this super-step. All other fields are left
/// `None` and are not touched by the merge (see `PartialUpdate::merge_into`).
#[derive(Debug, Clone, Default)]
pub struct PartialUpdate {
    pub disciplines: Option<Vec<String>>,
    pub mode: Option<Mode>,
    pub verses: Option<Vec<VerseRecord>>,
    pub tafseer_context: Option<String>,
    pub linguistic_analysis: Option<LinguisticAnalysis>,
    pub science_findings: Option<Vec<ScienceFinding>>,
    pub tafseer_findings: Option<TafseerFindings>,
    pub humanities_findings: Option<Vec<HumanitiesFinding>>,
    pub synthesis: Option<String>,
    pub confidence_tier: Option<ConfidenceTier>,
    pub quality_score: Option<f64>,
    pub quality_issues: Option<Vec<String>>,
    pub discovery_id: Option<String>,
    pub should_deepen: Option<bool>,
    pub iteration_count: Option<u32>,
    pub progress: Vec<ProgressRecord>,
}

impl PartialUpdate {
    pub fn with_progress(mut self, record: ProgressRecord) -> Self {
        self.progress.push(record);
        self
    }

    /// Applies this update to `state`. Every field is assign-on-Some
    /// except `progress`, which the caller has already merged into
    /// `streaming_updates` in stage-name lexicographic order (the one
    /// field with append semantics — see `dag::engine`).
    pub fn merge_into(self, state: &mut DiscoveryState) {
        if let Some(v) = self.disciplines {
            state.disciplines = v;
        }
        if let Some(v) = self.mode {
            state.mode = Some(v);
        }
        if let Some(v) = self.verses {
            state.verses = Some(v);
        }
        if let Some(v) = self.tafseer_context {
            state.tafseer_context = Some(v);
        }
        if let Some(v) = self.linguistic_analysis {
            state.linguistic_analysis = Some(v);
        }
        if let Some(v) = self.science_findings {
            state.science_findings = Some(v);
        }
        if let Some(v) = self.tafseer_findings {
            state.tafseer_findings = Some(v);
        }
        if let Some(v) = self.humanities_findings {
            state.humanities_findings = Some(v);
        }
        if let Some(v) = self.synthesis {
            state.synthesis = Some(v);
        }
        if let Some(v) = self.confidence_tier {
            state.confidence_tier = Some(v);
        }
        if let Some(v) = self.quality_score {
            state.quality_score = Some(v);
        }
        if let Some(v) = self.quality_issues {
            state.quality_issues = v;
        }
        if let Some(v) = self.discovery_id {
            state.discovery_id = Some(v);
        }
        if let Some(v) = self.should_deepen {
            state.should_deepen = v;
        }
        if let Some(v) = self.iteration_count {
            state.iteration_count = v;
        }
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(
        &self,
        snapshot: Arc<DiscoveryState>,
        ctx: &StageContext,
    ) -> Result<PartialUpdate, StageError>;
}
