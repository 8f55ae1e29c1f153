//! `linguistic` — morphological/root/rhetoric extraction over retrieved
//! verses. Depends on `quran_rag`; empty verses yield an empty analysis
//! rather than an error (downstream stages tolerate empty inputs).

use async_trait::async_trait;
use std::sync::Arc;

use super::{PartialUpdate, Stage, StageContext};
use crate::errors::StageError;
use crate::state::{DiscoveryState, LinguisticAnalysis, ProgressRecord};

const SYSTEM_PROMPT: &str =
    "You are a classical Arabic linguist. Given verses, extract triliteral roots, \
     morphological notes, and rhetorical devices as JSON with keys \
     roots, morphology, rhetorical_devices.";

pub struct LinguisticStage;

#[async_trait]
impl Stage for LinguisticStage {
    fn name(&self) -> &'static str {
        crate::dag::STAGE_LINGUISTIC
    }

    async fn run(
        &self,
        snapshot: Arc<DiscoveryState>,
        ctx: &StageContext,
    ) -> Result<PartialUpdate, StageError> {
        let verses = snapshot.verses.clone().unwrap_or_default();

        let analysis = if verses.is_empty() {
            LinguisticAnalysis::default()
        } else {
            let user_prompt = verses
                .iter()
                .map(|v| v.text_uthmani.clone())
                .collect::<Vec<_>>()
                .join("\n");

            match ctx.llm.complete(SYSTEM_PROMPT, &user_prompt, 1024, 0.3).await {
                Ok(text) => parse_or_fallback(&text, &verses),
                Err(err) => {
                    tracing::warn!(error = %err, "linguistic LLM call failed, using heuristic fallback");
                    heuristic_fallback(&verses)
                }
            }
        };

        let progress = ProgressRecord::ok(self.name());

        Ok(PartialUpdate {
            linguistic_analysis: Some(analysis),
            ..Default::default()
        }
        .with_progress(progress))
    }
}

fn parse_or_fallback(text: &str, verses: &[crate::state::VerseRecord]) -> LinguisticAnalysis {
    serde_json::from_str::<LinguisticAnalysis>(text).unwrap_or_else(|_| heuristic_fallback(verses))
}

/// Deterministic fallback used whenever the LLM response can't be parsed
/// as structured linguistic analysis: unique words of four or more
/// characters stand in for extracted roots.
fn heuristic_fallback(verses: &[crate::state::VerseRecord]) -> LinguisticAnalysis {
    let mut roots: Vec<String> = Vec::new();
    for verse in verses {
        for word in verse.text_uthmani.split_whitespace() {
            if word.chars().count() >= 4 && !roots.contains(&word.to_string()) {
                roots.push(word.to_string());
            }
        }
    }
    LinguisticAnalysis {
        roots,
        morphology: serde_json::Map::new(),
        rhetorical_devices: Vec::new(),
    }
}
