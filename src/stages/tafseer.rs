//! `tafseer` — fetches/aligns multi-source exegesis for retrieved verses.
//! Depends on `linguistic`. Empty verses yield an empty-but-present
//! `TafseerFindings` rather than an error.

use async_trait::async_trait;
use std::sync::Arc;

use super::{PartialUpdate, Stage, StageContext};
use crate::errors::StageError;
use crate::state::{DiscoveryState, ProgressRecord, TafseerFindings};

const SYSTEM_PROMPT: &str =
    "Summarize the linguistic nuance an exegete such as al-Sha'rawi would add to these \
     verses, in one short note.";

pub struct TafseerStage;

#[async_trait]
impl Stage for TafseerStage {
    fn name(&self) -> &'static str {
        crate::dag::STAGE_TAFSEER
    }

    async fn run(
        &self,
        snapshot: Arc<DiscoveryState>,
        ctx: &StageContext,
    ) -> Result<PartialUpdate, StageError> {
        let verses = snapshot.verses.clone().unwrap_or_default();

        let findings = if verses.is_empty() {
            TafseerFindings::default()
        } else {
            let details: Vec<_> = verses.iter().flat_map(|v| v.tafseers.clone()).collect();
            let consensus_view = details
                .iter()
                .map(|t| t.text.clone())
                .collect::<Vec<_>>()
                .join(" ");

            let verses_text = verses
                .iter()
                .map(|v| v.text_uthmani.clone())
                .collect::<Vec<_>>()
                .join("\n");
            let shaarawy_linguistic_note =
                match ctx.llm.complete(SYSTEM_PROMPT, &verses_text, 256, 0.3).await {
                    Ok(text) => Some(text),
                    Err(err) => {
                        tracing::warn!(error = %err, "tafseer LLM note failed");
                        None
                    }
                };

            TafseerFindings {
                consensus_view,
                differences: Vec::new(),
                shaarawy_linguistic_note,
                tafseer_details: details,
            }
        };

        let progress = ProgressRecord::ok(self.name());

        Ok(PartialUpdate {
            tafseer_findings: Some(findings),
            ..Default::default()
        }
        .with_progress(progress))
    }
}
