//! `synthesis` — consumes all prior findings, produces `synthesis` text
//! and `confidence_tier`. Tier is extracted by substring scan: `tier_1`
//! is checked before `tier_3`; if neither appears, the default is
//! `tier_2` (matches the original exactly — see `SPEC_FULL.md` §4.1).

use async_trait::async_trait;
use std::sync::Arc;

use super::{PartialUpdate, Stage, StageContext};
use crate::errors::StageError;
use crate::state::{ConfidenceTier, DiscoveryState, ProgressRecord};

const SYSTEM_PROMPT: &str =
    "Synthesize the linguistic, scientific, exegetical, and humanities findings into a \
     structured report with an explicit confidence tier marker (tier_1, tier_2, or \
     tier_3) somewhere in the text.";

pub struct SynthesisStage;

#[async_trait]
impl Stage for SynthesisStage {
    fn name(&self) -> &'static str {
        crate::dag::STAGE_SYNTHESIS
    }

    async fn run(
        &self,
        snapshot: Arc<DiscoveryState>,
        ctx: &StageContext,
    ) -> Result<PartialUpdate, StageError> {
        let user_prompt = build_prompt(&snapshot);

        let text = match ctx.llm.complete(SYSTEM_PROMPT, &user_prompt, 2048, 0.6).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(error = %err, "synthesis LLM call failed, using mock synthesis");
                crate::adapters::mock::MockLlm
                    .complete(SYSTEM_PROMPT, &user_prompt, 2048, 0.6)
                    .await
                    .unwrap_or_default()
            }
        };

        let tier = extract_tier(&text);

        let progress = ProgressRecord::ok(self.name())
            .with_field("confidence_tier", serde_json::json!(tier.as_str()));

        Ok(PartialUpdate {
            synthesis: Some(text),
            confidence_tier: Some(tier),
            ..Default::default()
        }
        .with_progress(progress))
    }
}

fn build_prompt(state: &DiscoveryState) -> String {
    let verses = state
        .verses
        .as_ref()
        .map(|v| v.iter().map(|v| v.text_uthmani.clone()).collect::<Vec<_>>().join("\n"))
        .unwrap_or_default();
    let science = state
        .science_findings
        .as_ref()
        .map(|f| f.iter().map(|f| f.scientific_claim.clone()).collect::<Vec<_>>().join("\n"))
        .unwrap_or_default();
    let humanities = state
        .humanities_findings
        .as_ref()
        .map(|f| f.iter().map(|f| f.quranic_concept.clone()).collect::<Vec<_>>().join("\n"))
        .unwrap_or_default();
    let tafseer = state
        .tafseer_findings
        .as_ref()
        .map(|t| t.consensus_view.clone())
        .unwrap_or_default();

    format!(
        "Query: {}\nVerses:\n{verses}\nScience:\n{science}\nTafseer:\n{tafseer}\nHumanities:\n{humanities}",
        state.query
    )
}

/// Checks `tier_1` before `tier_3`; defaults to `tier_2` when neither
/// literal appears in the synthesized text.
fn extract_tier(text: &str) -> ConfidenceTier {
    if text.contains("tier_1") {
        ConfidenceTier::Tier1
    } else if text.contains("tier_3") {
        ConfidenceTier::Tier3
    } else {
        ConfidenceTier::Tier2
    }
}
