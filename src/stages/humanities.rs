//! `humanities` — analogous to `science` but for non-natural-science
//! disciplines; depends on `linguistic`. Same concurrent per-discipline
//! fan-out shape as `science`.

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

use super::{PartialUpdate, Stage, StageContext};
use crate::errors::StageError;
use crate::state::{CorrelationType, DiscoveryState, HumanitiesFinding, ProgressRecord};

const SYSTEM_PROMPT: &str =
    "You are a scholar correlating a Quranic verse with a humanities discipline \
     (history, sociology, philosophy, psychology, economics, ...). State the \
     quranic concept invoked and whether the correlation is intersecting, \
     parallel, or inspirational, with an intellectual-honesty caveat.";

pub struct HumanitiesStage;

#[async_trait]
impl Stage for HumanitiesStage {
    fn name(&self) -> &'static str {
        crate::dag::STAGE_HUMANITIES
    }

    async fn run(
        &self,
        snapshot: Arc<DiscoveryState>,
        ctx: &StageContext,
    ) -> Result<PartialUpdate, StageError> {
        let verses = snapshot.verses.clone().unwrap_or_default();
        if verses.is_empty() || snapshot.disciplines.is_empty() {
            return Ok(PartialUpdate {
                humanities_findings: Some(Vec::new()),
                ..Default::default()
            }
            .with_progress(ProgressRecord::ok(self.name())));
        }

        let verse_key = verses[0].verse_key.clone();
        let verses_text = verses
            .iter()
            .map(|v| v.text_uthmani.clone())
            .collect::<Vec<_>>()
            .join("\n");

        let tasks = snapshot.disciplines.iter().cloned().map(|discipline| {
            let llm = ctx.llm.clone();
            let verses_text = verses_text.clone();
            let verse_key = verse_key.clone();
            async move { explore_discipline(llm, discipline, verse_key, verses_text).await }
        });

        let findings: Vec<HumanitiesFinding> = join_all(tasks).await;

        let progress = ProgressRecord::ok(self.name())
            .with_field("finding_count", serde_json::json!(findings.len()));

        Ok(PartialUpdate {
            humanities_findings: Some(findings),
            ..Default::default()
        }
        .with_progress(progress))
    }
}

async fn explore_discipline(
    llm: Arc<dyn crate::adapters::Llm>,
    discipline: String,
    verse_key: String,
    verses_text: String,
) -> HumanitiesFinding {
    let user_prompt = format!("Discipline: {discipline}\nVerses:\n{verses_text}");
    match llm.complete(SYSTEM_PROMPT, &user_prompt, 512, 0.4).await {
        Ok(text) => HumanitiesFinding {
            verse_key,
            discipline,
            correlation_type: CorrelationType::Intersecting,
            quranic_concept: text,
            intellectual_honesty_note: Some(
                "correlation is illustrative, not a claim of scientific proof".to_string(),
            ),
        },
        Err(_) => HumanitiesFinding {
            verse_key,
            discipline,
            correlation_type: CorrelationType::Parallel,
            quranic_concept: "no correlation available".to_string(),
            intellectual_honesty_note: None,
        },
    }
}
