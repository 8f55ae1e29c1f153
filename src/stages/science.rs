//! `science` — per-discipline fan-out inside the stage: launches one task
//! per `disciplines` entry concurrently and concatenates findings.
//! Depends on `linguistic`. Concurrent fan-out pattern grounded on the
//! review dispatcher's `futures::future::join_all` usage.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::sync::Arc;

use super::{PartialUpdate, Stage, StageContext};
use crate::errors::StageError;
use crate::state::{DiscoveryState, ProgressRecord, ScienceFinding};

const SYSTEM_PROMPT: &str =
    "You are a scholar correlating Quranic verses with a specific natural science \
     discipline. Respond with a JSON object with keys scientific_claim, \
     confidence_tier (tier_1, tier_2, or tier_3), main_objection (the main \
     scholarly objection, or null if there is none), and pre_islamic_knowledge \
     (whether the claim could have been pre-Islamic common knowledge, or null).";

pub struct ScienceStage;

#[async_trait]
impl Stage for ScienceStage {
    fn name(&self) -> &'static str {
        crate::dag::STAGE_SCIENCE
    }

    async fn run(
        &self,
        snapshot: Arc<DiscoveryState>,
        ctx: &StageContext,
    ) -> Result<PartialUpdate, StageError> {
        let verses = snapshot.verses.clone().unwrap_or_default();
        if verses.is_empty() || snapshot.disciplines.is_empty() {
            return Ok(PartialUpdate {
                science_findings: Some(Vec::new()),
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

        let findings: Vec<ScienceFinding> = join_all(tasks).await;

        let progress = ProgressRecord::ok(self.name())
            .with_field("finding_count", serde_json::json!(findings.len()));

        Ok(PartialUpdate {
            science_findings: Some(findings),
            ..Default::default()
        }
        .with_progress(progress))
    }
}

/// The JSON shape `SYSTEM_PROMPT` asks the LLM for. Every field is
/// optional so a partial or malformed response still degrades instead
/// of discarding the whole finding.
#[derive(Deserialize)]
struct ParsedFinding {
    #[serde(default)]
    scientific_claim: Option<String>,
    #[serde(default)]
    confidence_tier: Option<String>,
    #[serde(default)]
    main_objection: Option<String>,
    #[serde(default)]
    pre_islamic_knowledge: Option<String>,
}

async fn explore_discipline(
    llm: Arc<dyn crate::adapters::Llm>,
    discipline: String,
    verse_key: String,
    verses_text: String,
) -> ScienceFinding {
    let user_prompt = format!("Discipline: {discipline}\nVerses:\n{verses_text}");
    match llm.complete(SYSTEM_PROMPT, &user_prompt, 512, 0.4).await {
        Ok(text) => parse_or_fallback(&text, verse_key, discipline),
        Err(_) => ScienceFinding {
            verse_key,
            discipline,
            scientific_claim: "no correlation available".to_string(),
            confidence_tier: "tier_3".to_string(),
            main_objection: None,
            pre_islamic_knowledge: None,
        },
    }
}

/// Parses the LLM's JSON response into a finding; a response that isn't
/// valid JSON falls back to a `tier_2` finding carrying the raw text as
/// the claim (mirrors `linguistic::parse_or_fallback`'s degrade-not-drop
/// handling of an unparseable response).
fn parse_or_fallback(text: &str, verse_key: String, discipline: String) -> ScienceFinding {
    match serde_json::from_str::<ParsedFinding>(text) {
        Ok(parsed) => ScienceFinding {
            verse_key,
            discipline,
            scientific_claim: parsed.scientific_claim.unwrap_or_else(|| text.to_string()),
            confidence_tier: parsed.confidence_tier.unwrap_or_else(|| "tier_2".to_string()),
            main_objection: parsed.main_objection,
            pre_islamic_knowledge: parsed.pre_islamic_knowledge,
        },
        Err(_) => ScienceFinding {
            verse_key,
            discipline,
            scientific_claim: text.to_string(),
            confidence_tier: "tier_2".to_string(),
            main_objection: None,
            pre_islamic_knowledge: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::VerseRecord;

    #[tokio::test]
    async fn empty_verses_yield_empty_findings() {
        let stage = ScienceStage;
        let ctx = crate::adapters::test_support::mock_context();
        let state = Arc::new(DiscoveryState::new("q", vec!["physics".into()], None));
        let update = stage.run(state, &ctx).await.unwrap();
        assert!(update.science_findings.unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_finding_per_discipline() {
        let stage = ScienceStage;
        let ctx = crate::adapters::test_support::mock_context();
        let mut state = DiscoveryState::new("q", vec!["physics".into(), "biology".into()], None);
        state.verses = Some(vec![VerseRecord::new(21, 30, "نص", "text")]);
        let update = stage.run(Arc::new(state), &ctx).await.unwrap();
        let findings = update.science_findings.unwrap();
        assert_eq!(findings.len(), 2);
        let disciplines: Vec<&str> = findings.iter().map(|f| f.discipline.as_str()).collect();
        assert!(disciplines.contains(&"physics"));
        assert!(disciplines.contains(&"biology"));
    }

    #[test]
    fn well_formed_json_response_populates_objection_and_pre_islamic_fields() {
        let text = r#"{"scientific_claim": "claim", "confidence_tier": "tier_1",
                        "main_objection": "objection", "pre_islamic_knowledge": "yes"}"#;
        let finding = parse_or_fallback(text, "21:30".to_string(), "physics".to_string());
        assert_eq!(finding.scientific_claim, "claim");
        assert_eq!(finding.confidence_tier, "tier_1");
        assert_eq!(finding.main_objection.as_deref(), Some("objection"));
        assert_eq!(finding.pre_islamic_knowledge.as_deref(), Some("yes"));
    }

    #[test]
    fn non_json_response_falls_back_to_tier_2_with_raw_text_as_claim() {
        let finding = parse_or_fallback("not json", "21:30".to_string(), "physics".to_string());
        assert_eq!(finding.scientific_claim, "not json");
        assert_eq!(finding.confidence_tier, "tier_2");
        assert!(finding.main_objection.is_none());
    }
}
