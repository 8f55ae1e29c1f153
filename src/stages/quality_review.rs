//! `quality_review` — the gate. Rule-based checks over the state, an
//! optional LLM second opinion, `quality_score`/`quality_issues`, and
//! `should_deepen`; increments `iteration_count` atomically. Arithmetic
//! pinned from the original (`SPEC_FULL.md` §4.1): 0.15 deducted per
//! issue, averaged 50/50 with an LLM score when available, threshold 0.6.

use async_trait::async_trait;
use std::sync::Arc;

use super::{PartialUpdate, Stage, StageContext};
use crate::dag::{MAX_ITERATIONS, QUALITY_THRESHOLD};
use crate::errors::StageError;
use crate::state::DiscoveryState;
use crate::state::ProgressRecord;

const ISSUE_PENALTY: f64 = 0.15;
const LLM_SYSTEM_PROMPT: &str =
    "Grade this discovery's scholarly rigor from 0 to 1 and reply with just the number.";

pub struct QualityReviewStage;

#[async_trait]
impl Stage for QualityReviewStage {
    fn name(&self) -> &'static str {
        crate::dag::STAGE_QUALITY_REVIEW
    }

    async fn run(
        &self,
        snapshot: Arc<DiscoveryState>,
        ctx: &StageContext,
    ) -> Result<PartialUpdate, StageError> {
        let issues = rule_based_checks(&snapshot);
        let rule_score = (1.0 - issues.len() as f64 * ISSUE_PENALTY).max(0.0);

        let synthesis_text = snapshot.synthesis.clone().unwrap_or_default();
        let llm_score = ctx
            .llm
            .complete(LLM_SYSTEM_PROMPT, &synthesis_text, 16, 0.0)
            .await
            .ok()
            .and_then(|text| text.trim().parse::<f64>().ok())
            .filter(|v| (0.0..=1.0).contains(v));

        let raw_score = match llm_score {
            Some(llm) => (rule_score + llm) / 2.0,
            None => rule_score,
        };
        let quality_score = (raw_score.clamp(0.0, 1.0) * 100.0).round() / 100.0;

        let next_iteration = snapshot.iteration_count + 1;
        let should_deepen = quality_score < QUALITY_THRESHOLD && next_iteration < MAX_ITERATIONS;

        let progress = ProgressRecord::ok(self.name())
            .with_field("score", serde_json::json!(quality_score))
            .with_field("should_deepen", serde_json::json!(should_deepen));

        Ok(PartialUpdate {
            quality_score: Some(quality_score),
            quality_issues: Some(issues),
            should_deepen: Some(should_deepen),
            iteration_count: Some(next_iteration),
            ..Default::default()
        }
        .with_progress(progress))
    }
}

fn rule_based_checks(state: &DiscoveryState) -> Vec<String> {
    let mut issues = Vec::new();

    match &state.verses {
        Some(verses) if !verses.is_empty() => {}
        _ => issues.push("no verses retrieved".to_string()),
    }

    match &state.linguistic_analysis {
        Some(analysis) if !analysis.roots.is_empty() => {}
        _ => issues.push("linguistic analysis missing roots".to_string()),
    }

    for finding in state.science_findings.iter().flatten() {
        if finding.main_objection.is_none() {
            issues.push(format!(
                "scientific correlation without a main objection: {}",
                finding.verse_key
            ));
        }
        if !matches!(finding.confidence_tier.as_str(), "tier_1" | "tier_2" | "tier_3") {
            issues.push(format!("invalid confidence tier for {}", finding.verse_key));
        }
    }

    for finding in state.humanities_findings.iter().flatten() {
        if finding.intellectual_honesty_note.is_none() {
            issues.push(format!(
                "humanities correlation without an intellectual-honesty note: {}",
                finding.verse_key
            ));
        }
    }

    match &state.tafseer_findings {
        Some(findings) => {
            if findings.consensus_view.is_empty() {
                issues.push("tafseer missing consensus view".to_string());
            }
            if findings.shaarawy_linguistic_note.is_none() {
                issues.push("tafseer missing linguistic note".to_string());
            }
        }
        None => issues.push("tafseer findings missing".to_string()),
    }

    match &state.synthesis {
        Some(text) if text.is_empty() => issues.push("synthesis is empty".to_string()),
        Some(text) if !text.contains("tier_") => {
            issues.push("synthesis missing tier marker".to_string())
        }
        Some(_) => {}
        None => issues.push("synthesis missing".to_string()),
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{LinguisticAnalysis, VerseRecord};

    fn well_formed_state() -> DiscoveryState {
        let mut state = DiscoveryState::new("q", vec![], None);
        state.verses = Some(vec![VerseRecord::new(21, 30, "نص", "text")]);
        state.linguistic_analysis = Some(LinguisticAnalysis {
            roots: vec!["ماء".to_string()],
            ..Default::default()
        });
        state.tafseer_findings = Some(crate::state::TafseerFindings {
            consensus_view: "consensus".into(),
            shaarawy_linguistic_note: Some("note".into()),
            ..Default::default()
        });
        state.synthesis = Some("report tier_2".into());
        state
    }

    #[test]
    fn well_formed_state_has_no_issues() {
        assert!(rule_based_checks(&well_formed_state()).is_empty());
    }

    #[test]
    fn missing_verses_is_an_issue() {
        let mut state = well_formed_state();
        state.verses = None;
        assert!(rule_based_checks(&state).iter().any(|i| i.contains("verses")));
    }

    #[tokio::test]
    async fn perfect_state_yields_should_deepen_false() {
        let stage = QualityReviewStage;
        let ctx = crate::adapters::test_support::mock_context();
        let state = Arc::new(well_formed_state());
        let update = stage.run(state, &ctx).await.unwrap();
        assert_eq!(update.should_deepen, Some(false));
        assert!(update.quality_score.unwrap() >= QUALITY_THRESHOLD);
    }

    #[tokio::test]
    async fn iteration_count_always_increments() {
        let stage = QualityReviewStage;
        let ctx = crate::adapters::test_support::mock_context();
        let mut state = well_formed_state();
        state.iteration_count = 1;
        let update = stage.run(Arc::new(state), &ctx).await.unwrap();
        assert_eq!(update.iteration_count, Some(2));
    }

    #[tokio::test]
    async fn should_deepen_forced_false_at_max_iterations() {
        let stage = QualityReviewStage;
        let ctx = crate::adapters::test_support::mock_context();
        let mut state = DiscoveryState::new("q", vec![], None); // many issues -> low score
        state.iteration_count = MAX_ITERATIONS - 1;
        let update = stage.run(Arc::new(state), &ctx).await.unwrap();
        assert_eq!(update.iteration_count, Some(MAX_ITERATIONS));
        assert_eq!(update.should_deepen, Some(false));
    }
}
