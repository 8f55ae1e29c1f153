//! `route_query` — fills defaults, computes a routing hint, never fails.
//!
//! The routing hint is informational: it is recorded on the progress
//! record but does not change the fixed fan-out topology (§9 Design
//! Notes — the topology is a constant, not dynamically configured).
//! Grounded on the keyword-table heuristic of the original router.

use async_trait::async_trait;
use std::sync::Arc;

use super::{PartialUpdate, Stage, StageContext};
use crate::errors::StageError;
use crate::state::{DiscoveryState, Mode, ProgressRecord, DEFAULT_DISCIPLINES};

const SCIENCE_KEYWORDS: &[&str] = &[
    "فيزياء", "physics", "بيولوجيا", "biology", "كيمياء", "chemistry", "علمي", "scientific",
];
const HUMANITIES_KEYWORDS: &[&str] = &[
    "تاريخ", "history", "فلسفة", "philosophy", "اجتماع", "sociology", "اخلاق", "ethics",
];
const TAFSEER_KEYWORDS: &[&str] = &["تفسير", "exegesis", "tafsir", "معنى الآية"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingHint {
    Parallel,
    Science,
    Humanities,
    Tafseer,
}

impl RoutingHint {
    fn as_str(&self) -> &'static str {
        match self {
            RoutingHint::Parallel => "parallel",
            RoutingHint::Science => "science",
            RoutingHint::Humanities => "humanities",
            RoutingHint::Tafseer => "tafseer",
        }
    }
}

fn count_hits(query: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|kw| query.contains(*kw)).count()
}

/// Computes the routing hint via keyword-table scoring. `autonomous`
/// and `cross_domain` modes always route to `parallel`, matching the
/// original's mode override.
pub fn route(query: &str, mode: Mode) -> RoutingHint {
    if matches!(mode, Mode::Autonomous | Mode::CrossDomain) {
        return RoutingHint::Parallel;
    }

    let science_score = count_hits(query, SCIENCE_KEYWORDS);
    let humanities_score = count_hits(query, HUMANITIES_KEYWORDS);
    let tafseer_score = count_hits(query, TAFSEER_KEYWORDS);
    let max_score = science_score.max(humanities_score).max(tafseer_score);

    if max_score == 0 {
        return RoutingHint::Parallel;
    }

    let winners: Vec<RoutingHint> = [
        (science_score, RoutingHint::Science),
        (humanities_score, RoutingHint::Humanities),
        (tafseer_score, RoutingHint::Tafseer),
    ]
    .into_iter()
    .filter(|(score, _)| *score == max_score)
    .map(|(_, hint)| hint)
    .collect();

    if winners.len() == 1 {
        winners[0]
    } else {
        RoutingHint::Parallel
    }
}

pub struct RouteQueryStage;

#[async_trait]
impl Stage for RouteQueryStage {
    fn name(&self) -> &'static str {
        crate::dag::STAGE_ROUTE_QUERY
    }

    async fn run(
        &self,
        snapshot: Arc<DiscoveryState>,
        _ctx: &StageContext,
    ) -> Result<PartialUpdate, StageError> {
        let disciplines = if snapshot.disciplines.is_empty() {
            DEFAULT_DISCIPLINES.iter().map(|s| s.to_string()).collect()
        } else {
            snapshot.disciplines.clone()
        };
        let mode = snapshot.mode.unwrap_or(Mode::Guided);
        let hint = route(&snapshot.query, mode);

        let progress = ProgressRecord::ok(self.name())
            .with_field("routing_hint", serde_json::Value::String(hint.as_str().to_string()));

        Ok(PartialUpdate {
            disciplines: Some(disciplines),
            mode: Some(mode),
            iteration_count: Some(snapshot.iteration_count),
            ..Default::default()
        }
        .with_progress(progress))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_routes_parallel() {
        assert_eq!(route("x", Mode::Guided), RoutingHint::Parallel);
    }

    #[test]
    fn science_keyword_routes_science() {
        assert_eq!(route("physics in the Quran", Mode::Guided), RoutingHint::Science);
    }

    #[test]
    fn tie_between_categories_routes_parallel() {
        // one science hit, one humanities hit -> tie -> parallel
        assert_eq!(route("physics and history", Mode::Guided), RoutingHint::Parallel);
    }

    #[test]
    fn autonomous_mode_always_routes_parallel_regardless_of_keywords() {
        assert_eq!(route("physics physics physics", Mode::Autonomous), RoutingHint::Parallel);
    }

    #[tokio::test]
    async fn stage_fills_default_disciplines_when_empty() {
        let stage = RouteQueryStage;
        let ctx = crate::adapters::test_support::mock_context();
        let state = Arc::new(DiscoveryState::new("x", vec![], None));
        let update = stage.run(state, &ctx).await.unwrap();
        assert_eq!(
            update.disciplines.unwrap(),
            vec!["physics".to_string(), "biology".to_string(), "psychology".to_string()]
        );
    }

    #[tokio::test]
    async fn stage_preserves_non_empty_disciplines() {
        let stage = RouteQueryStage;
        let ctx = crate::adapters::test_support::mock_context();
        let state = Arc::new(DiscoveryState::new("x", vec!["physics".to_string()], None));
        let update = stage.run(state, &ctx).await.unwrap();
        assert_eq!(update.disciplines.unwrap(), vec!["physics".to_string()]);
    }
}
