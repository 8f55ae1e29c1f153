//! Super-step execution over the fixed discovery topology.
//!
//! Generalizes the teacher's phase-executor fan-out/fan-in/channel shape
//! (originally per-phase, wave-scheduled) to per-stage, fixed-topology
//! scheduling: single stages run one at a time, the `{science, tafseer,
//! humanities}` set runs as one concurrent super-step, and
//! `quality_review`'s loop-back re-enters at `quran_rag` via an explicit
//! bounded counter rather than recursion.

use futures::future::join_all;
use std::pin::Pin;
use std::sync::Arc;

use super::{FAN_OUT_STAGES, MAX_ITERATIONS, STAGE_KG_UPDATE, STAGE_LINGUISTIC, STAGE_QURAN_RAG};
use crate::stages::{
    humanities::HumanitiesStage, kg_update::KgUpdateStage, linguistic::LinguisticStage,
    quality_review::QualityReviewStage, quran_rag::QuranRagStage, route_query::RouteQueryStage,
    science::ScienceStage, synthesis::SynthesisStage, tafseer::TafseerStage, Stage, StageContext,
};
use crate::state::{DiscoveryState, ProgressRecord};

/// One stage's contribution applied to the shared state, yielded
/// immediately after it is merged in. The streaming adapter (`events`)
/// consumes this sequence directly; `orchestrator::invoke` drains it and
/// keeps only the final state.
pub struct StageCompletion {
    pub stage: &'static str,
    pub state: Arc<DiscoveryState>,
}

pub type CompletionStream = Pin<Box<dyn futures::Stream<Item = StageCompletion> + Send>>;

fn stage_for(name: &'static str) -> Arc<dyn Stage> {
    match name {
        n if n == super::STAGE_ROUTE_QUERY => Arc::new(RouteQueryStage),
        n if n == super::STAGE_QURAN_RAG => Arc::new(QuranRagStage),
        n if n == super::STAGE_LINGUISTIC => Arc::new(LinguisticStage),
        n if n == super::STAGE_SCIENCE => Arc::new(ScienceStage),
        n if n == super::STAGE_TAFSEER => Arc::new(TafseerStage),
        n if n == super::STAGE_HUMANITIES => Arc::new(HumanitiesStage),
        n if n == super::STAGE_SYNTHESIS => Arc::new(SynthesisStage),
        n if n == super::STAGE_QUALITY_REVIEW => Arc::new(QualityReviewStage),
        n if n == STAGE_KG_UPDATE => Arc::new(KgUpdateStage),
        other => unreachable!("no stage registered for {other}"),
    }
}

async fn run_one(stage: &dyn Stage, snapshot: Arc<DiscoveryState>, ctx: &StageContext) -> crate::stages::PartialUpdate {
    match stage.run(snapshot, ctx).await {
        Ok(update) => update,
        Err(err) => {
            tracing::error!(stage = stage.name(), error = %err, "stage failed, continuing with empty defaults");
            crate::stages::PartialUpdate::default()
                .with_progress(ProgressRecord::error(stage.name(), err.to_string()))
        }
    }
}

/// Applies one stage's update: appends its progress records to the
/// event log, then overwrites every field it owns.
fn apply_single(state: &mut DiscoveryState, mut update: crate::stages::PartialUpdate) {
    let progress = std::mem::take(&mut update.progress);
    state.streaming_updates.extend(progress);
    update.merge_into(state);
}

/// Drives the fixed topology, yielding a `StageCompletion` after every
/// stage is merged into the shared state. Stops early (without a
/// `kg_update` completion) if the cancellation token fires between
/// stages.
pub fn run(initial: DiscoveryState, ctx: StageContext) -> CompletionStream {
    Box::pin(async_stream::stream! {
        let mut state = initial;

        let route_query = stage_for(super::STAGE_ROUTE_QUERY);
        let update = run_one(route_query.as_ref(), Arc::new(state.clone()), &ctx).await;
        apply_single(&mut state, update);
        yield StageCompletion { stage: super::STAGE_ROUTE_QUERY, state: Arc::new(state.clone()) };

        'outer: loop {
            if ctx.cancellation.is_cancelled() {
                break 'outer;
            }

            for stage_name in [STAGE_QURAN_RAG, STAGE_LINGUISTIC] {
                let stage = stage_for(stage_name);
                let update = run_one(stage.as_ref(), Arc::new(state.clone()), &ctx).await;
                apply_single(&mut state, update);
                yield StageCompletion { stage: stage_name, state: Arc::new(state.clone()) };

                if ctx.cancellation.is_cancelled() {
                    break 'outer;
                }
            }

            // Fan-out super-step: all three branches read the same
            // pre-step snapshot; the barrier below awaits every branch
            // before any are merged.
            let snapshot = Arc::new(state.clone());
            let fan_out_ctx = ctx.clone();
            let futures_iter = FAN_OUT_STAGES.iter().map(|&name| {
                let snapshot = snapshot.clone();
                let ctx = fan_out_ctx.clone();
                async move {
                    let stage = stage_for(name);
                    let update = run_one(stage.as_ref(), snapshot, &ctx).await;
                    (name, update)
                }
            });
            let mut fan_out_results = join_all(futures_iter).await;
            // Already built from FAN_OUT_STAGES which is declared in
            // lexicographic order, but sort defensively: the merge rule
            // requires stage-name lexicographic tie-break regardless of
            // completion order.
            fan_out_results.sort_by_key(|(name, _)| *name);
            for (name, update) in fan_out_results {
                apply_single(&mut state, update);
                yield StageCompletion { stage: name, state: Arc::new(state.clone()) };
            }

            if ctx.cancellation.is_cancelled() {
                break 'outer;
            }

            let synthesis = stage_for(super::STAGE_SYNTHESIS);
            let update = run_one(synthesis.as_ref(), Arc::new(state.clone()), &ctx).await;
            apply_single(&mut state, update);
            yield StageCompletion { stage: super::STAGE_SYNTHESIS, state: Arc::new(state.clone()) };

            if ctx.cancellation.is_cancelled() {
                break 'outer;
            }

            let quality_review = stage_for(super::STAGE_QUALITY_REVIEW);
            let update = run_one(quality_review.as_ref(), Arc::new(state.clone()), &ctx).await;
            apply_single(&mut state, update);
            yield StageCompletion { stage: super::STAGE_QUALITY_REVIEW, state: Arc::new(state.clone()) };

            debug_assert!(state.iteration_count <= MAX_ITERATIONS);

            if state.should_deepen && state.iteration_count < MAX_ITERATIONS {
                continue 'outer;
            }
            break 'outer;
        }

        if !ctx.cancellation.is_cancelled() {
            let kg_update = stage_for(STAGE_KG_UPDATE);
            let update = run_one(kg_update.as_ref(), Arc::new(state.clone()), &ctx).await;
            apply_single(&mut state, update);
            yield StageCompletion { stage: STAGE_KG_UPDATE, state: Arc::new(state.clone()) };
        }
    })
}
