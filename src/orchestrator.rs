//! Facade wiring the checkpointer, the engine, and the event translator
//! together behind two entry points: `invoke` (drain to a final state,
//! no client-visible events) and `stream` (the live SSE sequence).

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::adapters::{CorpusSearch, DiscoveryRecord, DiscoveryStore, Embeddings, Llm};
use crate::checkpoint::Checkpointer;
use crate::dag::engine;
use crate::errors::EngineError;
use crate::events::{self, EventTranslator, OutgoingEvent};
use crate::stages::StageContext;
use crate::state::DiscoveryState;

/// A guard that cancels its token when dropped — fires when the SSE
/// response body is dropped mid-stream (client disconnect), since the
/// `async_stream::stream!` generator driving it is dropped too.
struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Builds the record to persist, minting a fresh opaque id for it — the
/// store's primary key, not something the caller supplies (mirrors
/// `database/service.py`'s `save_discovery`, which mints the id via
/// `INSERT ... RETURNING id` rather than accepting one).
fn discovery_record_for(state: &DiscoveryState) -> Option<DiscoveryRecord> {
    let synthesis = state.synthesis.clone()?;
    Some(DiscoveryRecord {
        discovery_id: Uuid::new_v4().to_string(),
        query: state.query.clone(),
        synthesis,
        confidence_tier: state
            .confidence_tier
            .map(|t| t.as_str().to_string())
            .unwrap_or_default(),
        quality_score: state.quality_score.unwrap_or(0.0),
    })
}

pub struct Orchestrator {
    corpus: Arc<dyn CorpusSearch>,
    embeddings: Option<Arc<dyn Embeddings>>,
    llm: Arc<dyn Llm>,
    store: Arc<dyn DiscoveryStore>,
    checkpointer: Arc<Checkpointer>,
}

impl Orchestrator {
    pub fn new(
        corpus: Arc<dyn CorpusSearch>,
        embeddings: Option<Arc<dyn Embeddings>>,
        llm: Arc<dyn Llm>,
        store: Arc<dyn DiscoveryStore>,
        session_cap: usize,
    ) -> Self {
        Self {
            corpus,
            embeddings,
            llm,
            store,
            checkpointer: Arc::new(Checkpointer::new(session_cap)),
        }
    }

    fn stage_context(&self, cancellation: CancellationToken) -> StageContext {
        StageContext {
            corpus: self.corpus.clone(),
            embeddings: self.embeddings.clone(),
            llm: self.llm.clone(),
            store: self.store.clone(),
            cancellation,
        }
    }

    async fn persist(&self, state: &mut DiscoveryState) {
        let Some(record) = discovery_record_for(state) else {
            return;
        };
        match self.store.save(record).await {
            Ok(id) => state.discovery_id = Some(id),
            Err(err) => {
                tracing::warn!(error = %err, "discovery persistence failed, continuing without discovery_id");
            }
        }
    }

    /// Runs the full pipeline to completion without emitting client
    /// events; used by the non-streaming `explore` endpoint.
    pub async fn invoke(&self, initial: DiscoveryState, session_id: &str) -> Result<DiscoveryState, EngineError> {
        self.checkpointer.start(session_id, initial.clone())?;
        let cancellation = CancellationToken::new();
        let ctx = self.stage_context(cancellation);

        let mut stream = engine::run(initial, ctx);
        let mut state = None;
        while let Some(completion) = stream.next().await {
            self.checkpointer.put(session_id, (*completion.state).clone());
            state = Some((*completion.state).clone());
        }
        let mut final_state = state.ok_or_else(|| EngineError::Other(anyhow::anyhow!("engine produced no output")))?;
        self.persist(&mut final_state).await;
        self.checkpointer.finish(session_id, final_state.clone());
        Ok(final_state)
    }

    /// Runs the pipeline, yielding the translated client event sequence.
    /// Cancels the engine automatically if the returned stream is dropped
    /// before completion (client disconnect).
    pub fn stream(&self, initial: DiscoveryState, session_id: String) -> Result<impl futures::Stream<Item = OutgoingEvent>, EngineError> {
        self.checkpointer.start(&session_id, initial.clone())?;
        let cancellation = CancellationToken::new();
        let ctx = self.stage_context(cancellation.clone());
        let checkpointer = self.checkpointer.clone();
        let store = self.store.clone();

        Ok(async_stream::stream! {
            let _cancel_guard = CancelOnDrop(cancellation.clone());
            yield events::session_start_event(&session_id);

            let mut translator = EventTranslator::new();
            let mut engine_stream = engine::run(initial, ctx);
            let mut last_state: Option<DiscoveryState> = None;
            let mut reached_kg_update = false;

            while let Some(completion) = engine_stream.next().await {
                checkpointer.put(&session_id, (*completion.state).clone());
                if completion.stage == crate::dag::STAGE_KG_UPDATE {
                    reached_kg_update = true;
                }
                for event in translator.translate(&completion) {
                    yield event;
                }
                last_state = Some((*completion.state).clone());
            }

            match last_state {
                Some(mut state) if reached_kg_update && !cancellation.is_cancelled() => {
                    if let Some(record) = discovery_record_for(&state) {
                        if let Ok(id) = store.save(record).await {
                            state.discovery_id = Some(id);
                        }
                    }
                    checkpointer.finish(&session_id, state.clone());
                    yield events::complete_event(&session_id, &state);
                }
                Some(state) => {
                    checkpointer.finish(&session_id, state);
                    yield events::error_event("cancelled");
                }
                None => {
                    yield events::error_event("engine produced no output");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{InMemoryDiscoveryStore, MockCorpusSearch, MockLlm};
    use crate::state::Mode;

    fn mock_orchestrator() -> Orchestrator {
        Orchestrator::new(
            Arc::new(MockCorpusSearch),
            None,
            Arc::new(MockLlm),
            Arc::new(InMemoryDiscoveryStore::default()),
            10,
        )
    }

    #[tokio::test]
    async fn invoke_runs_to_completion_and_persists_a_discovery() {
        let orchestrator = mock_orchestrator();
        let initial = DiscoveryState::new("question", vec!["physics".into()], Some(Mode::Guided));
        let final_state = orchestrator.invoke(initial, "s1").await.unwrap();
        assert!(final_state.synthesis.is_some());
        assert!(final_state.discovery_id.is_some());
    }

    #[tokio::test]
    async fn second_invoke_for_same_in_flight_session_is_rejected() {
        let orchestrator = mock_orchestrator();
        orchestrator
            .checkpointer
            .start("dup", DiscoveryState::new("q", vec![], None))
            .unwrap();
        let result = orchestrator
            .invoke(DiscoveryState::new("q", vec![], None), "dup")
            .await;
        assert!(matches!(result, Err(EngineError::SessionAlreadyRunning(_))));
    }

    #[tokio::test]
    async fn stream_emits_session_start_then_complete() {
        let orchestrator = mock_orchestrator();
        let initial = DiscoveryState::new("question", vec!["physics".into()], Some(Mode::Guided));
        let stream = orchestrator.stream(initial, "s2".to_string()).unwrap();
        let events: Vec<OutgoingEvent> = stream.collect().await;
        assert_eq!(events.first().unwrap().name, "session_start");
        assert_eq!(events.last().unwrap().name, "complete");
    }
}
