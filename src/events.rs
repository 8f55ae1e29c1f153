//! Event stream adapter — translates `StageCompletion`s into the
//! client-facing `(event_name, json_payload)` sequence (§4.5).

use std::collections::HashSet;

use crate::dag::engine::StageCompletion;
use crate::dag::HUMANITIES_EVENT_NAME;
use crate::state::DiscoveryState;

pub const EVENT_SESSION_START: &str = "session_start";
pub const EVENT_QURAN_SEARCH: &str = "quran_search";
pub const EVENT_QURAN_FOUND: &str = "quran_found";
pub const EVENT_LINGUISTIC: &str = "linguistic";
pub const EVENT_TAFSEER: &str = "tafseer";
pub const EVENT_SYNTHESIS_TOKEN: &str = "synthesis_token";
pub const EVENT_QUALITY_DONE: &str = "quality_done";
pub const EVENT_COMPLETE: &str = "complete";
pub const EVENT_ERROR: &str = "error";

#[derive(Debug, Clone)]
pub struct OutgoingEvent {
    pub name: String,
    pub payload: serde_json::Value,
}

impl OutgoingEvent {
    pub fn new(name: &str, payload: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            payload,
        }
    }
}

/// Tracks which "emit once" event names have already gone out this
/// session. `synthesis_token` and `science_finding` are exempt — they
/// may repeat across loop-back iterations (§8 invariant 2).
#[derive(Default)]
pub struct EventTranslator {
    seen: HashSet<&'static str>,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit_once(&mut self, name: &'static str) -> bool {
        self.seen.insert(name)
    }

    /// Translates one completed stage into zero or more outgoing events,
    /// per the rules in `SPEC_FULL.md` §4.5.
    pub fn translate(&mut self, completion: &StageCompletion) -> Vec<OutgoingEvent> {
        let state = completion.state.as_ref();
        match completion.stage {
            "route_query" => {
                if self.emit_once(EVENT_QURAN_SEARCH) {
                    vec![OutgoingEvent::new(EVENT_QURAN_SEARCH, serde_json::json!({}))]
                } else {
                    Vec::new()
                }
            }
            "quran_rag" => {
                let mut events = Vec::new();
                if self.emit_once(EVENT_QURAN_SEARCH) {
                    events.push(OutgoingEvent::new(EVENT_QURAN_SEARCH, serde_json::json!({})));
                }
                if let Some(verses) = &state.verses {
                    if !verses.is_empty() && self.emit_once(EVENT_QURAN_FOUND) {
                        events.push(OutgoingEvent::new(
                            EVENT_QURAN_FOUND,
                            serde_json::json!({ "verses": verses }),
                        ));
                    }
                }
                events
            }
            "linguistic" => {
                if self.emit_once(EVENT_LINGUISTIC) {
                    vec![OutgoingEvent::new(
                        EVENT_LINGUISTIC,
                        serde_json::json!(state.linguistic_analysis),
                    )]
                } else {
                    Vec::new()
                }
            }
            "science" => state
                .science_findings
                .iter()
                .flatten()
                .map(|f| OutgoingEvent::new(HUMANITIES_EVENT_NAME, serde_json::json!(f)))
                .collect(),
            "humanities" => state
                .humanities_findings
                .iter()
                .flatten()
                .map(|f| OutgoingEvent::new(HUMANITIES_EVENT_NAME, serde_json::json!(f)))
                .collect(),
            "tafseer" => {
                if self.emit_once(EVENT_TAFSEER) {
                    vec![OutgoingEvent::new(
                        EVENT_TAFSEER,
                        serde_json::json!(state.tafseer_findings),
                    )]
                } else {
                    Vec::new()
                }
            }
            "synthesis" => vec![OutgoingEvent::new(
                EVENT_SYNTHESIS_TOKEN,
                serde_json::json!({ "text": state.synthesis }),
            )],
            "quality_review" => {
                if self.emit_once(EVENT_QUALITY_DONE) {
                    vec![OutgoingEvent::new(
                        EVENT_QUALITY_DONE,
                        serde_json::json!({ "score": state.quality_score }),
                    )]
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        }
    }
}

pub fn session_start_event(session_id: &str) -> OutgoingEvent {
    OutgoingEvent::new(EVENT_SESSION_START, serde_json::json!({ "session_id": session_id }))
}

pub fn complete_event(session_id: &str, state: &DiscoveryState) -> OutgoingEvent {
    OutgoingEvent::new(
        EVENT_COMPLETE,
        serde_json::json!({
            "session_id": session_id,
            "synthesis": state.synthesis,
            "confidence_tier": state.confidence_tier,
            "quality_score": state.quality_score,
            "quality_issues": state.quality_issues,
            "verses_count": state.verses_count(),
            "science_findings_count": state.science_findings_count(),
            "humanities_findings_count": state.humanities_findings_count(),
            "discovery_id": state.discovery_id,
        }),
    )
}

pub fn error_event(reason: &str) -> OutgoingEvent {
    OutgoingEvent::new(EVENT_ERROR, serde_json::json!({ "error": reason }))
}
