//! The fixed discovery DAG.
//!
//! ```text
//! route_query -> quran_rag -> linguistic -> { science, tafseer, humanities }
//!                                             all three -> synthesis -> quality_review
//! quality_review --deepen--> quran_rag      (loop-back, bounded)
//! quality_review --complete--> kg_update -> END
//! ```
//!
//! The topology never varies at runtime, so it is a constant declaration
//! rather than a dynamically built graph (see `DESIGN.md`). `engine`
//! drives it super-step by super-step.

pub mod engine;

/// The quality-gate threshold below which `quality_review` requests
/// another retrieval/synthesis pass. A constant of the core, not a tuned
/// value — changing it is a behavior change.
pub const QUALITY_THRESHOLD: f64 = 0.6;

/// Hard bound on loop-back re-entries through `quran_rag`.
pub const MAX_ITERATIONS: u32 = 3;

/// The outgoing SSE event name shared by both `science` and `humanities`
/// findings. Kept as a single named constant so a future split is a
/// one-line change (see Open Questions in `DESIGN.md`).
pub const HUMANITIES_EVENT_NAME: &str = "science_finding";

pub const STAGE_ROUTE_QUERY: &str = "route_query";
pub const STAGE_QURAN_RAG: &str = "quran_rag";
pub const STAGE_LINGUISTIC: &str = "linguistic";
pub const STAGE_SCIENCE: &str = "science";
pub const STAGE_TAFSEER: &str = "tafseer";
pub const STAGE_HUMANITIES: &str = "humanities";
pub const STAGE_SYNTHESIS: &str = "synthesis";
pub const STAGE_QUALITY_REVIEW: &str = "quality_review";
pub const STAGE_KG_UPDATE: &str = "kg_update";

/// The fan-out set executed as one super-step after `linguistic`, already
/// in the lexicographic order used to tie-break event emission.
pub const FAN_OUT_STAGES: [&str; 3] = [STAGE_HUMANITIES, STAGE_SCIENCE, STAGE_TAFSEER];
