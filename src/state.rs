//! The typed state record threaded through every stage.
//!
//! Every field is optional and owned by exactly one stage; the engine is
//! the sole writer (see `dag::engine`). `streaming_updates` is the one
//! field with append-merge semantics — every other field is an
//! overwrite-on-Some assignment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DISCIPLINES: &[&str] = &["physics", "biology", "psychology"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Guided,
    Autonomous,
    CrossDomain,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Guided
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Tier1,
    Tier2,
    Tier3,
}

impl ConfidenceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::Tier1 => "tier_1",
            ConfidenceTier::Tier2 => "tier_2",
            ConfidenceTier::Tier3 => "tier_3",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TafseerEntry {
    pub source: String,
    pub text: String,
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerseRecord {
    pub surah_number: u16,
    pub verse_number: u16,
    pub verse_key: String,
    pub text_uthmani: String,
    pub text_simple: String,
    pub similarity: Option<f32>,
    #[serde(default)]
    pub tafseers: Vec<TafseerEntry>,
}

impl VerseRecord {
    pub fn new(
        surah_number: u16,
        verse_number: u16,
        text_uthmani: impl Into<String>,
        text_simple: impl Into<String>,
    ) -> Self {
        Self {
            surah_number,
            verse_number,
            verse_key: format!("{surah_number}:{verse_number}"),
            text_uthmani: text_uthmani.into(),
            text_simple: text_simple.into(),
            similarity: None,
            tafseers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RhetoricalDevice {
    pub device: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinguisticAnalysis {
    #[serde(default)]
    pub roots: Vec<String>,
    #[serde(default)]
    pub morphology: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub rhetorical_devices: Vec<RhetoricalDevice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScienceFinding {
    pub verse_key: String,
    pub discipline: String,
    pub scientific_claim: String,
    pub confidence_tier: String,
    pub main_objection: Option<String>,
    pub pre_islamic_knowledge: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationType {
    Intersecting,
    Parallel,
    Inspirational,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanitiesFinding {
    pub verse_key: String,
    pub discipline: String,
    pub correlation_type: CorrelationType,
    pub quranic_concept: String,
    pub intellectual_honesty_note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TafseerFindings {
    pub consensus_view: String,
    #[serde(default)]
    pub differences: Vec<String>,
    pub shaarawy_linguistic_note: Option<String>,
    #[serde(default)]
    pub tafseer_details: Vec<TafseerEntry>,
}

/// One entry in the append-only event log. Carries no ownership; copied
/// into the log by value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub stage: String,
    pub status: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressRecord {
    pub fn ok(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            status: "ok".to_string(),
            fields: serde_json::Map::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn error(stage: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert("error".to_string(), serde_json::Value::String(message.into()));
        Self {
            stage: stage.into(),
            status: "error".to_string(),
            fields,
            timestamp: Utc::now(),
        }
    }

    pub fn with_field(mut self, key: &str, value: serde_json::Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }
}

/// The full state record for one orchestration run. All fields besides
/// the inputs and the event log are written exactly once per stage
/// completion and are `None` until that stage has run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryState {
    // Inputs — written once by `route_query`'s defaulting, then immutable.
    pub query: String,
    pub disciplines: Vec<String>,
    pub mode: Option<Mode>,

    // Retrieved artifacts
    pub verses: Option<Vec<VerseRecord>>,
    pub tafseer_context: Option<String>,

    // Per-stage findings
    pub linguistic_analysis: Option<LinguisticAnalysis>,
    pub science_findings: Option<Vec<ScienceFinding>>,
    pub tafseer_findings: Option<TafseerFindings>,
    pub humanities_findings: Option<Vec<HumanitiesFinding>>,

    // Terminal outputs
    pub synthesis: Option<String>,
    pub confidence_tier: Option<ConfidenceTier>,
    pub quality_score: Option<f64>,
    pub quality_issues: Vec<String>,
    pub discovery_id: Option<String>,

    // Control
    pub should_deepen: bool,
    pub iteration_count: u32,

    // Event log — the one field with append-merge semantics.
    pub streaming_updates: Vec<ProgressRecord>,
}

impl DiscoveryState {
    pub fn new(query: impl Into<String>, disciplines: Vec<String>, mode: Option<Mode>) -> Self {
        Self {
            query: query.into(),
            disciplines,
            mode,
            ..Default::default()
        }
    }

    pub fn verses_count(&self) -> usize {
        self.verses.as_ref().map(Vec::len).unwrap_or(0)
    }

    pub fn science_findings_count(&self) -> usize {
        self.science_findings.as_ref().map(Vec::len).unwrap_or(0)
    }

    pub fn humanities_findings_count(&self) -> usize {
        self.humanities_findings.as_ref().map(Vec::len).unwrap_or(0)
    }
}
