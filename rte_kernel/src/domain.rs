//! RTE Kernel: core domain types.
//!
//! Pure data. The element vocabulary, access modes, value types and the
//! immutable progress snapshot handed to the persistence layer.

use serde::{Deserialize, Serialize};

use crate::arithmetic::SCALE;
use crate::dialect::Dialect;

// ── Access modes and value types ───────────────────────────────────

/// Who may read or write an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    /// Computed by the runtime; content may only read.
    ReadOnly,
    /// Content may only write; reads return empty.
    WriteOnly,
    ReadWrite,
    /// Seeded by the host at Initialize; content may only read.
    InitOnly,
}

impl AccessMode {
    pub fn readable(self) -> bool {
        !matches!(self, AccessMode::WriteOnly)
    }

    pub fn writable_by_content(self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }
}

pub const COMPLETION_VOCAB: &[&str] =
    &["completed", "incomplete", "not attempted", "unknown", "browsed"];
pub const SUCCESS_VOCAB: &[&str] = &["passed", "failed", "unknown"];
pub const ENTRY_VOCAB: &[&str] = &["ab-initio", "resume", ""];
pub const EXIT_VOCAB: &[&str] = &["time-out", "suspend", "logout", "normal", ""];
pub const CREDIT_VOCAB: &[&str] = &["credit", "no-credit"];
pub const MODE_VOCAB: &[&str] = &["browse", "normal", "review"];

/// Canonical value types. Bounds are fixed-point (see `arithmetic::SCALE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Text,
    Vocabulary(&'static [&'static str]),
    Decimal,
    BoundedDecimal { low: i64, high: i64 },
    /// Stored in the current-dialect ISO-8601 duration form.
    Timespan,
}

// ── Elements ───────────────────────────────────────────────────────

/// One recognized progress field, identified by its canonical key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Element {
    LearnerId,
    LearnerName,
    CompletionStatus,
    SuccessStatus,
    ScoreRaw,
    ScoreMin,
    ScoreMax,
    ScoreScaled,
    SessionTime,
    TotalTime,
    Location,
    SuspendData,
    LaunchData,
    Entry,
    Exit,
    Credit,
    Mode,
    ScaledPassingScore,
    CompletionThreshold,
    ProgressMeasure,
}

impl Element {
    pub const ALL: [Element; 20] = [
        Element::LearnerId,
        Element::LearnerName,
        Element::CompletionStatus,
        Element::SuccessStatus,
        Element::ScoreRaw,
        Element::ScoreMin,
        Element::ScoreMax,
        Element::ScoreScaled,
        Element::SessionTime,
        Element::TotalTime,
        Element::Location,
        Element::SuspendData,
        Element::LaunchData,
        Element::Entry,
        Element::Exit,
        Element::Credit,
        Element::Mode,
        Element::ScaledPassingScore,
        Element::CompletionThreshold,
        Element::ProgressMeasure,
    ];

    /// Canonical (current-dialect) key.
    pub fn canonical_key(self) -> &'static str {
        match self {
            Element::LearnerId => "cmi.learner_id",
            Element::LearnerName => "cmi.learner_name",
            Element::CompletionStatus => "cmi.completion_status",
            Element::SuccessStatus => "cmi.success_status",
            Element::ScoreRaw => "cmi.score.raw",
            Element::ScoreMin => "cmi.score.min",
            Element::ScoreMax => "cmi.score.max",
            Element::ScoreScaled => "cmi.score.scaled",
            Element::SessionTime => "cmi.session_time",
            Element::TotalTime => "cmi.total_time",
            Element::Location => "cmi.location",
            Element::SuspendData => "cmi.suspend_data",
            Element::LaunchData => "cmi.launch_data",
            Element::Entry => "cmi.entry",
            Element::Exit => "cmi.exit",
            Element::Credit => "cmi.credit",
            Element::Mode => "cmi.mode",
            Element::ScaledPassingScore => "cmi.scaled_passing_score",
            Element::CompletionThreshold => "cmi.completion_threshold",
            Element::ProgressMeasure => "cmi.progress_measure",
        }
    }

    pub fn from_canonical_key(key: &str) -> Option<Element> {
        Self::ALL.iter().copied().find(|e| e.canonical_key() == key)
    }

    pub fn access_mode(self) -> AccessMode {
        match self {
            Element::LearnerId
            | Element::LearnerName
            | Element::LaunchData
            | Element::Entry
            | Element::Credit
            | Element::Mode
            | Element::ScaledPassingScore
            | Element::CompletionThreshold => AccessMode::InitOnly,
            Element::TotalTime => AccessMode::ReadOnly,
            Element::SessionTime | Element::Exit => AccessMode::WriteOnly,
            Element::CompletionStatus
            | Element::SuccessStatus
            | Element::ScoreRaw
            | Element::ScoreMin
            | Element::ScoreMax
            | Element::ScoreScaled
            | Element::Location
            | Element::SuspendData
            | Element::ProgressMeasure => AccessMode::ReadWrite,
        }
    }

    pub fn value_type(self) -> ValueType {
        match self {
            Element::CompletionStatus => ValueType::Vocabulary(COMPLETION_VOCAB),
            Element::SuccessStatus => ValueType::Vocabulary(SUCCESS_VOCAB),
            Element::Entry => ValueType::Vocabulary(ENTRY_VOCAB),
            Element::Exit => ValueType::Vocabulary(EXIT_VOCAB),
            Element::Credit => ValueType::Vocabulary(CREDIT_VOCAB),
            Element::Mode => ValueType::Vocabulary(MODE_VOCAB),
            Element::ScoreRaw | Element::ScoreMin | Element::ScoreMax => ValueType::Decimal,
            Element::ScoreScaled | Element::ScaledPassingScore => ValueType::BoundedDecimal {
                low: -SCALE,
                high: SCALE,
            },
            Element::CompletionThreshold | Element::ProgressMeasure => {
                ValueType::BoundedDecimal { low: 0, high: SCALE }
            }
            Element::SessionTime | Element::TotalTime => ValueType::Timespan,
            Element::LearnerId
            | Element::LearnerName
            | Element::Location
            | Element::SuspendData
            | Element::LaunchData => ValueType::Text,
        }
    }

    /// Successful content writes to these mark the store dirty for the
    /// local durable cache.
    pub fn persist_triggering(self) -> bool {
        matches!(
            self,
            Element::CompletionStatus
                | Element::SuccessStatus
                | Element::ScoreRaw
                | Element::ScoreMin
                | Element::ScoreMax
                | Element::ScoreScaled
                | Element::Location
                | Element::SuspendData
                | Element::Exit
                | Element::ProgressMeasure
        )
    }
}

impl From<Element> for String {
    fn from(element: Element) -> String {
        element.canonical_key().to_string()
    }
}

impl TryFrom<String> for Element {
    type Error = String;

    fn try_from(key: String) -> Result<Self, Self::Error> {
        Element::from_canonical_key(&key).ok_or_else(|| format!("unknown element {:?}", key))
    }
}

// ── Session state ──────────────────────────────────────────────────

/// Lifecycle of one content launch. `Terminated` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    NotInitialized,
    Running,
    Terminated,
}

// ── Progress snapshot ──────────────────────────────────────────────

/// Immutable copy of the progress-relevant store content, taken at
/// Commit/Terminate. Times are encoded in the session dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub dialect: Dialect,
    pub completion_status: String,
    pub success_status: String,
    pub score_raw: Option<String>,
    pub score_min: Option<String>,
    pub score_max: Option<String>,
    /// Content-set scaled score, or one derived from raw/min/max.
    pub score_scaled: Option<String>,
    pub progress_measure: Option<String>,
    /// Elapsed session time in centiseconds.
    pub elapsed_centis: u64,
    pub session_time: String,
    pub total_time: String,
    pub location: String,
    pub suspend_data: String,
    pub exit: String,
}

impl ProgressSnapshot {
    pub fn is_completed(&self) -> bool {
        self.completion_status == "completed"
    }
}
