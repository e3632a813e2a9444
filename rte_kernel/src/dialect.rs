//! RTE Kernel: dialect adapter.
//!
//! Maps legacy (SCORM 1.2, `cmi.core.*`, `HH:MM:SS`) and current
//! (SCORM 2004, `cmi.*`, `PT#H#M#S`) keys and values onto the canonical
//! vocabulary. Keys with no canonical counterpart pass through unchanged.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::arithmetic::{format_decimal, parse_decimal};
use crate::domain::Element;
use crate::error_code::ErrorCode;

/// One of the two incompatible data-model generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Legacy,
    Current,
}

impl Dialect {
    /// Well-known name under which a host exposes the surface.
    pub fn api_name(self) -> &'static str {
        match self {
            Dialect::Legacy => "API",
            Dialect::Current => "API_1484_11",
        }
    }

    /// Value of `cmi._version`.
    pub fn version(self) -> &'static str {
        match self {
            Dialect::Legacy => "3.4",
            Dialect::Current => "1.0",
        }
    }
}

/// Sub-trees that answer `_children` / `_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Core,
    Score,
    StudentData,
    Interactions,
    Objectives,
}

impl Namespace {
    pub fn children(self, dialect: Dialect) -> &'static str {
        match (self, dialect) {
            (Namespace::Core, _) => {
                "student_id,student_name,lesson_location,credit,lesson_status,entry,score,total_time,lesson_mode,exit,session_time"
            }
            (Namespace::Score, Dialect::Legacy) => "raw,min,max",
            (Namespace::Score, Dialect::Current) => "scaled,raw,min,max",
            (Namespace::StudentData, _) => "mastery_score",
            (Namespace::Interactions, Dialect::Legacy) => {
                "id,objectives,time,type,correct_responses,weighting,student_response,result,latency"
            }
            (Namespace::Interactions, Dialect::Current) => {
                "id,type,objectives,timestamp,correct_responses,weighting,learner_response,result,latency,description"
            }
            (Namespace::Objectives, Dialect::Legacy) => "id,score,status",
            (Namespace::Objectives, Dialect::Current) => {
                "id,score,success_status,completion_status,progress_measure,description"
            }
        }
    }

    pub fn is_collection(self) -> bool {
        matches!(self, Namespace::Interactions | Namespace::Objectives)
    }
}

/// Result of key normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalKey {
    Element(Element),
    /// Legacy `cmi.core.lesson_status`: completion and success combined.
    LessonStatus,
    Version,
    Children(Namespace),
    /// `_children` asked of a leaf element.
    LeafChildren(String),
    Count(Namespace),
    /// `_count` asked of something that is not a collection.
    NotArray(String),
    /// Recognized namespace this run-time does not implement.
    Unimplemented(String),
    /// No canonical counterpart; passed through as a vendor extension.
    Extension(String),
}

/// Canonical writes produced by a legacy `lesson_status` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonStatusWrite {
    pub completion: &'static str,
    /// `None` resets success status to `unknown` on the host's behalf.
    pub success: Option<&'static str>,
}

/// Direction of a time conversion relative to the canonical store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeDirection {
    /// Content dialect → canonical.
    Inbound,
    /// Canonical → content dialect.
    Outbound,
}

const LEGACY_KEYS: &[(&str, Element)] = &[
    ("cmi.core.student_id", Element::LearnerId),
    ("cmi.core.student_name", Element::LearnerName),
    ("cmi.core.score.raw", Element::ScoreRaw),
    ("cmi.core.score.min", Element::ScoreMin),
    ("cmi.core.score.max", Element::ScoreMax),
    ("cmi.core.session_time", Element::SessionTime),
    ("cmi.core.total_time", Element::TotalTime),
    ("cmi.core.lesson_location", Element::Location),
    ("cmi.suspend_data", Element::SuspendData),
    ("cmi.launch_data", Element::LaunchData),
    ("cmi.core.entry", Element::Entry),
    ("cmi.core.exit", Element::Exit),
    ("cmi.core.credit", Element::Credit),
    ("cmi.core.lesson_mode", Element::Mode),
    ("cmi.student_data.mastery_score", Element::ScaledPassingScore),
];

const LEGACY_LESSON_STATUS: &str = "cmi.core.lesson_status";

const LEGACY_UNIMPLEMENTED: &[&str] = &[
    "cmi.interactions.",
    "cmi.objectives.",
    "cmi.comments",
    "cmi.student_preference.",
    "cmi.student_data.",
];

const CURRENT_UNIMPLEMENTED: &[&str] = &[
    "cmi.interactions.",
    "cmi.objectives.",
    "cmi.comments_from_learner",
    "cmi.comments_from_lms",
    "cmi.learner_preference.",
    "cmi.max_time_allowed",
    "cmi.time_limit_action",
    "adl.nav.",
];

/// Stateless translator bound to one dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectAdapter {
    dialect: Dialect,
}

impl DialectAdapter {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Map a content-supplied key onto the canonical vocabulary.
    pub fn normalize_key(&self, raw: &str) -> CanonicalKey {
        if let Some(element) = self.element_for(raw) {
            return CanonicalKey::Element(element);
        }
        if self.dialect == Dialect::Legacy && raw == LEGACY_LESSON_STATUS {
            return CanonicalKey::LessonStatus;
        }
        if raw == "cmi._version" {
            return CanonicalKey::Version;
        }

        if let Some(parent) = raw.strip_suffix("._children") {
            if let Some(ns) = self.namespace_for(parent) {
                return CanonicalKey::Children(ns);
            }
            if self.is_leaf(parent) {
                return CanonicalKey::LeafChildren(parent.to_string());
            }
        }

        if let Some(parent) = raw.strip_suffix("._count") {
            match self.namespace_for(parent) {
                Some(ns) if ns.is_collection() => return CanonicalKey::Count(ns),
                Some(_) => return CanonicalKey::NotArray(parent.to_string()),
                None if self.is_leaf(parent) => {
                    return CanonicalKey::NotArray(parent.to_string())
                }
                None => {}
            }
        }

        let unimplemented = match self.dialect {
            Dialect::Legacy => LEGACY_UNIMPLEMENTED,
            Dialect::Current => CURRENT_UNIMPLEMENTED,
        };
        if unimplemented.iter().any(|prefix| raw.starts_with(prefix)) {
            return CanonicalKey::Unimplemented(raw.to_string());
        }

        CanonicalKey::Extension(raw.to_string())
    }

    /// Convert a timespan between the content dialect and canonical form.
    /// Returns `None` if `raw` is not a valid timespan in the source form.
    pub fn normalize_time(&self, raw: &str, direction: TimeDirection) -> Option<String> {
        match direction {
            TimeDirection::Inbound => {
                let centis = decode_timespan(raw, self.dialect)?;
                Some(encode_timespan(centis, Dialect::Current))
            }
            TimeDirection::Outbound => {
                let centis = decode_timespan(raw, Dialect::Current)?;
                Some(encode_timespan(centis, self.dialect))
            }
        }
    }

    /// Translate a content-written value into its canonical form.
    pub fn inbound_value(&self, element: Element, raw: &str) -> Result<String, ErrorCode> {
        match element {
            Element::SessionTime | Element::TotalTime => self
                .normalize_time(raw, TimeDirection::Inbound)
                .ok_or(ErrorCode::IncorrectDataType),
            Element::CompletionStatus
                if self.dialect == Dialect::Current && raw == "browsed" =>
            {
                Err(ErrorCode::IncorrectDataType)
            }
            Element::Exit if self.dialect == Dialect::Legacy && raw == "normal" => {
                Err(ErrorCode::IncorrectDataType)
            }
            _ => Ok(raw.to_string()),
        }
    }

    /// Render a canonical stored value for the content dialect.
    pub fn outbound_value(&self, element: Element, stored: &str) -> String {
        match element {
            Element::SessionTime | Element::TotalTime if !stored.is_empty() => self
                .normalize_time(stored, TimeDirection::Outbound)
                .unwrap_or_default(),
            Element::CompletionStatus
                if self.dialect == Dialect::Current && stored == "browsed" =>
            {
                "incomplete".to_string()
            }
            Element::ScaledPassingScore if self.dialect == Dialect::Legacy => {
                match parse_decimal(stored).and_then(|v| v.checked_mul(100)) {
                    Some(percent) => format_decimal(percent),
                    None => String::new(),
                }
            }
            _ => stored.to_string(),
        }
    }

    /// Split a legacy `lesson_status` value into canonical writes.
    pub fn lesson_status_inbound(&self, raw: &str) -> Result<LessonStatusWrite, ErrorCode> {
        let write = match raw {
            "passed" => LessonStatusWrite {
                completion: "completed",
                success: Some("passed"),
            },
            "failed" => LessonStatusWrite {
                completion: "completed",
                success: Some("failed"),
            },
            "completed" => LessonStatusWrite {
                completion: "completed",
                success: None,
            },
            "incomplete" => LessonStatusWrite {
                completion: "incomplete",
                success: None,
            },
            "browsed" => LessonStatusWrite {
                completion: "browsed",
                success: None,
            },
            "not attempted" => LessonStatusWrite {
                completion: "not attempted",
                success: None,
            },
            _ => return Err(ErrorCode::IncorrectDataType),
        };
        Ok(write)
    }

    /// Compose completion and success status back into a `lesson_status`.
    pub fn lesson_status_outbound(completion: &str, success: &str) -> String {
        match success {
            "passed" | "failed" => success.to_string(),
            _ => match completion {
                "" | "unknown" => "not attempted".to_string(),
                other => other.to_string(),
            },
        }
    }

    fn element_for(&self, raw: &str) -> Option<Element> {
        match self.dialect {
            Dialect::Legacy => LEGACY_KEYS
                .iter()
                .find(|(key, _)| *key == raw)
                .map(|(_, element)| *element),
            Dialect::Current => Element::from_canonical_key(raw),
        }
    }

    fn namespace_for(&self, parent: &str) -> Option<Namespace> {
        match (self.dialect, parent) {
            (Dialect::Legacy, "cmi.core") => Some(Namespace::Core),
            (Dialect::Legacy, "cmi.core.score") => Some(Namespace::Score),
            (Dialect::Legacy, "cmi.student_data") => Some(Namespace::StudentData),
            (Dialect::Current, "cmi.score") => Some(Namespace::Score),
            (_, "cmi.interactions") => Some(Namespace::Interactions),
            (_, "cmi.objectives") => Some(Namespace::Objectives),
            _ => None,
        }
    }

    fn is_leaf(&self, key: &str) -> bool {
        self.element_for(key).is_some()
            || (self.dialect == Dialect::Legacy && key == LEGACY_LESSON_STATUS)
    }
}

// ---------------------------------------------------------------------------
// Timespans (centisecond resolution)
// ---------------------------------------------------------------------------

const CENTIS_PER_SECOND: u64 = 100;
const CENTIS_PER_MINUTE: u64 = 60 * CENTIS_PER_SECOND;
const CENTIS_PER_HOUR: u64 = 60 * CENTIS_PER_MINUTE;
const CENTIS_PER_DAY: u64 = 24 * CENTIS_PER_HOUR;
const LEGACY_MAX_HOURS: u64 = 9999;

/// Whole centiseconds in `duration` (sub-centisecond remainder dropped).
pub fn centis_from_duration(duration: Duration) -> u64 {
    duration.as_secs() * CENTIS_PER_SECOND + u64::from(duration.subsec_millis() / 10)
}

pub fn duration_from_centis(centis: u64) -> Duration {
    Duration::from_millis(centis * 10)
}

/// Parse a timespan in the given dialect into centiseconds.
pub fn decode_timespan(text: &str, dialect: Dialect) -> Option<u64> {
    match dialect {
        Dialect::Legacy => decode_legacy(text),
        Dialect::Current => decode_iso(text),
    }
}

/// Encode centiseconds as a timespan in the given dialect.
pub fn encode_timespan(centis: u64, dialect: Dialect) -> String {
    match dialect {
        Dialect::Legacy => encode_legacy(centis),
        Dialect::Current => encode_iso(centis),
    }
}

fn decode_legacy(text: &str) -> Option<u64> {
    let mut parts = text.split(':');
    let hours = parts.next()?;
    let minutes = parts.next()?;
    let seconds = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    if !(2..=4).contains(&hours.len()) || minutes.len() != 2 {
        return None;
    }

    let hours = parse_digits(hours)?;
    let minutes = parse_digits(minutes)?;
    let (whole, frac) = match seconds.split_once('.') {
        Some((w, f)) if !f.is_empty() && f.len() <= 2 => (w, f),
        Some(_) => return None,
        None => (seconds, ""),
    };
    if whole.len() != 2 || minutes > 59 {
        return None;
    }
    let whole = parse_digits(whole)?;
    if whole > 59 {
        return None;
    }
    let centis = parse_fraction_centis(frac)?;

    Some(hours * CENTIS_PER_HOUR + minutes * CENTIS_PER_MINUTE + whole * CENTIS_PER_SECOND + centis)
}

fn encode_legacy(centis: u64) -> String {
    let capped = centis.min((LEGACY_MAX_HOURS + 1) * CENTIS_PER_HOUR - 1);
    let hours = capped / CENTIS_PER_HOUR;
    let minutes = (capped % CENTIS_PER_HOUR) / CENTIS_PER_MINUTE;
    let seconds = (capped % CENTIS_PER_MINUTE) / CENTIS_PER_SECOND;
    let frac = capped % CENTIS_PER_SECOND;
    if frac == 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}:{:02}.{:02}", hours, minutes, seconds, frac)
    }
}

fn decode_iso(text: &str) -> Option<u64> {
    let body = text.strip_prefix('P')?;
    if body.is_empty() {
        return None;
    }
    let (date, time) = match body.split_once('T') {
        Some((_, "")) => return None,
        Some((d, t)) => (d, Some(t)),
        None => (body, None),
    };

    let mut total = 0u64;
    let mut components = 0usize;

    let date_units: [(char, u64); 3] = [
        ('Y', 365 * CENTIS_PER_DAY),
        ('M', 30 * CENTIS_PER_DAY),
        ('D', CENTIS_PER_DAY),
    ];
    let (value, count) = sum_components(date, &date_units, false)?;
    total = total.checked_add(value)?;
    components += count;

    if let Some(time) = time {
        let time_units: [(char, u64); 3] = [
            ('H', CENTIS_PER_HOUR),
            ('M', CENTIS_PER_MINUTE),
            ('S', CENTIS_PER_SECOND),
        ];
        let (value, count) = sum_components(time, &time_units, true)?;
        if count == 0 {
            return None;
        }
        total = total.checked_add(value)?;
        components += count;
    }

    if components == 0 {
        return None;
    }
    Some(total)
}

/// Sum `<number><designator>` components appearing in `units` order.
/// Only the last unit (seconds) may carry a fraction when `fraction_on_last`.
fn sum_components(
    text: &str,
    units: &[(char, u64)],
    fraction_on_last: bool,
) -> Option<(u64, usize)> {
    let mut total = 0u64;
    let mut count = 0usize;
    let mut next_unit = 0usize;
    let mut number = String::new();

    for ch in text.chars() {
        if ch.is_ascii_digit() || ch == '.' {
            number.push(ch);
            continue;
        }
        let offset = units[next_unit..].iter().position(|(d, _)| *d == ch)?;
        let unit_index = next_unit + offset;
        let (_, unit) = units[unit_index];
        let is_last = unit_index == units.len() - 1;

        let (whole, frac) = match number.split_once('.') {
            Some((w, f)) if fraction_on_last && is_last && !f.is_empty() => (w, f),
            Some(_) => return None,
            None => (number.as_str(), ""),
        };
        let whole = parse_digits(whole)?;
        let frac_centis = parse_fraction_centis(&frac[..frac.len().min(2)])?;

        total = total.checked_add(whole.checked_mul(unit)?)?;
        total = total.checked_add(frac_centis)?;
        count += 1;
        next_unit = unit_index + 1;
        number.clear();
    }

    if !number.is_empty() {
        return None;
    }
    Some((total, count))
}

fn encode_iso(centis: u64) -> String {
    let hours = centis / CENTIS_PER_HOUR;
    let minutes = (centis % CENTIS_PER_HOUR) / CENTIS_PER_MINUTE;
    let seconds = (centis % CENTIS_PER_MINUTE) / CENTIS_PER_SECOND;
    let frac = centis % CENTIS_PER_SECOND;

    let mut out = String::from("PT");
    if hours > 0 {
        out.push_str(&format!("{}H", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}M", minutes));
    }
    if frac > 0 {
        let frac_text = format!("{:02}", frac);
        out.push_str(&format!("{}.{}S", seconds, frac_text.trim_end_matches('0')));
    } else if seconds > 0 || (hours == 0 && minutes == 0) {
        out.push_str(&format!("{}S", seconds));
    }
    out
}

fn parse_digits(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// `"5"` → 50, `"05"` → 5, `""` → 0.
fn parse_fraction_centis(frac: &str) -> Option<u64> {
    match frac.len() {
        0 => Some(0),
        1 => parse_digits(frac).map(|d| d * 10),
        _ => parse_digits(&frac[..2]),
    }
}
