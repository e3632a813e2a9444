//! RTE Kernel: data model store.
//!
//! Key/value table over the canonical element vocabulary with per-element
//! access modes. Rejections return an `ErrorCode` and leave the table
//! untouched. No side effects beyond the table itself.

use std::collections::{BTreeMap, BTreeSet};

use crate::arithmetic::{format_decimal, parse_decimal, scaled_from_raw};
use crate::dialect::{encode_timespan, Dialect};
use crate::domain::{Element, ProgressSnapshot};
use crate::error_code::ErrorCode;
use crate::validation::try_validate_value;

/// Progress values of one content launch.
#[derive(Debug, Clone, Default)]
pub struct DataModelStore {
    values: BTreeMap<Element, String>,
    extensions: BTreeMap<String, String>,
    allowed_extensions: BTreeSet<String>,
    content_written: BTreeSet<Element>,
    dirty: bool,
}

impl DataModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that also accepts the listed vendor-extension keys.
    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_extensions: extensions.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Content read. Unset elements read as empty.
    pub fn get(&self, element: Element) -> Result<String, ErrorCode> {
        if !element.access_mode().readable() {
            return Err(ErrorCode::WriteOnlyElement);
        }
        Ok(self.values.get(&element).cloned().unwrap_or_default())
    }

    /// Content write: access mode first, then value type.
    pub fn set(&mut self, element: Element, value: &str) -> Result<(), ErrorCode> {
        if !element.access_mode().writable_by_content() {
            return Err(ErrorCode::ReadOnlyElement);
        }
        try_validate_value(element, value)?;

        self.values.insert(element, value.to_string());
        self.content_written.insert(element);
        if element.persist_triggering() {
            self.dirty = true;
        }
        Ok(())
    }

    /// Host or runtime write. Ignores access modes, still type-checked.
    /// Persist-triggering elements mark the store dirty as content writes do.
    /// The element no longer counts as written by content afterwards.
    pub fn host_set(&mut self, element: Element, value: &str) -> Result<(), ErrorCode> {
        try_validate_value(element, value)?;
        self.values.insert(element, value.to_string());
        self.content_written.remove(&element);
        if element.persist_triggering() {
            self.dirty = true;
        }
        Ok(())
    }

    /// Unrestricted read for snapshotting.
    pub fn raw(&self, element: Element) -> Option<&str> {
        self.values.get(&element).map(String::as_str)
    }

    pub fn get_extension(&self, key: &str) -> Result<String, ErrorCode> {
        if !self.allowed_extensions.contains(key) {
            return Err(ErrorCode::InvalidArgument);
        }
        Ok(self.extensions.get(key).cloned().unwrap_or_default())
    }

    pub fn set_extension(&mut self, key: &str, value: &str) -> Result<(), ErrorCode> {
        if !self.allowed_extensions.contains(key) {
            return Err(ErrorCode::InvalidArgument);
        }
        self.extensions.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Consume the dirty mark set by persist-triggering writes.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn was_written_by_content(&self, element: Element) -> bool {
        self.content_written.contains(&element)
    }

    /// Persist-triggering values currently set, for the local cache.
    pub fn persisted_values(&self) -> BTreeMap<Element, String> {
        self.values
            .iter()
            .filter(|(element, _)| element.persist_triggering())
            .map(|(element, value)| (*element, value.clone()))
            .collect()
    }

    /// Scaled score in fixed-point: the content's `score.scaled` when set,
    /// otherwise derived from raw/min/max (min defaults to 0).
    pub fn scaled_score(&self) -> Option<i64> {
        if let Some(scaled) = self.non_empty(Element::ScoreScaled) {
            return parse_decimal(scaled);
        }
        let raw = parse_decimal(self.non_empty(Element::ScoreRaw)?)?;
        let max = parse_decimal(self.non_empty(Element::ScoreMax)?)?;
        let min = match self.non_empty(Element::ScoreMin) {
            Some(text) => parse_decimal(text)?,
            None => 0,
        };
        scaled_from_raw(raw, min, max)
    }

    /// Capture an immutable snapshot. Times are encoded in `dialect`.
    pub fn snapshot(
        &self,
        elapsed_centis: u64,
        total_centis: u64,
        dialect: Dialect,
    ) -> ProgressSnapshot {
        let text = |element: Element| self.raw(element).unwrap_or_default().to_string();
        let optional = |element: Element| self.non_empty(element).map(str::to_string);

        let completion = match self.raw(Element::CompletionStatus) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => "unknown".to_string(),
        };
        let success = match self.raw(Element::SuccessStatus) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => "unknown".to_string(),
        };

        ProgressSnapshot {
            dialect,
            completion_status: completion,
            success_status: success,
            score_raw: optional(Element::ScoreRaw),
            score_min: optional(Element::ScoreMin),
            score_max: optional(Element::ScoreMax),
            score_scaled: self.scaled_score().map(format_decimal),
            progress_measure: optional(Element::ProgressMeasure),
            elapsed_centis,
            session_time: encode_timespan(elapsed_centis, dialect),
            total_time: encode_timespan(total_centis, dialect),
            location: text(Element::Location),
            suspend_data: text(Element::SuspendData),
            exit: text(Element::Exit),
        }
    }

    fn non_empty(&self, element: Element) -> Option<&str> {
        self.raw(element).filter(|value| !value.is_empty())
    }
}
