//! RTE Kernel: store construction.
//!
//! Builds the initial data model of a launch from the catalog's launch
//! context. Init-only elements are seeded here and nowhere else.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::arithmetic::{format_decimal, parse_decimal, SCALE};
use crate::dialect::{encode_timespan, Dialect};
use crate::domain::Element;
use crate::error_code::ErrorCode;
use crate::store::DataModelStore;

/// Per-launch configuration handed over by the course catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LaunchContext {
    pub launch_url: String,
    pub content_id: String,
    pub learner_id: String,
    pub learner_name: String,
    pub launch_data: String,
    /// `browse`, `normal` or `review`; defaults to `normal`.
    pub mode: Option<String>,
    /// `credit` or `no-credit`; defaults to `credit`.
    pub credit: Option<String>,
    /// Scaled mastery score. Values above 1 are read as percentages.
    pub mastery_score: Option<String>,
    pub completion_threshold: Option<String>,
    pub prior_total_time_centis: u64,
    /// Previously persisted values to resume from.
    pub resume: BTreeMap<Element, String>,
    pub vendor_extensions: Vec<String>,
}

impl LaunchContext {
    /// Mastery score as a scaled fixed-point value in [-1, 1].
    pub fn mastery_threshold(&self) -> Option<i64> {
        let value = parse_decimal(self.mastery_score.as_deref()?)?;
        if value > SCALE {
            Some(value / 100)
        } else {
            Some(value)
        }
    }
}

/// Create the store for a fresh launch.
///
/// Returns the offending element if a seeded or resumed value is invalid.
pub fn create_initial_store(
    launch: &LaunchContext,
) -> Result<DataModelStore, (Element, ErrorCode)> {
    let mut store = DataModelStore::with_extensions(launch.vendor_extensions.iter().cloned());

    let mut seed = |element: Element, value: &str| {
        store.host_set(element, value).map_err(|code| (element, code))
    };

    seed(Element::LearnerId, &launch.learner_id)?;
    seed(Element::LearnerName, &launch.learner_name)?;
    seed(Element::LaunchData, &launch.launch_data)?;
    seed(Element::Mode, launch.mode.as_deref().unwrap_or("normal"))?;
    seed(Element::Credit, launch.credit.as_deref().unwrap_or("credit"))?;
    seed(
        Element::TotalTime,
        &encode_timespan(launch.prior_total_time_centis, Dialect::Current),
    )?;
    if let Some(threshold) = launch.mastery_threshold() {
        seed(Element::ScaledPassingScore, &format_decimal(threshold))?;
    }
    if let Some(threshold) = &launch.completion_threshold {
        seed(Element::CompletionThreshold, threshold)?;
    }

    seed(Element::CompletionStatus, "unknown")?;
    seed(Element::SuccessStatus, "unknown")?;
    for (element, value) in &launch.resume {
        seed(*element, value)?;
    }
    let entry = if launch.resume.is_empty() {
        "ab-initio"
    } else {
        "resume"
    };
    seed(Element::Entry, entry)?;

    store.take_dirty();
    Ok(store)
}
