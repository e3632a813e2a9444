//! Resume orchestrator: decide what a new launch starts from.
//!
//! The newest verified cache frame wins over resume state supplied by the
//! backend. A cached attempt that ended with a finishing exit starts over.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use rte_kernel::domain::Element;
use rte_kernel::state::LaunchContext;
use rte_kernel::validation::try_validate_all;

use crate::progress_cache::CacheJournal;

/// Exit values that end an attempt for good.
pub const FINISHING_EXITS: [&str; 3] = ["normal", "logout", "time-out"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeSource {
    /// Restored from the local cache frame with this sequence.
    Cache { sequence: u64 },
    /// Restored from values in the launch context.
    Launch,
    /// Fresh attempt.
    Fresh,
}

/// Fill `launch.resume` from the best available source.
pub fn prepare_launch(
    mut launch: LaunchContext,
    journal: Option<&CacheJournal>,
) -> (LaunchContext, ResumeSource) {
    let cached = match journal.map(CacheJournal::load_latest).transpose() {
        Ok(cached) => cached.flatten(),
        Err(e) => {
            warn!("Failed to read progress cache, ignoring it: {}", e);
            None
        }
    };

    let source = match cached {
        Some(cached) if is_finished(&cached.values) => {
            debug!(sequence = cached.sequence, "cached attempt finished; starting fresh");
            launch.resume.clear();
            ResumeSource::Fresh
        }
        Some(cached) => {
            launch.resume = cached.values;
            ResumeSource::Cache {
                sequence: cached.sequence,
            }
        }
        None if launch.resume.is_empty() => ResumeSource::Fresh,
        None => match try_validate_all(&launch.resume) {
            Ok(()) => ResumeSource::Launch,
            Err((element, code)) => {
                warn!(?element, %code, "launch resume state rejected; starting fresh");
                launch.resume.clear();
                ResumeSource::Fresh
            }
        },
    };

    strip_session_scoped(&mut launch.resume);
    if launch.resume.is_empty() && source != ResumeSource::Fresh {
        return (launch, ResumeSource::Fresh);
    }
    (launch, source)
}

fn is_finished(values: &BTreeMap<Element, String>) -> bool {
    values
        .get(&Element::Exit)
        .is_some_and(|exit| FINISHING_EXITS.contains(&exit.as_str()))
}

/// Values that belong to one session only and are never carried over.
fn strip_session_scoped(values: &mut BTreeMap<Element, String>) {
    values.retain(|element, _| {
        element.persist_triggering() && !matches!(element, Element::Exit)
    });
}
