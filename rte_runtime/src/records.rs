//! Records pushed to the progress backend.
//!
//! Both serialize as camelCase JSON. `sequence` is per launch and shared by
//! both kinds, so the backend can keep the last-dispatched state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rte_kernel::domain::ProgressSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub raw: Option<String>,
    pub min: Option<String>,
    pub max: Option<String>,
    pub scaled: Option<String>,
}

/// Progress update, pushed on every commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub launch_id: String,
    pub sequence: u64,
    pub completion_status: String,
    pub success_status: String,
    pub score: ScoreRecord,
    pub progress_measure: Option<String>,
    pub session_time: String,
    pub total_time: String,
    pub suspend_data: String,
    pub location: String,
    pub exit: String,
    pub recorded_at: DateTime<Utc>,
}

/// Completion event, pushed once when the session terminates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub launch_id: String,
    pub sequence: u64,
    pub completed: bool,
    /// Raw score exactly as the content wrote it.
    pub final_score: Option<String>,
    pub total_time: String,
    pub status: String,
    pub success_status: String,
    pub recorded_at: DateTime<Utc>,
}

impl ProgressRecord {
    pub fn from_snapshot(
        launch_id: &str,
        sequence: u64,
        snapshot: &ProgressSnapshot,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            launch_id: launch_id.to_string(),
            sequence,
            completion_status: snapshot.completion_status.clone(),
            success_status: snapshot.success_status.clone(),
            score: ScoreRecord {
                raw: snapshot.score_raw.clone(),
                min: snapshot.score_min.clone(),
                max: snapshot.score_max.clone(),
                scaled: snapshot.score_scaled.clone(),
            },
            progress_measure: snapshot.progress_measure.clone(),
            session_time: snapshot.session_time.clone(),
            total_time: snapshot.total_time.clone(),
            suspend_data: snapshot.suspend_data.clone(),
            location: snapshot.location.clone(),
            exit: snapshot.exit.clone(),
            recorded_at,
        }
    }
}

impl CompletionRecord {
    pub fn from_snapshot(
        launch_id: &str,
        sequence: u64,
        snapshot: &ProgressSnapshot,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            launch_id: launch_id.to_string(),
            sequence,
            completed: snapshot.is_completed(),
            final_score: snapshot.score_raw.clone(),
            total_time: snapshot.total_time.clone(),
            status: snapshot.completion_status.clone(),
            success_status: snapshot.success_status.clone(),
            recorded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rte_kernel::dialect::Dialect;
    use rte_kernel::domain::Element;
    use rte_kernel::store::DataModelStore;

    #[test]
    fn completion_record_serializes_camel_case() {
        let mut store = DataModelStore::new();
        store.set(Element::ScoreRaw, "90").unwrap();
        store.set(Element::CompletionStatus, "completed").unwrap();
        let snapshot = store.snapshot(6_000, 6_000, Dialect::Current);
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        let record = CompletionRecord::from_snapshot("launch-1", 3, &snapshot, at);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["launchId"], "launch-1");
        assert_eq!(json["completed"], true);
        assert_eq!(json["finalScore"], "90");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["totalTime"], "PT1M");
        assert_eq!(json["successStatus"], "unknown");
    }

    #[test]
    fn progress_record_nests_the_score() {
        let mut store = DataModelStore::new();
        store.set(Element::ScoreRaw, "7").unwrap();
        store.set(Element::ScoreMax, "10").unwrap();
        let snapshot = store.snapshot(0, 0, Dialect::Legacy);
        let record = ProgressRecord::from_snapshot("launch-1", 1, &snapshot, Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["score"]["raw"], "7");
        assert_eq!(json["score"]["scaled"], "0.7");
        assert_eq!(json["score"]["min"], serde_json::Value::Null);
        assert_eq!(json["sessionTime"], "00:00:00");
        assert_eq!(json["completionStatus"], "unknown");
    }
}
