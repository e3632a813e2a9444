//! Proto ↔ Kernel conversion bridge.
//!
//! Converts between cache frames (proto_types.rs) and the kernel's
//! persisted value maps. A frame is only trusted if its schema version
//! matches and its checksum verifies against the decoded values.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use rte_kernel::domain::Element;
use rte_kernel::hashing::canonical_hash;
use rte_kernel::SCHEMA_VERSION;

use crate::proto_types::{ProtoCacheRecord, ProtoElementValue};

/// Build a checksummed frame for the given values.
pub fn values_to_proto(
    sequence: u64,
    learner_id: &str,
    content_id: &str,
    values: &BTreeMap<Element, String>,
    saved_at: DateTime<Utc>,
) -> ProtoCacheRecord {
    let elements = values
        .iter()
        .map(|(element, value)| ProtoElementValue {
            key: element.canonical_key().to_string(),
            value: value.clone(),
        })
        .collect();

    ProtoCacheRecord {
        sequence,
        learner_id: learner_id.to_string(),
        content_id: content_id.to_string(),
        elements,
        checksum: canonical_hash(values),
        schema_version: SCHEMA_VERSION,
        saved_at_ms: saved_at.timestamp_millis(),
    }
}

/// Decode and verify a frame. `None` if the schema, any key, or the
/// checksum does not match.
pub fn proto_to_values(record: &ProtoCacheRecord) -> Option<BTreeMap<Element, String>> {
    if record.schema_version != SCHEMA_VERSION {
        return None;
    }

    let mut values = BTreeMap::new();
    for entry in &record.elements {
        let element = Element::from_canonical_key(&entry.key)?;
        values.insert(element, entry.value.clone());
    }

    if canonical_hash(&values) != record.checksum {
        return None;
    }
    Some(values)
}

/// Frame timestamp, or the epoch if out of range.
pub fn saved_at(record: &ProtoCacheRecord) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(record.saved_at_ms).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values() -> BTreeMap<Element, String> {
        let mut values = BTreeMap::new();
        values.insert(Element::Location, "page-4".to_string());
        values.insert(Element::ScoreRaw, "72".to_string());
        values
    }

    #[test]
    fn verified_frame_yields_its_values() {
        let now = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let record = values_to_proto(3, "learner-1", "course-a", &values(), now);
        assert_eq!(record.schema_version, SCHEMA_VERSION);
        assert_eq!(proto_to_values(&record), Some(values()));
        assert_eq!(saved_at(&record), now);
    }

    #[test]
    fn tampered_frame_is_rejected() {
        let now = Utc::now();
        let mut record = values_to_proto(1, "learner-1", "course-a", &values(), now);
        record.elements[0].value = "page-5".to_string();
        assert_eq!(proto_to_values(&record), None);

        let mut record = values_to_proto(1, "learner-1", "course-a", &values(), now);
        record.schema_version = 99;
        assert_eq!(proto_to_values(&record), None);

        let mut record = values_to_proto(1, "learner-1", "course-a", &values(), now);
        record.elements[0].key = "cmi.nonsense".to_string();
        assert_eq!(proto_to_values(&record), None);
    }
}
