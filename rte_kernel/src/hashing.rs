//! RTE Kernel: canonical hashing
//!
//! Deterministic serialization + SHA-256 of persisted values and progress
//! snapshots. Used for cache frame checksums and to detect unchanged
//! scheduled commits.
//!
//! Rules:
//!   - Elements in canonical order (BTreeMap)
//!   - UTF-8 JSON, no whitespace, strings only
//!   - Snapshot fingerprints exclude every time field

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::domain::{Element, ProgressSnapshot};
use crate::SCHEMA_VERSION;

/// Canonical serialization of persisted values to UTF-8 JSON bytes.
/// `schema_version` is the first field.
pub fn canonical_serialize(values: &BTreeMap<Element, String>) -> Vec<u8> {
    let mut elements = Map::new();
    for (element, value) in values {
        elements.insert(
            element.canonical_key().to_string(),
            Value::String(value.clone()),
        );
    }

    let mut root = Map::new();
    root.insert(
        "schema_version".to_string(),
        Value::Number(SCHEMA_VERSION.into()),
    );
    root.insert("elements".to_string(), Value::Object(elements));
    Value::Object(root).to_string().into_bytes()
}

/// SHA-256 of the canonical serialization. Lowercase hex.
pub fn canonical_hash(values: &BTreeMap<Element, String>) -> String {
    hex_digest(&canonical_serialize(values))
}

/// Content fingerprint of a snapshot. Two snapshots that differ only in
/// elapsed, session or total time share a fingerprint.
pub fn snapshot_fingerprint(snapshot: &ProgressSnapshot) -> String {
    let optional = |value: &Option<String>| match value {
        Some(text) => Value::String(text.clone()),
        None => Value::Null,
    };

    let mut root = Map::new();
    root.insert(
        "completion_status".to_string(),
        Value::String(snapshot.completion_status.clone()),
    );
    root.insert(
        "success_status".to_string(),
        Value::String(snapshot.success_status.clone()),
    );
    root.insert("score_raw".to_string(), optional(&snapshot.score_raw));
    root.insert("score_min".to_string(), optional(&snapshot.score_min));
    root.insert("score_max".to_string(), optional(&snapshot.score_max));
    root.insert("score_scaled".to_string(), optional(&snapshot.score_scaled));
    root.insert(
        "progress_measure".to_string(),
        optional(&snapshot.progress_measure),
    );
    root.insert(
        "location".to_string(),
        Value::String(snapshot.location.clone()),
    );
    root.insert(
        "suspend_data".to_string(),
        Value::String(snapshot.suspend_data.clone()),
    );
    root.insert("exit".to_string(), Value::String(snapshot.exit.clone()));

    hex_digest(Value::Object(root).to_string().as_bytes())
}

fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
