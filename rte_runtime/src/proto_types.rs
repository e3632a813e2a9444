//! Hand-written protobuf types for the local progress cache.
//!
//! Uses prost derive macros for encode/decode without prost-build.
//! Field numbers are part of the on-disk format; never renumber.

use prost::Message;

// ── Cache record ───────────────────────────────────────────────

/// One saved state of a (learner, content) pair.
#[derive(Clone, PartialEq, Message)]
pub struct ProtoCacheRecord {
    #[prost(uint64, tag = "1")]
    pub sequence: u64,
    #[prost(string, tag = "2")]
    pub learner_id: String,
    #[prost(string, tag = "3")]
    pub content_id: String,
    #[prost(message, repeated, tag = "4")]
    pub elements: Vec<ProtoElementValue>,
    /// SHA-256 of the canonical serialization of `elements`.
    #[prost(string, tag = "5")]
    pub checksum: String,
    #[prost(uint32, tag = "6")]
    pub schema_version: u32,
    #[prost(int64, tag = "7")]
    pub saved_at_ms: i64,
}

// ── Element value ──────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ProtoElementValue {
    /// Canonical element key, e.g. `cmi.location`.
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(string, tag = "2")]
    pub value: String,
}
