#![forbid(unsafe_code)]

//! SCORM RTE kernel.
//!
//! Data model, dialect adapter, the sixteen RTE functions and host
//! discovery. Deterministic: no I/O, no clocks, no async. Anything that
//! touches time, disk or network hangs off `SurfaceObserver`.

/// Version of the persisted value layout (cache frames, checksums).
/// Frames written under another version are not resumed from.
pub const SCHEMA_VERSION: u32 = 1;

pub mod arithmetic;
pub mod error_code;
pub mod domain;
pub mod dialect;
pub mod validation;
pub mod store;
pub mod state;
pub mod surface;
pub mod discovery;
pub mod hashing;
pub mod script;
