#![forbid(unsafe_code)]

//! SCORM RTE runtime.
//!
//! Wraps the kernel surface with session timing, the commit schedule,
//! mastery policy, the local progress cache and backend synchronization.
//!
//! Data model rules live in the kernel; nothing here validates values.

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod proto_types;
pub mod proto_bridge;
pub mod progress_cache;
pub mod records;
pub mod backend;
pub mod sync;
pub mod resume;
pub mod scheduler;
pub mod session;
pub mod registry;
