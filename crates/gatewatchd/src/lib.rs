//! gatewatchd — Access-event detection daemon.
//!
//! Watches one camera feed per doorway, recognizes enrolled faces and
//! emits a deduplicated arrival or departure notification per gate.
//! Recognition math lives in `gatewatch-core`; this crate supplies the
//! provider contracts, the enrollment pipeline, the per-gate detection
//! tasks and the filesystem photo store.

pub mod config;
pub mod enroll;
pub mod gate;
pub mod notify;
pub mod providers;
pub mod store;
