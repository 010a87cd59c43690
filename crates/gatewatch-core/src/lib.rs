//! gatewatch-core — Recognition and deduplication core.
//!
//! Holds the pure pieces of the access-event detector: descriptor types,
//! the per-identity descriptor store, the nearest-identity matcher, the
//! enrollment session state machine and the per-gate cooldown logic.
//! Everything here is runtime-agnostic; the daemon crate supplies the
//! async plumbing around it.

pub mod cooldown;
pub mod matcher;
pub mod session;
pub mod store;
pub mod types;

pub use cooldown::CooldownState;
pub use matcher::{FaceMatcher, MatchResult, DEFAULT_MATCH_THRESHOLD, UNKNOWN_LABEL};
pub use session::{CaptureError, EnrollmentSession, MAX_PHOTOS};
pub use store::DescriptorStore;
pub use types::{BoundingBox, Descriptor, DetectedFace, Frame, Identity};
