//! Nearest-identity matcher over enrolled descriptors.
//!
//! An immutable snapshot built from the descriptor store. Gates query it
//! concurrently without coordination; rebuilding after re-enrollment swaps
//! the whole snapshot rather than mutating it.

use crate::store::DescriptorStore;
use crate::types::{Descriptor, Identity};

/// Euclidean distance above which a query is reported as unknown.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.6;

/// Label reported for faces that match no enrolled identity.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Result of matching a probe descriptor against the enrolled identities.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Label of the nearest identity, `None` when the best distance is
    /// above the threshold.
    pub label: Option<String>,
    /// True minimum distance, reported even for unknown results so callers
    /// can surface it for diagnostics.
    pub distance: f32,
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        self.label.is_some()
    }

    /// Label for display purposes: the matched label or `"unknown"`.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(UNKNOWN_LABEL)
    }
}

/// Immutable matcher snapshot: identities plus a fixed distance threshold.
#[derive(Debug, Clone)]
pub struct FaceMatcher {
    identities: Vec<Identity>,
    threshold: f32,
}

impl FaceMatcher {
    /// Build a matcher from the descriptor store. Identities without any
    /// descriptor can never match and are dropped here.
    pub fn build(store: &DescriptorStore, threshold: f32) -> Self {
        let mut identities = Vec::with_capacity(store.len());
        for identity in store.identities() {
            if identity.descriptors.is_empty() {
                tracing::warn!(label = %identity.label, "identity has no descriptors; excluded from matcher");
                continue;
            }
            identities.push(identity.clone());
        }
        Self {
            identities,
            threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn labels(&self) -> Vec<&str> {
        self.identities.iter().map(|i| i.label.as_str()).collect()
    }

    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    /// Number of descriptors held for `label`, if enrolled.
    pub fn descriptor_count(&self, label: &str) -> Option<usize> {
        self.identities
            .iter()
            .find(|i| i.label == label)
            .map(|i| i.descriptors.len())
    }

    /// Classify `probe` as the nearest enrolled identity or unknown.
    ///
    /// Distance to an identity is the mean over its descriptors. The true
    /// minimum distance is always reported, even when it exceeds the
    /// threshold and the label is withheld.
    pub fn find_best_match(&self, probe: &Descriptor) -> MatchResult {
        let mut best_distance = f32::INFINITY;
        let mut best_label: Option<&str> = None;

        for identity in &self.identities {
            let distance = identity.mean_distance(probe);
            if distance < best_distance {
                best_distance = distance;
                best_label = Some(&identity.label);
            }
        }

        match best_label {
            Some(label) if best_distance <= self.threshold => MatchResult {
                label: Some(label.to_string()),
                distance: best_distance,
            },
            _ => MatchResult {
                label: None,
                distance: best_distance,
            },
        }
    }
}
