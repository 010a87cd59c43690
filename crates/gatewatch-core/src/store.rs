//! Per-label descriptor store populated by the enrollment pipeline.

use crate::types::Identity;

/// Holds the enrolled descriptors, one `Identity` per unique label.
///
/// Single-writer: only the enrollment flow mutates it. Gate tasks never
/// read the store directly, they query the matcher snapshot built from it.
#[derive(Debug, Clone, Default)]
pub struct DescriptorStore {
    identities: Vec<Identity>,
}

impl DescriptorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an identity, replacing any previous entry with the same
    /// label. Re-enrollment supersedes, it never merges.
    pub fn replace(&mut self, identity: Identity) {
        if let Some(existing) = self
            .identities
            .iter_mut()
            .find(|i| i.label == identity.label)
        {
            *existing = identity;
        } else {
            self.identities.push(identity);
        }
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    pub fn labels(&self) -> Vec<&str> {
        self.identities.iter().map(|i| i.label.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    /// Total descriptors across all identities.
    pub fn descriptor_count(&self) -> usize {
        self.identities.iter().map(|i| i.descriptors.len()).sum()
    }
}
