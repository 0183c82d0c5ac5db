//! Artifact transfer preference policies.
//!
//! A repository may hold several representations of one artifact: the
//! canonical form plus derived formats such as the packed transfer
//! format. The policy only decides in which order the available
//! representations should be tried; actual transport is the caller's
//! concern.

use std::cmp::Ordering;

use crate::model::ArtifactDescriptor;

/// Format name of the compressed transfer representation.
pub const FORMAT_PACKED: &str = "packed";

/// Preference ordering over format variants of one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPolicy {
    /// Reading from a local repository: the canonical format needs no
    /// post-processing and transfer cost is irrelevant, so it always
    /// wins.
    Local,
    /// Reading from a remote repository: the packed format minimizes
    /// transfer size and wins over canonical.
    Remote,
}

impl TransferPolicy {
    /// Return the descriptors ordered most-preferred first.
    ///
    /// Duplicates (by full descriptor identity) are dropped, keeping
    /// the first occurrence. Formats beyond the named ones follow in
    /// lexicographic order to keep the result deterministic.
    pub fn order(&self, descriptors: &[ArtifactDescriptor]) -> Vec<ArtifactDescriptor> {
        let mut unique: Vec<ArtifactDescriptor> = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            if !unique.contains(descriptor) {
                unique.push(descriptor.clone());
            }
        }

        unique.sort_by(|a, b| {
            self.rank(a)
                .cmp(&self.rank(b))
                .then_with(|| compare_formats(a, b))
        });
        unique
    }

    /// Pick the single most preferred descriptor
    pub fn preferred(&self, descriptors: &[ArtifactDescriptor]) -> Option<ArtifactDescriptor> {
        self.order(descriptors).into_iter().next()
    }

    fn rank(&self, descriptor: &ArtifactDescriptor) -> u8 {
        match self {
            TransferPolicy::Local => {
                if descriptor.is_canonical() {
                    0
                } else {
                    1
                }
            }
            TransferPolicy::Remote => match descriptor.format.as_deref() {
                Some(FORMAT_PACKED) => 0,
                None => 1,
                Some(_) => 2,
            },
        }
    }
}

fn compare_formats(a: &ArtifactDescriptor, b: &ArtifactDescriptor) -> Ordering {
    a.format.cmp(&b.format)
}
