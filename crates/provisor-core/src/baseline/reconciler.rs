use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, warn};

use crate::model::{ArtifactDescriptor, Unit};

use super::repository::{BaselineArtifact, BaselineRepository};

/// A freshly built artifact awaiting reconciliation.
#[derive(Debug, Clone)]
pub struct FreshArtifact {
    pub descriptor: ArtifactDescriptor,
    /// Where the fresh bytes were written by the build
    pub location: PathBuf,
    /// Unit metadata generated for this artifact
    pub units: Vec<Unit>,
}

/// Where a reconciled artifact's bytes and metadata come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// The freshly built artifact was kept
    Fresh,
    /// Bytes and metadata were taken from a baseline repository
    Baseline { location: String },
}

/// Outcome of reconciling one artifact.
#[derive(Debug, Clone)]
pub struct ReconciledArtifact {
    pub descriptor: ArtifactDescriptor,
    pub location: PathBuf,
    pub units: Vec<Unit>,
    pub provenance: Provenance,
}

/// Per-unit metadata equality hook.
///
/// Substituting baseline metadata for fresh metadata is only sound when
/// the two describe the same thing; implementations decide how strictly
/// that is checked.
pub trait UnitComparator {
    fn units_match(&self, fresh: &[Unit], baseline: &[Unit]) -> bool;
}

/// Structural equality: same units by id, version, singleton flag,
/// capabilities and requirements, ignoring order.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralComparator;

impl UnitComparator for StructuralComparator {
    fn units_match(&self, fresh: &[Unit], baseline: &[Unit]) -> bool {
        if fresh.len() != baseline.len() {
            return false;
        }
        let mut unmatched: Vec<&Unit> = baseline.iter().collect();
        for unit in fresh {
            match unmatched.iter().position(|candidate| *candidate == unit) {
                Some(index) => {
                    unmatched.swap_remove(index);
                }
                None => return false,
            }
        }
        true
    }
}

/// Replaces freshly built artifacts with matching baseline artifacts.
pub struct Reconciler<'a> {
    baselines: Vec<&'a dyn BaselineRepository>,
    comparator: &'a dyn UnitComparator,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler over baseline locations, queried in order.
    pub fn new(baselines: Vec<&'a dyn BaselineRepository>) -> Self {
        const STRUCTURAL: StructuralComparator = StructuralComparator;
        Self {
            baselines,
            comparator: &STRUCTURAL,
        }
    }

    /// Override the unit metadata comparator
    pub fn with_comparator(mut self, comparator: &'a dyn UnitComparator) -> Self {
        self.comparator = comparator;
        self
    }

    /// Reconcile every fresh artifact against the baselines.
    ///
    /// The result map mirrors the input keys (maven-style classifier,
    /// `None` for the main artifact) in order. This never fails:
    /// artifacts without a usable baseline are kept as built.
    pub fn reconcile(
        &self,
        fresh_artifacts: IndexMap<Option<String>, FreshArtifact>,
        target_dir: &Path,
    ) -> IndexMap<Option<String>, ReconciledArtifact> {
        fresh_artifacts
            .into_iter()
            .map(|(classifier, fresh)| {
                let reconciled = self.reconcile_one(fresh, target_dir);
                (classifier, reconciled)
            })
            .collect()
    }

    fn reconcile_one(&self, fresh: FreshArtifact, target_dir: &Path) -> ReconciledArtifact {
        for repository in &self.baselines {
            let candidates = match repository.artifacts(&fresh.descriptor.key) {
                Ok(candidates) => candidates,
                Err(error) => {
                    warn!(
                        "Skipping baseline repository {}: {error}",
                        repository.location()
                    );
                    continue;
                }
            };

            let matching = candidates
                .into_iter()
                .find(|candidate| descriptors_match(&fresh.descriptor, &candidate.descriptor));
            let Some(baseline) = matching else {
                continue;
            };

            if !self.comparator.units_match(&fresh.units, &baseline.units) {
                debug!(
                    "Baseline {} has {} but its unit metadata differs",
                    repository.location(),
                    fresh.descriptor
                );
                continue;
            }

            match self.take_from_baseline(*repository, &fresh, baseline, target_dir) {
                Ok(reconciled) => return reconciled,
                Err(error) => {
                    warn!(
                        "Could not copy {} from baseline {}: {error}",
                        fresh.descriptor,
                        repository.location()
                    );
                    continue;
                }
            }
        }

        ReconciledArtifact {
            location: fresh.location,
            descriptor: fresh.descriptor,
            units: fresh.units,
            provenance: Provenance::Fresh,
        }
    }

    fn take_from_baseline(
        &self,
        repository: &dyn BaselineRepository,
        fresh: &FreshArtifact,
        baseline: BaselineArtifact,
        target_dir: &Path,
    ) -> std::io::Result<ReconciledArtifact> {
        fs::create_dir_all(target_dir)?;
        let target = target_dir.join(file_name(fresh));
        repository
            .copy_artifact(&baseline.descriptor, &target)
            .map_err(|error| std::io::Error::other(error.to_string()))?;

        Ok(ReconciledArtifact {
            descriptor: baseline.descriptor,
            location: target,
            units: baseline.units,
            provenance: Provenance::Baseline {
                location: repository.location().to_string(),
            },
        })
    }
}

/// A baseline representation matches iff the format is equal (null-safe)
/// and the processing steps are equal element-wise.
fn descriptors_match(fresh: &ArtifactDescriptor, baseline: &ArtifactDescriptor) -> bool {
    fresh.key == baseline.key
        && fresh.format == baseline.format
        && fresh.processing_steps == baseline.processing_steps
}

fn file_name(fresh: &FreshArtifact) -> String {
    fresh
        .location
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}-{}", fresh.descriptor.key.id, fresh.descriptor.key.version))
}
