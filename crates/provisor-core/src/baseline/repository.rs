use std::path::Path;

use thiserror::Error;

use crate::model::{ArtifactDescriptor, ArtifactKey, Unit};

/// Errors surfaced by a baseline repository.
///
/// The reconciler treats every repository error as "no baseline
/// available" and logs it; callers never see these as hard failures.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Baseline repository {location} is unreachable: {reason}")]
    Unreachable { location: String, reason: String },
    #[error("Artifact {descriptor} is missing from the baseline")]
    Missing { descriptor: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One artifact representation published in a baseline, together with
/// the unit metadata it was published with.
#[derive(Debug, Clone)]
pub struct BaselineArtifact {
    pub descriptor: ArtifactDescriptor,
    pub units: Vec<Unit>,
}

/// Read access to a previously published baseline.
///
/// This is the repository-read collaborator: implementations wrap
/// whatever storage the baseline lives in (a local mirror, a remote
/// index, an in-memory fixture in tests).
pub trait BaselineRepository {
    /// Human-readable location, used in log messages
    fn location(&self) -> &str;

    /// All representations of the artifact with the given key
    fn artifacts(&self, key: &ArtifactKey) -> Result<Vec<BaselineArtifact>, RepositoryError>;

    /// Copy the raw bytes of one representation to the target path
    fn copy_artifact(
        &self,
        descriptor: &ArtifactDescriptor,
        target: &Path,
    ) -> Result<(), RepositoryError>;
}
