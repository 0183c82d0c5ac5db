//! Baseline reconciliation for reproducible builds.
//!
//! A rebuild of unchanged sources should publish byte-identical
//! artifacts. The reconciler compares freshly built artifacts against
//! one or more previously published baseline repositories and, where a
//! baseline representation matches, substitutes the baseline bytes and
//! unit metadata for the fresh ones. Reconciliation never fails hard:
//! unreachable repositories and missing baseline artifacts simply leave
//! the fresh artifact in place.

mod reconciler;
mod repository;

pub use reconciler::{
    FreshArtifact, Provenance, ReconciledArtifact, Reconciler, StructuralComparator,
    UnitComparator,
};
pub use repository::{BaselineArtifact, BaselineRepository, RepositoryError};
