//! Core engine for provisioning-style dependency resolution.
//!
//! Given a pool of versioned units that provide capabilities and declare
//! requirements, the engine computes per-environment unit selections,
//! corrects a known legacy gap in fragment attachment, orders artifact
//! format variants by fetch preference, reconciles freshly built
//! artifacts against a published baseline, and serializes repository
//! mutation through a shared file lock.
//!
//! # Architecture
//!
//! - [`model`]: immutable unit/capability/requirement/artifact types
//! - [`filter`]: boolean property-filter expressions over environments
//! - [`solver`]: the per-environment resolution engine
//! - [`transfer`]: artifact format preference policies
//! - [`baseline`]: reproducible-build baseline reconciliation
//! - [`lock`]: cross-process/cross-thread file locking

pub mod baseline;
pub mod filter;
pub mod lock;
pub mod model;
pub mod solver;
pub mod transfer;

pub use model::{
    ArtifactDescriptor, ArtifactKey, Capability, Requirement, TargetEnvironment, Unit, UnitKind,
};
pub use solver::{PerEnvironmentResult, Pool, ResolutionError, Resolver, RootSpec, Selection};
