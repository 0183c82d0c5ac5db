use provisor_version::{Version, VersionRange};
use thiserror::Error;

use crate::model::TargetEnvironment;

/// Why one environment's resolution failed.
///
/// Errors are reported per environment; sibling environments resolve
/// independently and are unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// A mandatory requirement has no satisfying candidate in the
    /// filtered pool.
    #[error("Unit {unit_id} requires {namespace}/{name} {range} but no candidate satisfies it")]
    UnresolvedRequirement {
        /// The requiring unit (the root id itself for root requests)
        unit_id: String,
        namespace: String,
        name: String,
        range: VersionRange,
    },

    /// Several versions of a singleton id are demanded and no single
    /// version satisfies every range that demanded it.
    #[error("Singleton {id} is demanded in incompatible versions: {}", join_versions(.candidate_versions))]
    SingletonConflict {
        id: String,
        candidate_versions: Vec<Version>,
    },

    /// The fragment fix applies to a selected host but no matching
    /// implementation fragment exists for the environment.
    #[error("Could not determine an implementation fragment of {host_id} for environment {environment}")]
    FragmentNotFound {
        host_id: String,
        environment: TargetEnvironment,
    },
}

fn join_versions(versions: &[Version]) -> String {
    versions
        .iter()
        .map(Version::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
