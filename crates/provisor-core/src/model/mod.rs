// Unit model for the resolution engine
//
// This module provides the immutable data types the resolver operates
// on: units with their provided capabilities and requirements, target
// environments, and artifact keys/descriptors.

mod artifact;
mod environment;
mod unit;

pub use artifact::{ArtifactDescriptor, ArtifactKey};
pub use environment::{TargetEnvironment, PROP_ARCH, PROP_OS, PROP_WS};
pub use unit::{Capability, Requirement, Unit, UnitBuilder, UnitKind};

/// Capability namespaces with structural meaning to the engine.
pub mod ns {
    /// Implicit self-capability every unit provides under its own id
    pub const UNIT: &str = "unit";
    /// Capability a fragment provides under its host id
    pub const FRAGMENT: &str = "unit.fragment";
    /// Translation-only capabilities; a fragment providing nothing else
    /// is a pure localization fragment
    pub const LOCALIZATION: &str = "localization";
}
