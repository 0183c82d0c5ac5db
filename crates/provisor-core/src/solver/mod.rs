//! Per-environment unit resolution.
//!
//! The resolver computes, for each target environment independently, a
//! consistent selection of units satisfying a set of root requirements
//! against a read-only candidate pool.
//!
//! # Architecture
//!
//! - [`Pool`]: registry of candidate units with id and capability indexes
//! - [`Policy`]: deterministic candidate ordering (highest version first)
//! - [`Resolver`]: environment slicing, transitive expansion, singleton
//!   enforcement and the fragment-fix post-processor
//! - [`ResolutionError`]: per-environment failure reporting
//!
//! # Algorithm Overview
//!
//! 1. **Slicing**: drop units whose filter does not match the environment
//! 2. **Seeding**: resolve root ids, highest version wins
//! 3. **Expansion**: transitively satisfy mandatory requirements
//! 4. **Singleton enforcement**: merge conflicting singleton versions
//! 5. **Fragment fix**: attach known legacy implementation fragments
//!
//! Identical inputs always yield identical results; failures abort only
//! the environment they occur in.

mod error;
mod fragment_fix;
mod policy;
mod pool;
mod resolver;


pub use error::ResolutionError;
pub use fragment_fix::{FragmentFixEntry, FragmentFixTable};
pub use policy::Policy;
pub use pool::{Pool, PoolBuilder, UnitId};
pub use resolver::{PerEnvironmentResult, Resolver, RootSpec, Selection};
