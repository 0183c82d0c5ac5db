use std::collections::HashMap;
use std::sync::Arc;

use provisor_version::VersionRange;

use crate::model::Unit;

/// Index of a unit within its pool.
pub type UnitId = usize;

/// Pool of all candidate units for one resolution call.
///
/// The pool indexes units by id and by provided capability for
/// efficient lookup. It is read-only for the duration of a resolve
/// call, so independent environments may be resolved in parallel
/// against the same pool.
#[derive(Debug, Default)]
pub struct Pool {
    /// All units, indexed by [`UnitId`]
    units: Vec<Arc<Unit>>,

    /// Unit ids indexed by unit identifier
    by_id: HashMap<String, Vec<UnitId>>,

    /// Unit ids indexed by provided capability (namespace, name)
    by_capability: HashMap<(String, String), Vec<UnitId>>,
}

impl Pool {
    /// Create a new empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool builder for fluent construction
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Add a unit to the pool, returning its id
    pub fn add_unit(&mut self, unit: Unit) -> UnitId {
        let id = self.units.len();

        self.by_id.entry(unit.id().to_string()).or_default().push(id);

        for capability in unit.capabilities() {
            self.by_capability
                .entry((capability.namespace.clone(), capability.name.clone()))
                .or_default()
                .push(id);
        }

        self.units.push(Arc::new(unit));
        id
    }

    /// Get a unit by its id
    pub fn unit(&self, id: UnitId) -> Option<&Arc<Unit>> {
        self.units.get(id)
    }

    /// All units with the given identifier
    pub fn units_with_id(&self, unit_id: &str) -> Vec<UnitId> {
        self.by_id.get(unit_id).cloned().unwrap_or_default()
    }

    /// All units providing a capability in the given namespace and name
    /// whose version falls in the range.
    pub fn capability_candidates(
        &self,
        namespace: &str,
        name: &str,
        range: &VersionRange,
    ) -> Vec<UnitId> {
        let Some(ids) = self
            .by_capability
            .get(&(namespace.to_string(), name.to_string()))
        else {
            return Vec::new();
        };
        ids.iter()
            .copied()
            .filter(|&id| self.units[id].provides(namespace, name, range))
            .collect()
    }

    /// Total number of units in the pool
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if the pool is empty
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// All unit ids, in insertion order
    pub fn all_unit_ids(&self) -> impl Iterator<Item = UnitId> + '_ {
        0..self.units.len()
    }
}

/// Builder for constructing a [`Pool`] from multiple sources.
pub struct PoolBuilder {
    pool: Pool,
}

impl PoolBuilder {
    /// Create a new pool builder
    pub fn new() -> Self {
        Self { pool: Pool::new() }
    }

    /// Add a unit to the pool
    pub fn add_unit(mut self, unit: Unit) -> Self {
        self.pool.add_unit(unit);
        self
    }

    /// Add multiple units
    pub fn add_units(mut self, units: impl IntoIterator<Item = Unit>) -> Self {
        for unit in units {
            self.pool.add_unit(unit);
        }
        self
    }

    /// Build the pool
    pub fn build(self) -> Pool {
        self.pool
    }
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ns, Capability};
    use provisor_version::Version;

    fn version(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_pool_add_unit() {
        let mut pool = Pool::new();
        let id = pool.add_unit(Unit::builder("org.example.core", version("1.0.0")).build());

        assert_eq!(id, 0);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.unit(id).unwrap().id(), "org.example.core");
    }

    #[test]
    fn test_units_with_id() {
        let pool = Pool::builder()
            .add_unit(Unit::builder("a", version("1.0.0")).build())
            .add_unit(Unit::builder("a", version("2.0.0")).build())
            .add_unit(Unit::builder("b", version("1.0.0")).build())
            .build();

        assert_eq!(pool.units_with_id("a").len(), 2);
        assert_eq!(pool.units_with_id("missing").len(), 0);
    }

    #[test]
    fn test_capability_candidates_respect_range() {
        let pool = Pool::builder()
            .add_unit(Unit::builder("b", version("1.0.0")).build())
            .add_unit(Unit::builder("b", version("1.5.0")).build())
            .add_unit(Unit::builder("b", version("2.0.0")).build())
            .build();

        let range: VersionRange = "[1.0,2.0)".parse().unwrap();
        let candidates = pool.capability_candidates(ns::UNIT, "b", &range);
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn test_capability_candidates_by_declared_capability() {
        let pool = Pool::builder()
            .add_unit(
                Unit::builder("impl", version("1.0.0"))
                    .capability(Capability::new("java.package", "org.example.api", version("1.0.0")))
                    .build(),
            )
            .add_unit(Unit::builder("other", version("1.0.0")).build())
            .build();

        let candidates =
            pool.capability_candidates("java.package", "org.example.api", &VersionRange::any());
        assert_eq!(candidates.len(), 1);
        assert_eq!(pool.unit(candidates[0]).unwrap().id(), "impl");
    }
}
