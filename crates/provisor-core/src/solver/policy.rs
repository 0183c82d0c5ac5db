use std::cmp::Ordering;

use super::pool::{Pool, UnitId};

/// Policy for selecting between candidate units.
///
/// When multiple units can satisfy a requirement, the policy determines
/// which one is taken. The ordering is a hard determinism contract:
/// highest version first, and among equal versions the lowest
/// lexicographic id (the latter only ever applies to wholly synthetic
/// ties).
#[derive(Debug, Clone, Default)]
pub struct Policy;

impl Policy {
    /// Create a new policy
    pub fn new() -> Self {
        Self
    }

    /// Return the candidates sorted by preference (best first).
    pub fn select_preferred(&self, pool: &Pool, candidates: &[UnitId]) -> Vec<UnitId> {
        let mut sorted: Vec<_> = candidates.to_vec();

        sorted.sort_by(|&a, &b| {
            let (Some(unit_a), Some(unit_b)) = (pool.unit(a), pool.unit(b)) else {
                return a.cmp(&b);
            };
            match unit_b.version().cmp(unit_a.version()) {
                Ordering::Equal => unit_a.id().cmp(unit_b.id()),
                other => other,
            }
        });

        sorted
    }

    /// Select the single best unit from candidates
    pub fn select_best(&self, pool: &Pool, candidates: &[UnitId]) -> Option<UnitId> {
        self.select_preferred(pool, candidates).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Unit;
    use provisor_version::Version;

    fn version(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_policy_prefers_highest_version() {
        let mut pool = Pool::new();
        let id1 = pool.add_unit(Unit::builder("a", version("1.0.0")).build());
        let id2 = pool.add_unit(Unit::builder("a", version("2.0.0")).build());
        let id3 = pool.add_unit(Unit::builder("a", version("1.5.0")).build());

        let policy = Policy::new();
        let sorted = policy.select_preferred(&pool, &[id1, id2, id3]);

        assert_eq!(sorted, vec![id2, id3, id1]); // 2.0.0, 1.5.0, 1.0.0
    }

    #[test]
    fn test_policy_breaks_version_ties_by_id() {
        let mut pool = Pool::new();
        let id1 = pool.add_unit(Unit::builder("zeta", version("1.0.0")).build());
        let id2 = pool.add_unit(Unit::builder("alpha", version("1.0.0")).build());

        let policy = Policy::new();
        assert_eq!(policy.select_best(&pool, &[id1, id2]), Some(id2));
    }

    #[test]
    fn test_policy_empty_candidates() {
        let pool = Pool::new();
        let policy = Policy::new();
        assert_eq!(policy.select_best(&pool, &[]), None);
    }
}
