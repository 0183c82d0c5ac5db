use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use indexmap::IndexMap;
use log::debug;

use provisor_version::{Version, VersionRange};

use crate::filter::matches_filter;
use crate::model::{ns, Requirement, TargetEnvironment, Unit};

use super::error::ResolutionError;
use super::fragment_fix::{self, FragmentFixTable};
use super::policy::Policy;
use super::pool::{Pool, UnitId};

/// One root request: a unit id with an optional exact version hint.
///
/// Without a hint the highest available version wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootSpec {
    pub id: String,
    pub version: Option<Version>,
}

impl RootSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: None,
        }
    }

    pub fn with_version(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version: Some(version),
        }
    }

    fn range(&self) -> VersionRange {
        self.version
            .clone()
            .map(VersionRange::exact)
            .unwrap_or_else(VersionRange::any)
    }
}

/// The units selected for one environment, ordered by id then version.
pub type Selection = Vec<Arc<Unit>>;

/// Resolution outcome per environment, in request order.
pub type PerEnvironmentResult = IndexMap<TargetEnvironment, Result<Selection, ResolutionError>>;

/// The per-environment resolution engine.
///
/// Holds a read-only candidate pool, the candidate ordering policy and
/// the injected fragment-fix table. One resolver may serve any number
/// of resolve calls; it never mutates the pool.
pub struct Resolver<'a> {
    pool: &'a Pool,
    policy: Policy,
    fragment_fixes: FragmentFixTable,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over a candidate pool
    pub fn new(pool: &'a Pool) -> Self {
        Self {
            pool,
            policy: Policy::new(),
            fragment_fixes: FragmentFixTable::empty(),
        }
    }

    /// Inject the fragment-fix table
    pub fn with_fragment_fixes(mut self, table: FragmentFixTable) -> Self {
        self.fragment_fixes = table;
        self
    }

    /// Resolve the root requests for every environment independently.
    ///
    /// A failing environment yields its own `Err` entry; sibling
    /// environments are unaffected. Identical inputs always yield
    /// identical results.
    pub fn resolve(
        &self,
        roots: &[RootSpec],
        environments: &[TargetEnvironment],
        extra_properties: &BTreeMap<String, String>,
    ) -> PerEnvironmentResult {
        environments
            .iter()
            .map(|environment| {
                let result = self.resolve_one(roots, environment, extra_properties);
                if let Err(error) = &result {
                    debug!("Resolution failed for {environment}: {error}");
                }
                (environment.clone(), result)
            })
            .collect()
    }

    /// Resolve for a single environment.
    pub fn resolve_one(
        &self,
        roots: &[RootSpec],
        environment: &TargetEnvironment,
        extra_properties: &BTreeMap<String, String>,
    ) -> Result<Selection, ResolutionError> {
        let properties = environment.properties(extra_properties);

        // Slice the pool down to units applicable in this environment.
        let applicable: Vec<bool> = self
            .pool
            .all_unit_ids()
            .map(|id| {
                self.pool
                    .unit(id)
                    .is_some_and(|unit| matches_filter(unit.filter(), &properties))
            })
            .collect();

        let mut state = ResolutionState {
            pool: self.pool,
            policy: &self.policy,
            applicable,
            properties,
            selection: BTreeSet::new(),
            demands: HashMap::new(),
            queue: VecDeque::new(),
            roots: Vec::new(),
        };

        state.seed(roots)?;

        // Alternate expansion and singleton enforcement until stable:
        // merged singleton versions bring their own requirements.
        loop {
            state.expand()?;
            if !state.enforce_singletons()? {
                break;
            }
        }

        fragment_fix::apply(
            &self.fragment_fixes,
            self.pool,
            &self.policy,
            &state.applicable,
            &mut state.selection,
            &state.roots,
            environment,
        )?;

        let mut result: Selection = state
            .selection
            .iter()
            .filter_map(|&id| self.pool.unit(id).cloned())
            .collect();
        result.sort_by(|a, b| {
            a.id()
                .cmp(b.id())
                .then_with(|| a.version().cmp(b.version()))
        });
        Ok(result)
    }
}

/// Working state of one environment's resolution.
struct ResolutionState<'a> {
    pool: &'a Pool,
    policy: &'a Policy,
    /// Per unit: does its filter match the environment
    applicable: Vec<bool>,
    properties: BTreeMap<String, String>,
    selection: BTreeSet<UnitId>,
    /// Requirements each provider id was chosen for, keyed by the
    /// provider's unit id. Consulted during singleton enforcement.
    demands: HashMap<String, Vec<Requirement>>,
    queue: VecDeque<UnitId>,
    /// Units the roots resolved to
    roots: Vec<UnitId>,
}

impl ResolutionState<'_> {
    /// Seed the working set with the root units.
    fn seed(&mut self, roots: &[RootSpec]) -> Result<(), ResolutionError> {
        for root in roots {
            let range = root.range();
            let candidates: Vec<UnitId> = self
                .pool
                .units_with_id(&root.id)
                .into_iter()
                .filter(|&id| self.applicable[id])
                .filter(|&id| {
                    self.pool
                        .unit(id)
                        .is_some_and(|unit| range.includes(unit.version()))
                })
                .collect();

            let Some(best) = self.policy.select_best(self.pool, &candidates) else {
                return Err(ResolutionError::UnresolvedRequirement {
                    unit_id: root.id.clone(),
                    namespace: ns::UNIT.to_string(),
                    name: root.id.clone(),
                    range,
                });
            };

            self.roots.push(best);
            self.record_demand(best, Requirement::on_unit(root.id.clone(), range));
            self.select(best);
        }
        Ok(())
    }

    /// Transitively satisfy the mandatory requirements of every queued
    /// unit.
    fn expand(&mut self) -> Result<(), ResolutionError> {
        while let Some(id) = self.queue.pop_front() {
            let Some(unit) = self.pool.unit(id).cloned() else {
                continue;
            };
            for requirement in unit.requirements() {
                if !matches_filter(requirement.filter.as_deref(), &self.properties) {
                    continue;
                }
                self.satisfy(&unit, requirement)?;
            }
        }
        Ok(())
    }

    /// Satisfy one applicable requirement of a selected unit.
    fn satisfy(&mut self, owner: &Unit, requirement: &Requirement) -> Result<(), ResolutionError> {
        // Prefer a provider that is already part of the selection.
        let selected_providers: Vec<UnitId> = self
            .selection
            .iter()
            .copied()
            .filter(|&id| {
                self.pool.unit(id).is_some_and(|unit| {
                    unit.provides(&requirement.namespace, &requirement.name, &requirement.range)
                })
            })
            .collect();
        if let Some(provider) = self.policy.select_best(self.pool, &selected_providers) {
            self.record_demand(provider, requirement.clone());
            return Ok(());
        }

        let candidates: Vec<UnitId> = self
            .pool
            .capability_candidates(&requirement.namespace, &requirement.name, &requirement.range)
            .into_iter()
            .filter(|&id| self.applicable[id])
            .collect();

        match self.policy.select_best(self.pool, &candidates) {
            Some(best) => {
                self.record_demand(best, requirement.clone());
                self.select(best);
                Ok(())
            }
            None if requirement.optional => {
                debug!("No candidate for optional requirement {requirement} of {owner}");
                Ok(())
            }
            None => Err(ResolutionError::UnresolvedRequirement {
                unit_id: owner.id().to_string(),
                namespace: requirement.namespace.clone(),
                name: requirement.name.clone(),
                range: requirement.range.clone(),
            }),
        }
    }

    /// Enforce the singleton invariant over the current selection.
    ///
    /// Returns whether the selection changed; changed selections need
    /// another expansion pass for the merged unit's requirements.
    fn enforce_singletons(&mut self) -> Result<bool, ResolutionError> {
        let mut by_unit_id: BTreeMap<&str, Vec<UnitId>> = BTreeMap::new();
        for &id in &self.selection {
            if let Some(unit) = self.pool.unit(id) {
                by_unit_id.entry(unit.id()).or_default().push(id);
            }
        }

        let mut changed = false;
        for (unit_id, ids) in by_unit_id {
            if ids.len() < 2 {
                continue;
            }
            let any_singleton = ids.iter().any(|&id| {
                self.pool
                    .unit(id)
                    .is_some_and(|unit| unit.is_singleton())
            });
            if !any_singleton {
                continue;
            }

            // One version has to satisfy every range that demanded this
            // id; the whole pool is searched so a middle version wins
            // even when none of the currently selected ones fits.
            let demanded = self.demands.get(unit_id).cloned().unwrap_or_default();
            let candidates: Vec<UnitId> = self
                .pool
                .units_with_id(unit_id)
                .into_iter()
                .filter(|&id| self.applicable[id])
                .filter(|&id| {
                    self.pool.unit(id).is_some_and(|unit| {
                        demanded
                            .iter()
                            .all(|r| unit.provides(&r.namespace, &r.name, &r.range))
                    })
                })
                .collect();

            let Some(best) = self.policy.select_best(self.pool, &candidates) else {
                let mut versions: Vec<Version> = ids
                    .iter()
                    .filter_map(|&id| self.pool.unit(id).map(|unit| unit.version().clone()))
                    .collect();
                versions.sort();
                return Err(ResolutionError::SingletonConflict {
                    id: unit_id.to_string(),
                    candidate_versions: versions,
                });
            };

            for &id in &ids {
                if id != best && self.selection.remove(&id) {
                    changed = true;
                }
            }
            if self.select(best) {
                changed = true;
            }
        }
        Ok(changed)
    }

    fn record_demand(&mut self, provider: UnitId, requirement: Requirement) {
        if let Some(unit) = self.pool.unit(provider) {
            self.demands
                .entry(unit.id().to_string())
                .or_default()
                .push(requirement);
        }
    }

    fn select(&mut self, id: UnitId) -> bool {
        if self.selection.insert(id) {
            self.queue.push_back(id);
            true
        } else {
            false
        }
    }
}
