//! Targeted correction for legacy hosts whose implementation fragments
//! are not reachable through the capability graph.
//!
//! A small set of singleton host units historically ship as an empty
//! shell whose classes live in environment-specific fragments, with no
//! provided/required capability pair connecting the two. For host
//! versions below the release that fixed this, the matching fragment
//! has to be attached manually after resolution. This is a table-driven
//! correction, not a general solver feature.

use std::collections::BTreeSet;

use provisor_version::Version;

use crate::model::{ns, TargetEnvironment};

use super::error::ResolutionError;
use super::policy::Policy;
use super::pool::{Pool, UnitId};

/// One host the correction applies to.
#[derive(Debug, Clone)]
pub struct FragmentFixEntry {
    /// Id of the affected host unit
    pub host_id: String,
    /// First host version that pulls its fragments in naturally; hosts
    /// at or above this version are left alone.
    pub fixed_in: Version,
}

/// The set of hosts the fragment fix applies to.
///
/// Injected into the resolver as immutable configuration; empty by
/// default.
#[derive(Debug, Clone, Default)]
pub struct FragmentFixTable {
    entries: Vec<FragmentFixEntry>,
}

impl FragmentFixTable {
    /// A table with no entries (the fix never applies)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add an entry for a host fixed in the given version
    pub fn entry(mut self, host_id: impl Into<String>, fixed_in: Version) -> Self {
        self.entries.push(FragmentFixEntry {
            host_id: host_id.into(),
            fixed_in,
        });
        self
    }

    pub fn entries(&self) -> &[FragmentFixEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Attach missing implementation fragments for every table entry whose
/// host is selected below its fixed version.
pub(super) fn apply(
    table: &FragmentFixTable,
    pool: &Pool,
    policy: &Policy,
    applicable: &[bool],
    selection: &mut BTreeSet<UnitId>,
    roots: &[UnitId],
    environment: &TargetEnvironment,
) -> Result<(), ResolutionError> {
    for entry in table.entries() {
        apply_entry(entry, pool, policy, applicable, selection, roots, environment)?;
    }
    Ok(())
}

fn apply_entry(
    entry: &FragmentFixEntry,
    pool: &Pool,
    policy: &Policy,
    applicable: &[bool],
    selection: &mut BTreeSet<UnitId>,
    roots: &[UnitId],
    environment: &TargetEnvironment,
) -> Result<(), ResolutionError> {
    let Some(host) = selection
        .iter()
        .filter_map(|&id| pool.unit(id))
        .find(|unit| unit.id() == entry.host_id)
    else {
        return Ok(());
    };

    if host.version() >= &entry.fixed_in {
        return Ok(());
    }

    // The host or one of its fragments being an explicit root means the
    // caller asked for this exact configuration; assume correctness.
    for &root in roots {
        let Some(unit) = pool.unit(root) else { continue };
        if unit.id() == entry.host_id {
            return Ok(());
        }
        if unit
            .capabilities()
            .iter()
            .any(|c| c.namespace == ns::FRAGMENT && c.name == entry.host_id)
        {
            return Ok(());
        }
    }

    // Already accompanied by an implementation fragment: nothing to do.
    // A selected translation fragment does not count.
    if selection
        .iter()
        .filter_map(|&id| pool.unit(id))
        .any(|unit| {
            unit.fragment_host() == Some(entry.host_id.as_str()) && !unit.is_localization_only()
        })
    {
        return Ok(());
    }

    let candidates: Vec<UnitId> = pool
        .all_unit_ids()
        .filter(|&id| applicable[id])
        .filter(|&id| {
            pool.unit(id).is_some_and(|unit| {
                unit.fragment_host() == Some(entry.host_id.as_str())
                    && !unit.is_localization_only()
            })
        })
        .collect();

    match policy.select_best(pool, &candidates) {
        Some(fragment) => {
            selection.insert(fragment);
            Ok(())
        }
        None => Err(ResolutionError::FragmentNotFound {
            host_id: entry.host_id.clone(),
            environment: environment.clone(),
        }),
    }
}
