use std::fmt;

use provisor_version::{Version, VersionRange};

use super::ns;

/// A `(namespace, name, version)` triple a unit provides.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Capability {
    pub namespace: String,
    pub name: String,
    pub version: Version,
}

impl Capability {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, version: Version) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version,
        }
    }
}

/// A `(namespace, name, range)` a unit needs.
///
/// The optional filter is evaluated against the environment properties;
/// an absent filter is always applicable. Optional requirements that
/// cannot be satisfied are skipped silently by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Requirement {
    pub namespace: String,
    pub name: String,
    pub range: VersionRange,
    pub filter: Option<String>,
    pub optional: bool,
}

impl Requirement {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, range: VersionRange) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            range,
            filter: None,
            optional: false,
        }
    }

    /// Requirement on another unit's self-capability
    pub fn on_unit(id: impl Into<String>, range: VersionRange) -> Self {
        Self::new(ns::UNIT, id, range)
    }

    /// Mark this requirement optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Attach an environment filter expression
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.namespace, self.name, self.range)
    }
}

/// Distinguishes plain units from fragments attaching to a host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Plain,
    Fragment { host_id: String },
}

/// A named, versioned component with provided capabilities and
/// requirements.
///
/// Units are immutable once built; the candidate pool holds them behind
/// `Arc` and only ever reads them during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Unit {
    id: String,
    version: Version,
    singleton: bool,
    kind: UnitKind,
    filter: Option<String>,
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
}

impl Unit {
    /// Start building a unit
    pub fn builder(id: impl Into<String>, version: Version) -> UnitBuilder {
        UnitBuilder::new(id, version)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    pub fn kind(&self) -> &UnitKind {
        &self.kind
    }

    /// Host id if this unit is a fragment
    pub fn fragment_host(&self) -> Option<&str> {
        match &self.kind {
            UnitKind::Fragment { host_id } => Some(host_id),
            UnitKind::Plain => None,
        }
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Check whether the unit provides a capability satisfying the triple
    pub fn provides(&self, namespace: &str, name: &str, range: &VersionRange) -> bool {
        self.capabilities
            .iter()
            .any(|c| c.namespace == namespace && c.name == name && range.includes(&c.version))
    }

    /// A fragment providing only structural and localization capabilities
    /// carries no implementation content.
    pub fn is_localization_only(&self) -> bool {
        self.capabilities
            .iter()
            .all(|c| c.namespace == ns::UNIT || c.namespace == ns::FRAGMENT || c.namespace == ns::LOCALIZATION)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// Builder for [`Unit`].
///
/// `build()` adds the implicit self-capability (namespace `unit`) and,
/// for fragments, the host-attachment capability (namespace
/// `unit.fragment`), so requirement matching needs no special casing.
pub struct UnitBuilder {
    id: String,
    version: Version,
    singleton: bool,
    kind: UnitKind,
    filter: Option<String>,
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
}

impl UnitBuilder {
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
            singleton: false,
            kind: UnitKind::Plain,
            filter: None,
            capabilities: Vec::new(),
            requirements: Vec::new(),
        }
    }

    pub fn singleton(mut self, singleton: bool) -> Self {
        self.singleton = singleton;
        self
    }

    /// Make this unit a fragment of the given host
    pub fn fragment_of(mut self, host_id: impl Into<String>) -> Self {
        self.kind = UnitKind::Fragment {
            host_id: host_id.into(),
        };
        self
    }

    /// Attach an environment filter expression to the whole unit
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn build(self) -> Unit {
        let mut capabilities = self.capabilities;
        capabilities.insert(
            0,
            Capability::new(ns::UNIT, self.id.clone(), self.version.clone()),
        );
        if let UnitKind::Fragment { host_id } = &self.kind {
            capabilities.insert(
                1,
                Capability::new(ns::FRAGMENT, host_id.clone(), self.version.clone()),
            );
        }
        Unit {
            id: self.id,
            version: self.version,
            singleton: self.singleton,
            kind: self.kind,
            filter: self.filter,
            capabilities,
            requirements: self.requirements,
        }
    }
}
