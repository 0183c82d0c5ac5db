use std::collections::BTreeMap;
use std::fmt;

/// Property key for the operating system segment
pub const PROP_OS: &str = "osgi.os";
/// Property key for the windowing system segment
pub const PROP_WS: &str = "osgi.ws";
/// Property key for the processor architecture segment
pub const PROP_ARCH: &str = "osgi.arch";

/// One deployment environment, identified by an os/ws/arch triple.
///
/// Created once per resolution request and never mutated. The triple is
/// exposed to filter expressions as the `osgi.os`/`osgi.ws`/`osgi.arch`
/// properties, merged with any caller-supplied extra properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetEnvironment {
    os: String,
    ws: String,
    arch: String,
}

impl TargetEnvironment {
    pub fn new(os: impl Into<String>, ws: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            ws: ws.into(),
            arch: arch.into(),
        }
    }

    pub fn os(&self) -> &str {
        &self.os
    }

    pub fn ws(&self) -> &str {
        &self.ws
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// The property map filter expressions are evaluated against.
    ///
    /// Extra properties are merged in first, so the environment triple
    /// always wins on key collisions.
    pub fn properties(&self, extra: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut props = extra.clone();
        props.insert(PROP_OS.to_string(), self.os.clone());
        props.insert(PROP_WS.to_string(), self.ws.clone());
        props.insert(PROP_ARCH.to_string(), self.arch.clone());
        props
    }
}

impl fmt::Display for TargetEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.os, self.ws, self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_contain_triple() {
        let env = TargetEnvironment::new("linux", "gtk", "x86_64");
        let props = env.properties(&BTreeMap::new());
        assert_eq!(props.get(PROP_OS).map(String::as_str), Some("linux"));
        assert_eq!(props.get(PROP_WS).map(String::as_str), Some("gtk"));
        assert_eq!(props.get(PROP_ARCH).map(String::as_str), Some("x86_64"));
    }

    #[test]
    fn test_extra_properties_do_not_override_triple() {
        let env = TargetEnvironment::new("linux", "gtk", "x86_64");
        let mut extra = BTreeMap::new();
        extra.insert(PROP_OS.to_string(), "win32".to_string());
        extra.insert("org.eclipse.update.install.features".to_string(), "true".to_string());

        let props = env.properties(&extra);
        assert_eq!(props.get(PROP_OS).map(String::as_str), Some("linux"));
        assert_eq!(
            props.get("org.eclipse.update.install.features").map(String::as_str),
            Some("true")
        );
    }

    #[test]
    fn test_display() {
        let env = TargetEnvironment::new("win32", "win32", "aarch64");
        assert_eq!(env.to_string(), "win32/win32/aarch64");
    }
}
