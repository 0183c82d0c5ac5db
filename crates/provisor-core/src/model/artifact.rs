use std::fmt;

use provisor_version::Version;

/// Identity of one artifact: classifier (artifact type), id and version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub classifier: String,
    pub id: String,
    pub version: Version,
}

impl ArtifactKey {
    pub fn new(classifier: impl Into<String>, id: impl Into<String>, version: Version) -> Self {
        Self {
            classifier: classifier.into(),
            id: id.into(),
            version,
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.classifier, self.id, self.version)
    }
}

/// One concrete representation of an artifact.
///
/// `format == None` is the canonical representation; other formats
/// (e.g. the packed transfer format) are derived from it by the ordered
/// processing steps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactDescriptor {
    pub key: ArtifactKey,
    pub format: Option<String>,
    pub processing_steps: Vec<String>,
}

impl ArtifactDescriptor {
    /// The canonical (directly usable) representation of an artifact
    pub fn canonical(key: ArtifactKey) -> Self {
        Self {
            key,
            format: None,
            processing_steps: Vec::new(),
        }
    }

    /// A non-canonical representation in the given format
    pub fn in_format(key: ArtifactKey, format: impl Into<String>, steps: Vec<String>) -> Self {
        Self {
            key,
            format: Some(format.into()),
            processing_steps: steps,
        }
    }

    pub fn is_canonical(&self) -> bool {
        self.format.is_none()
    }
}

impl fmt::Display for ArtifactDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.format {
            Some(format) => write!(f, "{} ({})", self.key, format),
            None => write!(f, "{} (canonical)", self.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical() {
        let key = ArtifactKey::new("osgi.bundle", "org.example.core", "1.0.0".parse().unwrap());
        let descriptor = ArtifactDescriptor::canonical(key.clone());
        assert!(descriptor.is_canonical());
        assert_eq!(descriptor.key, key);

        let packed = ArtifactDescriptor::in_format(key, "packed", vec!["unpack".to_string()]);
        assert!(!packed.is_canonical());
    }
}
