//! Four-part version implementation

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Empty version string")]
    Empty,
    #[error("Invalid version segment \"{segment}\" in \"{version}\"")]
    InvalidSegment { segment: String, version: String },
    #[error("Invalid qualifier \"{qualifier}\" in \"{version}\"")]
    InvalidQualifier { qualifier: String, version: String },
    #[error("Too many segments in \"{version}\"")]
    TooManySegments { version: String },
}

/// A four-part version: `major.minor.micro.qualifier`.
///
/// Missing numeric segments default to zero, a missing qualifier is the
/// empty string. Ordering is numeric on the three segments and
/// lexicographic on the qualifier, so `1.0.0` sorts below `1.0.0.beta`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub micro: u64,
    pub qualifier: String,
}

impl Version {
    /// Create a version without qualifier
    pub fn new(major: u64, minor: u64, micro: u64) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    /// Create a version with a qualifier
    pub fn with_qualifier(major: u64, minor: u64, micro: u64, qualifier: impl Into<String>) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: qualifier.into(),
        }
    }

    /// The smallest version, `0.0.0`
    pub fn zero() -> Self {
        Self::new(0, 0, 0)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionError::Empty);
        }

        let mut numeric = [0u64; 3];
        let mut qualifier = String::new();

        for (i, segment) in s.split('.').enumerate() {
            match i {
                0..=2 => {
                    numeric[i] = segment.parse().map_err(|_| VersionError::InvalidSegment {
                        segment: segment.to_string(),
                        version: s.to_string(),
                    })?;
                }
                3 => {
                    if segment.is_empty()
                        || !segment
                            .chars()
                            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
                    {
                        return Err(VersionError::InvalidQualifier {
                            qualifier: segment.to_string(),
                            version: s.to_string(),
                        });
                    }
                    qualifier = segment.to_string();
                }
                _ => {
                    return Err(VersionError::TooManySegments {
                        version: s.to_string(),
                    })
                }
            }
        }

        Ok(Self {
            major: numeric[0],
            minor: numeric[1],
            micro: numeric[2],
            qualifier,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let v: Version = "1.2.3.beta-1".parse().unwrap();
        assert_eq!(v, Version::with_qualifier(1, 2, 3, "beta-1"));
    }

    #[test]
    fn test_parse_partial() {
        assert_eq!("1".parse::<Version>().unwrap(), Version::new(1, 0, 0));
        assert_eq!("1.2".parse::<Version>().unwrap(), Version::new(1, 2, 0));
        assert_eq!("1.2.3".parse::<Version>().unwrap(), Version::new(1, 2, 3));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Version>(), Err(VersionError::Empty));
        assert!(matches!(
            "1.x".parse::<Version>(),
            Err(VersionError::InvalidSegment { .. })
        ));
        assert!(matches!(
            "1.2.3.q.extra".parse::<Version>(),
            Err(VersionError::TooManySegments { .. })
        ));
        assert!(matches!(
            "1.2.3.q!".parse::<Version>(),
            Err(VersionError::InvalidQualifier { .. })
        ));
    }

    #[test]
    fn test_ordering() {
        let parse = |s: &str| s.parse::<Version>().unwrap();
        assert!(parse("2.0.0") > parse("1.9.9"));
        assert!(parse("1.10.0") > parse("1.9.0"));
        assert!(parse("1.0.0.beta") > parse("1.0.0"));
        assert!(parse("1.0.0.b") > parse("1.0.0.a"));
        assert_eq!(parse("1.0"), parse("1.0.0"));
    }

    #[test]
    fn test_display_round_trip() {
        for s in ["0.0.0", "1.2.3", "3.104.0", "1.0.0.v20120101"] {
            let v: Version = s.parse().unwrap();
            assert_eq!(v.to_string(), s);
            assert_eq!(v.to_string().parse::<Version>().unwrap(), v);
        }
    }
}
