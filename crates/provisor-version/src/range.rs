//! Interval version ranges

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::version::{Version, VersionError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("Empty range string")]
    Empty,
    #[error("Missing ',' separator in range \"{range}\"")]
    MissingSeparator { range: String },
    #[error("Range \"{range}\" is not terminated by ']' or ')'")]
    Unterminated { range: String },
    #[error(transparent)]
    Version(#[from] VersionError),
}

/// An interval over versions, in the usual mathematical notation.
///
/// `[1.0,2.0)` includes `1.0.0` and excludes `2.0.0`. A bare version
/// `1.0` denotes the unbounded range `[1.0, ∞)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    lower: Version,
    lower_inclusive: bool,
    /// `None` means unbounded above
    upper: Option<Version>,
    upper_inclusive: bool,
}

impl VersionRange {
    /// The range matching every version, `[0.0.0, ∞)`
    pub fn any() -> Self {
        Self::at_least(Version::zero())
    }

    /// The unbounded range `[lower, ∞)`
    pub fn at_least(lower: Version) -> Self {
        Self {
            lower,
            lower_inclusive: true,
            upper: None,
            upper_inclusive: false,
        }
    }

    /// The singleton range `[version,version]`
    pub fn exact(version: Version) -> Self {
        Self {
            lower: version.clone(),
            lower_inclusive: true,
            upper: Some(version),
            upper_inclusive: true,
        }
    }

    /// A bounded interval
    pub fn between(
        lower: Version,
        lower_inclusive: bool,
        upper: Version,
        upper_inclusive: bool,
    ) -> Self {
        Self {
            lower,
            lower_inclusive,
            upper: Some(upper),
            upper_inclusive,
        }
    }

    pub fn lower(&self) -> &Version {
        &self.lower
    }

    pub fn upper(&self) -> Option<&Version> {
        self.upper.as_ref()
    }

    /// Check whether a version falls inside this range
    pub fn includes(&self, version: &Version) -> bool {
        match version.cmp(&self.lower) {
            std::cmp::Ordering::Less => return false,
            std::cmp::Ordering::Equal if !self.lower_inclusive => return false,
            _ => {}
        }
        if let Some(upper) = &self.upper {
            match version.cmp(upper) {
                std::cmp::Ordering::Greater => return false,
                std::cmp::Ordering::Equal if !self.upper_inclusive => return false,
                _ => {}
            }
        }
        true
    }
}

impl FromStr for VersionRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(RangeError::Empty);
        }

        let lower_inclusive = match s.chars().next() {
            Some('[') => true,
            Some('(') => false,
            // Bare version: unbounded above
            _ => return Ok(Self::at_least(s.parse()?)),
        };

        let upper_inclusive = match s.chars().last() {
            Some(']') => true,
            Some(')') => false,
            _ => {
                return Err(RangeError::Unterminated {
                    range: s.to_string(),
                })
            }
        };

        let inner = &s[1..s.len() - 1];
        let (low, high) = inner.split_once(',').ok_or_else(|| RangeError::MissingSeparator {
            range: s.to_string(),
        })?;

        Ok(Self {
            lower: low.trim().parse()?,
            lower_inclusive,
            upper: Some(high.trim().parse()?),
            upper_inclusive,
        })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.upper {
            None => write!(f, "{}", self.lower),
            Some(upper) => write!(
                f,
                "{}{},{}{}",
                if self.lower_inclusive { '[' } else { '(' },
                self.lower,
                upper,
                if self.upper_inclusive { ']' } else { ')' },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(s: &str) -> VersionRange {
        s.parse().unwrap()
    }

    fn version(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_interval() {
        let r = range("[1.0,2.0)");
        assert!(r.includes(&version("1.0.0")));
        assert!(r.includes(&version("1.5.0")));
        assert!(!r.includes(&version("2.0.0")));
        assert!(!r.includes(&version("0.9.0")));
    }

    #[test]
    fn test_parse_exclusive_lower() {
        let r = range("(1.0,2.0]");
        assert!(!r.includes(&version("1.0.0")));
        assert!(r.includes(&version("2.0.0")));
    }

    #[test]
    fn test_bare_version_is_unbounded() {
        let r = range("1.5");
        assert!(!r.includes(&version("1.4.9")));
        assert!(r.includes(&version("1.5.0")));
        assert!(r.includes(&version("99.0.0")));
    }

    #[test]
    fn test_any_and_exact() {
        assert!(VersionRange::any().includes(&version("0.0.0")));
        assert!(VersionRange::any().includes(&version("42.0.0")));

        let r = VersionRange::exact(version("1.2.3"));
        assert!(r.includes(&version("1.2.3")));
        assert!(!r.includes(&version("1.2.4")));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<VersionRange>(), Err(RangeError::Empty));
        assert!(matches!(
            "[1.0 2.0)".parse::<VersionRange>(),
            Err(RangeError::MissingSeparator { .. })
        ));
        assert!(matches!(
            "[1.0,2.0".parse::<VersionRange>(),
            Err(RangeError::Unterminated { .. })
        ));
    }

    #[test]
    fn test_display_round_trip() {
        for s in ["[1.0.0,2.0.0)", "(1.0.0,2.0.0]", "1.5.0"] {
            let r = range(s);
            assert_eq!(r.to_string(), s);
            assert_eq!(r.to_string().parse::<VersionRange>().unwrap(), r);
        }
    }
}
