//! Boolean property-filter expressions.
//!
//! Filters restrict units and requirements to matching environments.
//! The syntax is the parenthesized prefix form used by the original
//! platform metadata: `(key=value)` assertions combined with `&`, `|`
//! and `!`, e.g. `(&(osgi.os=linux)(osgi.arch=x86_64))`.
//!
//! A missing property makes the assertion false, never an error. A
//! filter that fails to parse makes its owner inapplicable; resolution
//! itself is not aborted.

use std::collections::BTreeMap;
use std::str::FromStr;

use log::warn;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Unexpected end of filter expression")]
    UnexpectedEnd,
    #[error("Unexpected character '{found}' at position {position}, expected {expected}")]
    UnexpectedChar {
        found: char,
        position: usize,
        expected: &'static str,
    },
    #[error("Empty key in assertion at position {position}")]
    EmptyKey { position: usize },
    #[error("Trailing input after filter expression at position {position}")]
    TrailingInput { position: usize },
}

/// A parsed filter expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// String-equality assertion on one property
    Equals { key: String, value: String },
}

impl Filter {
    /// Parse a filter expression
    pub fn parse(input: &str) -> Result<Self, FilterError> {
        let mut parser = Parser::new(input);
        parser.skip_whitespace();
        let filter = parser.parse_filter()?;
        parser.skip_whitespace();
        if !parser.at_end() {
            return Err(FilterError::TrailingInput {
                position: parser.position,
            });
        }
        Ok(filter)
    }

    /// Evaluate this filter against a property map
    pub fn matches(&self, properties: &BTreeMap<String, String>) -> bool {
        match self {
            Filter::And(operands) => operands.iter().all(|f| f.matches(properties)),
            Filter::Or(operands) => operands.iter().any(|f| f.matches(properties)),
            Filter::Not(operand) => !operand.matches(properties),
            Filter::Equals { key, value } => {
                properties.get(key).map(|v| v == value).unwrap_or(false)
            }
        }
    }
}

impl FromStr for Filter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Filter::parse(s)
    }
}

/// Evaluate an optional filter string the way the resolver does.
///
/// Absent filter always matches; an unparseable filter never matches
/// and is reported with a warning.
pub fn matches_filter(filter: Option<&str>, properties: &BTreeMap<String, String>) -> bool {
    match filter {
        None => true,
        Some(expression) => match Filter::parse(expression) {
            Ok(filter) => filter.matches(properties),
            Err(error) => {
                warn!("Ignoring owner of invalid filter \"{expression}\": {error}");
                false
            }
        },
    }
}

/// Hand-written recursive-descent parser over the raw bytes.
struct Parser<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            position: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.position += 1;
        }
    }

    fn expect(&mut self, expected: u8, description: &'static str) -> Result<(), FilterError> {
        match self.peek() {
            None => Err(FilterError::UnexpectedEnd),
            Some(b) if b == expected => {
                self.position += 1;
                Ok(())
            }
            Some(b) => Err(FilterError::UnexpectedChar {
                found: b as char,
                position: self.position,
                expected: description,
            }),
        }
    }

    /// filter := '(' ( '&' filter+ | '|' filter+ | '!' filter | key '=' value ) ')'
    fn parse_filter(&mut self) -> Result<Filter, FilterError> {
        self.expect(b'(', "'('")?;
        self.skip_whitespace();

        let filter = match self.peek() {
            None => return Err(FilterError::UnexpectedEnd),
            Some(b'&') => {
                self.position += 1;
                Filter::And(self.parse_operands()?)
            }
            Some(b'|') => {
                self.position += 1;
                Filter::Or(self.parse_operands()?)
            }
            Some(b'!') => {
                self.position += 1;
                self.skip_whitespace();
                Filter::Not(Box::new(self.parse_filter()?))
            }
            Some(_) => self.parse_assertion()?,
        };

        self.skip_whitespace();
        self.expect(b')', "')'")?;
        Ok(filter)
    }

    /// One or more parenthesized operands of an '&' or '|'
    fn parse_operands(&mut self) -> Result<Vec<Filter>, FilterError> {
        let mut operands = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'(') => operands.push(self.parse_filter()?),
                Some(b')') if !operands.is_empty() => return Ok(operands),
                Some(b) => {
                    return Err(FilterError::UnexpectedChar {
                        found: b as char,
                        position: self.position,
                        expected: "'('",
                    })
                }
                None => return Err(FilterError::UnexpectedEnd),
            }
        }
    }

    /// key '=' value, both taken verbatim up to the structural characters
    fn parse_assertion(&mut self) -> Result<Filter, FilterError> {
        let key_start = self.position;
        while let Some(b) = self.peek() {
            if b == b'=' || b == b'(' || b == b')' {
                break;
            }
            self.position += 1;
        }
        let key = self.slice(key_start, self.position).trim().to_string();
        if key.is_empty() {
            return Err(FilterError::EmptyKey {
                position: key_start,
            });
        }
        self.expect(b'=', "'='")?;

        let value_start = self.position;
        while let Some(b) = self.peek() {
            if b == b'(' || b == b')' {
                break;
            }
            self.position += 1;
        }
        let value = self.slice(value_start, self.position).trim().to_string();

        Ok(Filter::Equals { key, value })
    }

    fn slice(&self, start: usize, end: usize) -> &str {
        // The parser only splits on ASCII structural characters, so the
        // boundaries always fall on UTF-8 character boundaries.
        std::str::from_utf8(&self.input[start..end]).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_simple_assertion() {
        let filter = Filter::parse("(osgi.os=linux)").unwrap();
        assert!(filter.matches(&props(&[("osgi.os", "linux")])));
        assert!(!filter.matches(&props(&[("osgi.os", "win32")])));
    }

    #[test]
    fn test_missing_property_is_false() {
        let filter = Filter::parse("(osgi.os=linux)").unwrap();
        assert!(!filter.matches(&props(&[])));
    }

    #[test]
    fn test_and() {
        let filter = Filter::parse("(&(osgi.os=linux)(osgi.arch=x86_64))").unwrap();
        assert!(filter.matches(&props(&[("osgi.os", "linux"), ("osgi.arch", "x86_64")])));
        assert!(!filter.matches(&props(&[("osgi.os", "linux"), ("osgi.arch", "aarch64")])));
    }

    #[test]
    fn test_or() {
        let filter = Filter::parse("(|(osgi.os=linux)(osgi.os=macosx))").unwrap();
        assert!(filter.matches(&props(&[("osgi.os", "macosx")])));
        assert!(!filter.matches(&props(&[("osgi.os", "win32")])));
    }

    #[test]
    fn test_not() {
        let filter = Filter::parse("(!(osgi.os=win32))").unwrap();
        assert!(filter.matches(&props(&[("osgi.os", "linux")])));
        assert!(!filter.matches(&props(&[("osgi.os", "win32")])));
        // Negation of a missing property is true
        assert!(filter.matches(&props(&[])));
    }

    #[test]
    fn test_nested() {
        let filter =
            Filter::parse("(&(|(osgi.os=linux)(osgi.os=macosx))(!(osgi.arch=ppc64)))").unwrap();
        assert!(filter.matches(&props(&[("osgi.os", "linux"), ("osgi.arch", "x86_64")])));
        assert!(!filter.matches(&props(&[("osgi.os", "linux"), ("osgi.arch", "ppc64")])));
        assert!(!filter.matches(&props(&[("osgi.os", "win32"), ("osgi.arch", "x86_64")])));
    }

    #[test]
    fn test_whitespace_tolerated() {
        let filter = Filter::parse(" ( & (osgi.os = linux) (osgi.ws = gtk) ) ").unwrap();
        assert!(filter.matches(&props(&[("osgi.os", "linux"), ("osgi.ws", "gtk")])));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Filter::parse("(osgi.os=linux"), Err(FilterError::UnexpectedEnd));
        assert!(matches!(
            Filter::parse("(osgi.os=linux))"),
            Err(FilterError::TrailingInput { .. })
        ));
        assert!(matches!(
            Filter::parse("(=linux)"),
            Err(FilterError::EmptyKey { .. })
        ));
        assert!(matches!(
            Filter::parse("(&)"),
            Err(FilterError::UnexpectedChar { .. })
        ));
        assert!(matches!(
            Filter::parse("osgi.os=linux"),
            Err(FilterError::UnexpectedChar { .. })
        ));
    }

    #[test]
    fn test_matches_filter_helper() {
        let properties = props(&[("osgi.os", "linux")]);
        assert!(matches_filter(None, &properties));
        assert!(matches_filter(Some("(osgi.os=linux)"), &properties));
        assert!(!matches_filter(Some("(osgi.os=win32)"), &properties));
        // Unparseable filter makes the owner inapplicable, not an error
        assert!(!matches_filter(Some("(((broken"), &properties));
    }
}
