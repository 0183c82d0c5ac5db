//! OSGi-style versions and version ranges.
//!
//! Units carry four-part versions (`major.minor.micro.qualifier`) and
//! requirements constrain them with interval ranges (`[1.0,2.0)`). Both
//! types are totally ordered, hashable and round-trip through their
//! `Display` form.

mod range;
mod version;

pub use range::{RangeError, VersionRange};
pub use version::{Version, VersionError};
