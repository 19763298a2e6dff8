//! Three-component semantic versions.
//!
//! Host application releases and content pack bounds are compared as
//! `MAJOR.MINOR.PATCH` triples. A single leading `v` is accepted and
//! discarded, so `"v1.2.0"` and `"1.2.0"` parse to the same value.
//! Pre-release and build-metadata segments are rejected rather than
//! interpreted.
//!
//! # Examples
//!
//! ```
//! use contentpack_core::SemanticVersion;
//!
//! let a: SemanticVersion = "v1.2.0".parse().unwrap();
//! let b: SemanticVersion = "1.10.0".parse().unwrap();
//! assert!(a < b);
//! assert_eq!(a, "1.2.0".parse().unwrap());
//! assert!("1.2".parse::<SemanticVersion>().is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Version parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The input is not `MAJOR.MINOR.PATCH` with an optional leading `v`.
    #[error("invalid semantic version format: {0}")]
    InvalidFormat(String),
}

/// A `MAJOR.MINOR.PATCH` version.
///
/// Ordering is lexicographic on `(major, minor, patch)`, which the derived
/// `Ord` provides through field declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemanticVersion {
    /// Creates a version from its components.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses a version string, stripping one leading `v`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidFormat`] unless the input has exactly
    /// three dot-separated, all-digit components that fit in a `u64`.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let clean = input.strip_prefix('v').unwrap_or(input);

        let mut parts = clean.split('.');
        let (Some(major), Some(minor), Some(patch), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(VersionError::InvalidFormat(input.to_string()));
        };

        Ok(Self {
            major: parse_component(major, input)?,
            minor: parse_component(minor, input)?,
            patch: parse_component(patch, input)?,
        })
    }

    /// Returns `true` if `input` parses as a version.
    pub fn is_valid(input: &str) -> bool {
        Self::parse(input).is_ok()
    }

    /// The `MAJOR.MINOR.PATCH` form of `tag`, or `tag` unchanged when it does
    /// not parse. Use it wherever version strings are compared as keys.
    ///
    /// ```
    /// use contentpack_core::SemanticVersion;
    ///
    /// assert_eq!(SemanticVersion::canonical("v1.2.0"), "1.2.0");
    /// assert_eq!(SemanticVersion::canonical("nightly"), "nightly");
    /// ```
    pub fn canonical(tag: &str) -> String {
        Self::parse(tag).map_or_else(|_| tag.to_string(), |v| v.to_string())
    }
}

fn parse_component(part: &str, input: &str) -> Result<u64, VersionError> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VersionError::InvalidFormat(input.to_string()));
    }
    part.parse()
        .map_err(|_| VersionError::InvalidFormat(input.to_string()))
}

impl FromStr for SemanticVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Serialize for SemanticVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemanticVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
