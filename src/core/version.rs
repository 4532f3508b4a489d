//! Four-part engine version parsing and ordering.
//!
//! MSBuild and Visual Studio report versions as up to four dot-separated
//! numeric parts (`17.7`, `17.6.9.9`, `17.8.3.51904`). Ordering is plain
//! lexicographic comparison over the (major, minor, patch, build) tuple,
//! which the derived `Ord` provides field by field.

use std::fmt;
use std::str::FromStr;

use crate::core::errors::BootstrapError;

/// A resolved (major, minor, patch, build) version.
///
/// Parsing pads missing trailing parts with zero, so `"17.7"` equals
/// `"17.7.0.0"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub build: u32,
}

impl EngineVersion {
    /// Create a version from explicit parts.
    pub fn new(major: u32, minor: u32, patch: u32, build: u32) -> Self {
        EngineVersion {
            major,
            minor,
            patch,
            build,
        }
    }
}

impl FromStr for EngineVersion {
    type Err = BootstrapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || BootstrapError::MalformedVersion {
            input: s.to_string(),
        };

        let mut parts = s.trim().split('.');
        // The leading segment is mandatory; trailing segments default to 0.
        let major = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(malformed)?;

        let mut rest = [0u32; 3];
        for slot in rest.iter_mut() {
            match parts.next() {
                Some(part) => *slot = part.parse().map_err(|_| malformed())?,
                None => break,
            }
        }

        Ok(EngineVersion::new(major, rest[0], rest[1], rest[2]))
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.patch, self.build
        )
    }
}
