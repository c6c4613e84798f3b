//! Build version of a target assembly.
//!
//! [`BuildVersion`] models a `System.Version`: two mandatory components and optional
//! build and revision components. An absent component orders below any present one,
//! so `1.3.1 < 1.3.1.0 < 1.3.1.2`, matching the runtime's comparison semantics.

use std::{fmt, str::FromStr};

use crate::{Error, Result};

/// A two- to four-component version number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildVersion {
    /// Major version component
    pub major: u32,
    /// Minor version component
    pub minor: u32,
    /// Build component, if present
    pub build: Option<u32>,
    /// Revision component, if present
    pub revision: Option<u32>,
}

impl BuildVersion {
    /// Creates a full four-component version.
    #[must_use]
    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        BuildVersion {
            major,
            minor,
            build: Some(build),
            revision: Some(revision),
        }
    }

    /// Creates a two-component version.
    #[must_use]
    pub const fn short(major: u32, minor: u32) -> Self {
        BuildVersion {
            major,
            minor,
            build: None,
            revision: None,
        }
    }

    /// Builds a version from the integer arguments of a `System.Version` constructor.
    ///
    /// # Arguments
    ///
    /// * `parts` - Two, three or four components, in constructor order
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for a wrong component count or a negative /
    /// out-of-range component.
    pub fn from_components(parts: &[i64]) -> Result<Self> {
        if !(2..=4).contains(&parts.len()) {
            return Err(malformed_error!(
                "A version needs 2 to 4 components, got {}",
                parts.len()
            ));
        }

        let mut components = [0u32; 4];
        for (slot, value) in components.iter_mut().zip(parts) {
            *slot = u32::try_from(*value)
                .map_err(|_| malformed_error!("Invalid version component: {}", value))?;
        }

        Ok(BuildVersion {
            major: components[0],
            minor: components[1],
            build: (parts.len() > 2).then_some(components[2]),
            revision: (parts.len() > 3).then_some(components[3]),
        })
    }

    /// Parses a dotted version string such as `"1.3.1.2"`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the string does not contain 2 to 4 numeric
    /// components.
    pub fn parse(version_str: &str) -> Result<Self> {
        let parts = version_str
            .trim()
            .split('.')
            .map(|part| {
                part.parse::<i64>()
                    .map_err(|_| malformed_error!("Invalid version component: {}", part))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::from_components(&parts)
    }

    /// Returns true for the `0.x` placeholder a target reports when its version is not
    /// known.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.major == 0
    }
}

impl FromStr for BuildVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for BuildVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(build) = self.build {
            write!(f, ".{build}")?;
            if let Some(revision) = self.revision {
                write!(f, ".{revision}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let version = BuildVersion::parse("1.3.1.2").unwrap();
        assert_eq!(version, BuildVersion::new(1, 3, 1, 2));
        assert_eq!(version.to_string(), "1.3.1.2");

        let short: BuildVersion = "1.4".parse().unwrap();
        assert_eq!(short, BuildVersion::short(1, 4));
        assert_eq!(short.to_string(), "1.4");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(BuildVersion::parse("1").is_err());
        assert!(BuildVersion::parse("1.2.3.4.5").is_err());
        assert!(BuildVersion::parse("1.x").is_err());
        assert!(BuildVersion::from_components(&[1, -2]).is_err());
    }

    #[test]
    fn test_ordering() {
        let minimum = BuildVersion::new(1, 3, 1, 2);
        assert!(BuildVersion::new(1, 2, 9, 9) < minimum);
        assert!(BuildVersion::new(1, 3, 1, 2) >= minimum);
        assert!(BuildVersion::new(1, 4, 0, 0) > minimum);
        assert!(BuildVersion::from_components(&[1, 3, 1]).unwrap() < minimum);
        assert!(BuildVersion::short(1, 3) < BuildVersion::new(1, 3, 0, 0));
    }

    #[test]
    fn test_placeholder() {
        assert!(BuildVersion::new(0, 0, 0, 0).is_placeholder());
        assert!(!BuildVersion::short(1, 0).is_placeholder());
    }
}
