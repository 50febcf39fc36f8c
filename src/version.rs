//! Semantic version policy for new catalog versions

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ImportError, Result};

/// Version assigned to the first version of any object
pub const INITIAL_VERSION: &str = "1.0.0";

/// Which component of the latest known version is incremented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VersionStrategy {
    /// Increment major, reset minor and patch
    #[default]
    Major,
    /// Increment minor, reset patch
    Minor,
    /// Increment patch
    Patch,
}

impl VersionStrategy {
    /// Bump a parsed version
    pub fn bump(&self, version: &Version) -> Version {
        match self {
            VersionStrategy::Major => Version::new(version.major + 1, 0, 0),
            VersionStrategy::Minor => Version::new(version.major, version.minor + 1, 0),
            VersionStrategy::Patch => {
                Version::new(version.major, version.minor, version.patch + 1)
            }
        }
    }
}

impl fmt::Display for VersionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VersionStrategy::Major => "major",
            VersionStrategy::Minor => "minor",
            VersionStrategy::Patch => "patch",
        };
        f.write_str(s)
    }
}

impl FromStr for VersionStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "major" => Ok(VersionStrategy::Major),
            "minor" => Ok(VersionStrategy::Minor),
            "patch" => Ok(VersionStrategy::Patch),
            other => Err(format!("unknown version strategy: {}", other)),
        }
    }
}

/// How cascade updates version a released dependent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CascadeVersioning {
    /// Reuse the version string of the superseded version
    #[default]
    Inherit,
    /// Increment the superseded version per the configured strategy
    Increment,
}

/// Parse a catalog version string, accepting a leading `v`.
pub fn parse_version(value: &str) -> Result<Version> {
    let trimmed = value.trim();
    let stripped = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(stripped).map_err(|source| ImportError::SemVer {
        value: value.to_string(),
        source,
    })
}

/// Compute the version string for a new version.
///
/// Without a baseline (or with a blank one) the result is always [`INITIAL_VERSION`], whatever the
/// strategy. Pre-release and build metadata on the baseline are dropped.
pub fn next_version(latest: Option<&str>, strategy: VersionStrategy) -> Result<String> {
    match latest.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(INITIAL_VERSION.to_string()),
        Some(value) => {
            let current = parse_version(value)?;
            Ok(strategy.bump(&current).to_string())
        }
    }
}

/// Compute the version string for a cascaded re-version of `superseded`.
pub fn cascade_version(
    superseded: Option<&str>,
    mode: CascadeVersioning,
    strategy: VersionStrategy,
) -> Result<String> {
    match (mode, superseded) {
        (CascadeVersioning::Inherit, Some(value)) => Ok(value.to_string()),
        (CascadeVersioning::Inherit, None) => Ok(INITIAL_VERSION.to_string()),
        (CascadeVersioning::Increment, latest) => next_version(latest, strategy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_version_ignores_strategy() {
        for strategy in [VersionStrategy::Major, VersionStrategy::Minor, VersionStrategy::Patch] {
            assert_eq!(next_version(None, strategy).unwrap(), "1.0.0");
        }
    }

    #[test]
    fn test_version_bumps() {
        assert_eq!(next_version(Some("1.2.3"), VersionStrategy::Major).unwrap(), "2.0.0");
        assert_eq!(next_version(Some("1.2.3"), VersionStrategy::Minor).unwrap(), "1.3.0");
        assert_eq!(next_version(Some("1.2.3"), VersionStrategy::Patch).unwrap(), "1.2.4");
    }

    #[test]
    fn test_prerelease_is_dropped() {
        assert_eq!(
            next_version(Some("1.2.3-rc.1+build.7"), VersionStrategy::Patch).unwrap(),
            "1.2.4"
        );
        assert_eq!(next_version(Some("v0.9.0"), VersionStrategy::Minor).unwrap(), "0.10.0");
    }

    #[test]
    fn test_unparseable_baseline() {
        let err = next_version(Some("one.two"), VersionStrategy::Major).unwrap_err();
        assert!(matches!(err, ImportError::SemVer { ref value, .. } if value == "one.two"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_cascade_version_modes() {
        assert_eq!(
            cascade_version(Some("3.1.0"), CascadeVersioning::Inherit, VersionStrategy::Major).unwrap(),
            "3.1.0"
        );
        assert_eq!(
            cascade_version(Some("3.1.0"), CascadeVersioning::Increment, VersionStrategy::Minor).unwrap(),
            "3.2.0"
        );
        assert_eq!(
            cascade_version(None, CascadeVersioning::Inherit, VersionStrategy::Major).unwrap(),
            "1.0.0"
        );
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("MINOR".parse::<VersionStrategy>().unwrap(), VersionStrategy::Minor);
        assert!("huge".parse::<VersionStrategy>().is_err());
    }
}
