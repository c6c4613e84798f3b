//! Configuration for patch sessions.
//!
//! This module provides [`PatchConfig`], which controls how a session identifies its
//! target (version gate, flag probes), how it marks patched modules, and what the
//! post-processing pass does.

use std::{collections::BTreeMap, env};

use crate::{
    flags::{FlagProbe, VersionSource},
    metadata::BuildVersion,
};

/// Environment variable that turns on extern stubbing in [`PatchConfig::from_env`].
pub const STUB_EXTERNS_VAR: &str = "CILPATCH_STUB_EXTERNS";

/// Configuration for a patch session.
#[derive(Debug, Clone)]
pub struct PatchConfig {
    /// Full name of the type that marks a module as patched
    /// (default: `CilPatch.WasHere`).
    pub marker_type: String,

    /// Whether a successful session adds the marker type (default: true).
    pub stamp_marker: bool,

    /// Oldest supported target version (default: `0.0`, accepting everything).
    pub minimum_version: BuildVersion,

    /// Where the target's version constant lives; `None` skips detection and
    /// assumes the minimum.
    pub version_source: Option<VersionSource>,

    /// Probes turned into flags before scanning (default: the host OS probe).
    pub probes: Vec<FlagProbe>,

    /// Explicit flags, overriding probe results.
    pub flags: BTreeMap<String, bool>,

    /// Name of the flag mirroring [`PatchConfig::stub_externs`]
    /// (default: `StubExterns`).
    pub stub_flag: String,

    /// Replace the P/Invoke methods of [`PatchConfig::stub_modules`] with
    /// default-returning stubs (default: false).
    pub stub_externs: bool,

    /// Native module names whose imports get stubbed.
    pub stub_modules: Vec<String>,

    /// Widen short-form branches and macros whose operand no longer fits
    /// (default: true).
    pub widen_branches: bool,

    /// Shorten long-form branches whose displacement fits in one byte
    /// (default: false).
    pub optimize_branches: bool,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            marker_type: "CilPatch.WasHere".to_string(),
            stamp_marker: true,
            minimum_version: BuildVersion::short(0, 0),
            version_source: None,
            probes: vec![FlagProbe::HostOs],
            flags: BTreeMap::new(),
            stub_flag: "StubExterns".to_string(),
            stub_externs: false,
            stub_modules: Vec::new(),
            widen_branches: true,
            optimize_branches: false,
        }
    }
}

impl PatchConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the default configuration, with extern stubbing enabled if
    /// `CILPATCH_STUB_EXTERNS=1` is set in the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            stub_externs: env::var(STUB_EXTERNS_VAR).is_ok_and(|v| v == "1"),
            ..Self::default()
        }
    }

    /// Creates a configuration for running targets without their native libraries:
    /// imports of `modules` are stubbed.
    #[must_use]
    pub fn headless<I, S>(modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stub_externs: true,
            stub_modules: modules.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the version gate.
    #[must_use]
    pub fn with_minimum_version(mut self, minimum: BuildVersion, source: VersionSource) -> Self {
        self.minimum_version = minimum;
        self.version_source = Some(source);
        self
    }

    /// Adds a flag probe.
    #[must_use]
    pub fn with_probe(mut self, probe: FlagProbe) -> Self {
        self.probes.push(probe);
        self
    }

    /// Defines an explicit flag.
    #[must_use]
    pub fn with_flag(mut self, name: impl Into<String>, value: bool) -> Self {
        self.flags.insert(name.into(), value);
        self
    }

    /// Returns true if the post-processing pass has anything to do besides stubbing.
    #[must_use]
    pub fn rewrites_branches(&self) -> bool {
        self.widen_branches || self.optimize_branches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PatchConfig::default();
        assert_eq!(config.marker_type, "CilPatch.WasHere");
        assert!(config.stamp_marker);
        assert!(!config.stub_externs);
        assert!(config.widen_branches);
        assert!(!config.optimize_branches);
        assert_eq!(config.probes, vec![FlagProbe::HostOs]);
    }

    #[test]
    fn test_headless() {
        let config = PatchConfig::headless(["fmod", "fmodstudio"]);
        assert!(config.stub_externs);
        assert_eq!(config.stub_modules, vec!["fmod", "fmodstudio"]);
    }

    #[test]
    fn test_builders() {
        let config = PatchConfig::new()
            .with_minimum_version(
                BuildVersion::new(1, 3, 1, 2),
                VersionSource::constructor_of("Celeste.Celeste"),
            )
            .with_probe(FlagProbe::reference_or("FNA", "FNA", "XNA"))
            .with_flag("Debug", true);
        assert_eq!(config.minimum_version, BuildVersion::new(1, 3, 1, 2));
        assert_eq!(config.probes.len(), 2);
        assert_eq!(config.flags.get("Debug"), Some(&true));
    }
}
