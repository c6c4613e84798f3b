//! Feature flags describing the patch target.
//!
//! Patches are written against several builds of the same program. Before anything is
//! edited, the session inspects the target and condenses what it finds into a
//! [`FlagEnvironment`]: one boolean per named feature plus the reconstructed build
//! version. Patch annotations are gated on these flags.
//!
//! Flags come from, in increasing precedence:
//!
//! 1. [`FlagProbe`]s run against the module (assembly references, members, host OS)
//! 2. the extern-stub switch of [`crate::config::PatchConfig`]
//! 3. explicit flags of the configuration
//!
//! # Examples
//!
//! ```rust
//! use cilpatch::config::PatchConfig;
//! use cilpatch::flags::{resolve_flags, FlagProbe};
//! use cilpatch::metadata::Module;
//!
//! let mut module = Module::new("Game.exe");
//! module.add_assembly_ref("FNA", None);
//!
//! let mut config = PatchConfig::default();
//! config.probes.push(FlagProbe::reference_or("FNA", "FNA", "XNA"));
//!
//! let env = resolve_flags(&module, &config)?;
//! assert!(env.is_set("FNA"));
//! assert!(!env.is_set("XNA"));
//! # Ok::<(), cilpatch::Error>(())
//! ```

mod environment;
mod probe;
mod version;

use log::info;

pub use environment::FlagEnvironment;
pub use probe::{FlagProbe, OS_NOT_WINDOWS, OS_WINDOWS};
pub use version::{check_version, detect_version, VersionSource};

use crate::{config::PatchConfig, metadata::Module, Result};

/// Computes the flag environment of `module`.
///
/// # Errors
///
/// Returns [`crate::Error::UnsupportedTarget`] if the reconstructed version is below
/// the configured minimum, or [`crate::Error::Malformed`] if the version constant is
/// not a valid version.
pub fn resolve_flags(module: &Module, config: &PatchConfig) -> Result<FlagEnvironment> {
    let detected = match &config.version_source {
        Some(source) => detect_version(module, source)?,
        None => None,
    };
    let version = check_version(detected, config.minimum_version)?;
    info!("Target {} is version {}", module.name, version);

    let mut env = FlagEnvironment::new(version);
    for probe in &config.probes {
        for (name, value) in probe.evaluate(module) {
            env.set(name, value);
        }
    }
    env.set(config.stub_flag.clone(), config.stub_externs);
    for (name, value) in &config.flags {
        env.set(name.clone(), *value);
    }
    Ok(env)
}
