//! Reconstruction of the target's build version from its own code.
//!
//! Many targets carry their version only as a constant passed to a version constructor
//! somewhere in their startup code, e.g.
//!
//! ```text
//! ldarg.0
//! ldc.i4.1
//! ldc.i4.3
//! ldc.i4.1
//! ldc.i4.2
//! newobj System.Void System.Version::.ctor(System.Int32,System.Int32,System.Int32,System.Int32)
//! ```
//!
//! [`detect_version`] finds the first such constructor call in a configured method and
//! reads its arguments back from the literals right in front of it.

use log::{debug, warn};

use crate::{
    assembly::OpCode,
    metadata::{BuildVersion, Module},
    Error, Result,
};

/// Where to look for the version constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionSource {
    /// Full name of the type whose method constructs the version
    pub type_name: String,
    /// Name of that method
    pub method: String,
    /// Full name of the constructed version type
    pub version_type: String,
}

impl VersionSource {
    /// Reads `System.Version` constructions from the instance constructor of `type_name`.
    pub fn constructor_of(type_name: impl Into<String>) -> Self {
        VersionSource {
            type_name: type_name.into(),
            method: ".ctor".to_string(),
            version_type: "System.Version".to_string(),
        }
    }
}

/// Extracts the version constructed in the configured method.
///
/// Only the first construction of the version type is inspected. Integer constructors
/// read one literal per parameter from the instructions preceding the call; a single
/// string parameter is parsed from the preceding `ldstr`.
///
/// Returns `Ok(None)` if the method, its body or a readable construction is missing.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if the constant found cannot be a version.
pub fn detect_version(module: &Module, source: &VersionSource) -> Result<Option<BuildVersion>> {
    let Some(body) = module
        .find_method(&source.type_name, &source.method)
        .and_then(|m| m.body.as_ref())
    else {
        debug!(
            "No body for {}::{}, version unknown",
            source.type_name, source.method
        );
        return Ok(None);
    };

    let Some((pos, ctor)) = body.iter().enumerate().find_map(|(pos, instr)| {
        instr
            .method()
            .filter(|m| {
                instr.opcode() == OpCode::Newobj && m.declaring_type.is(&source.version_type)
            })
            .map(|m| (pos, m))
    }) else {
        debug!("No {} construction in {}", source.version_type, body.owner());
        return Ok(None);
    };

    let params = &ctor.signature.params;
    if params.len() == 1 && params[0].is("System.String") {
        let literal = pos
            .checked_sub(1)
            .and_then(|p| body.get(p))
            .and_then(|instr| instr.string_value());
        return match literal {
            Some(text) => BuildVersion::parse(text).map(Some),
            None => {
                warn!("Version string in {} is not a literal", body.owner());
                Ok(None)
            }
        };
    }

    if params.is_empty() || !params.iter().all(|p| p.is("System.Int32")) {
        warn!("Unsupported version constructor {ctor}");
        return Ok(None);
    }

    let Some(first) = pos.checked_sub(params.len()) else {
        return Ok(None);
    };
    let parts: Option<Vec<i64>> = (first..pos)
        .map(|p| body.get(p).and_then(|instr| instr.int_value()))
        .collect();
    match parts {
        Some(parts) => BuildVersion::from_components(&parts).map(Some),
        None => {
            warn!("Version components in {} are not literals", body.owner());
            Ok(None)
        }
    }
}

/// Applies the minimum-version rule to a detected version.
///
/// An undetected version, or one with major version 0, is taken to be `minimum`.
///
/// # Errors
///
/// Returns [`crate::Error::UnsupportedTarget`] if the version is strictly below `minimum`.
pub fn check_version(detected: Option<BuildVersion>, minimum: BuildVersion) -> Result<BuildVersion> {
    let version = match detected {
        Some(version) if !version.is_placeholder() => version,
        _ => minimum,
    };
    if version < minimum {
        return Err(Error::UnsupportedTarget {
            found: version,
            minimum,
        });
    }
    Ok(version)
}
