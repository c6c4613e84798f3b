use thiserror::Error;

use crate::metadata::version::BuildVersion;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors a patch session can
/// potentially return.
///
/// Every failure mode of the engine is fatal for the session that raised it: there is
/// no partial-success mode. Each variant carries enough context (method identity,
/// pattern description, routine name) to diagnose which patch broke on which target.
///
/// # Error Categories
///
/// ## Session-level refusals
/// - [`Error::UnsupportedTarget`] - The reconstructed target version is below the minimum
/// - [`Error::AlreadyPatched`] - The module carries the marker of a previous session
///
/// ## Patch application failures
/// - [`Error::PatternNotFound`] - A mandatory cursor search found no match
/// - [`Error::DanglingBranchTarget`] - An edit would leave a branch pointing nowhere
/// - [`Error::ResolutionFailure`] - A state-machine implementation could not be located
/// - [`Error::AmbiguousVariant`] - More than one expected code shape matched
/// - [`Error::PatchFailed`] - Wraps any of the above with the routine and target
///
/// ## Registry and lookup errors
/// - [`Error::UnknownRoutine`], [`Error::DuplicateRoutine`], [`Error::UnknownFlag`]
/// - [`Error::MethodNotFound`], [`Error::MissingBody`]
///
/// ## Model errors
/// - [`Error::InvalidOperand`] - An operand does not fit the opcode's operand kind
/// - [`Error::OutOfBounds`] - A stream position outside the method body
/// - [`Error::Malformed`] - Internal consistency failure
///
/// # Examples
///
/// ```rust,no_run
/// use cilpatch::{prelude::*, Error};
///
/// # fn run(module: &mut Module, registry: &PatchRegistry) {
/// match PatchSession::new(registry, PatchConfig::default()).run(module) {
///     Ok(report) => println!("applied {} patches", report.applied.len()),
///     Err(Error::AlreadyPatched { marker }) => eprintln!("already patched ({marker})"),
///     Err(Error::UnsupportedTarget { found, minimum }) => {
///         eprintln!("target {found} is older than {minimum}")
///     }
///     Err(e) => eprintln!("patching failed: {e}"),
/// }
/// # }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The target's reconstructed version is strictly below the supported minimum.
    ///
    /// Raised while building the flag environment, before any method is scanned or
    /// edited.
    #[error("Unsupported target version {found} (minimum supported is {minimum})")]
    UnsupportedTarget {
        /// The version reconstructed from the target
        found: BuildVersion,
        /// The minimum version the patch catalogue supports
        minimum: BuildVersion,
    },

    /// A mandatory pattern search scanned to the end of the method without a match.
    ///
    /// This means the target binary does not contain the shape a patch was written
    /// against, so the binary is incompatible with that patch.
    #[error("Pattern not found in {method}: {pattern}")]
    PatternNotFound {
        /// Identity of the method that was searched
        method: String,
        /// Human readable description of the pattern
        pattern: String,
    },

    /// An edit would leave a branch referencing an instruction that is no longer in
    /// the stream.
    #[error("Dangling branch target {label} in {method}: {detail}")]
    DanglingBranchTarget {
        /// Identity of the method whose stream is inconsistent
        method: String,
        /// The offending label
        label: String,
        /// What exactly went wrong
        detail: String,
    },

    /// The compiler-synthesized implementation behind an annotated method could not be
    /// located.
    #[error("Failed to resolve {shape} body of {method}: {reason}")]
    ResolutionFailure {
        /// Identity of the annotated method
        method: String,
        /// The method shape that was expected
        shape: String,
        /// Why resolution failed
        reason: String,
    },

    /// The module already carries the marker left behind by a previous patch session.
    #[error("Module is already patched (found marker type {marker})")]
    AlreadyPatched {
        /// Full name of the marker type that was found
        marker: String,
    },

    /// A patch routine failed while being applied to a method.
    #[error("Patch '{routine}' failed on {method}: {source}")]
    PatchFailed {
        /// Name of the routine that failed
        routine: String,
        /// Identity of the method the routine was applied to
        method: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Several mutually exclusive code shapes matched where exactly one was expected.
    #[error("Ambiguous code shape in {method}: variants {variants:?} all match at {position}")]
    AmbiguousVariant {
        /// Identity of the method that was searched
        method: String,
        /// Names of the variants that matched
        variants: Vec<String>,
        /// Stream position of the match
        position: usize,
    },

    /// An annotation names a routine that is not registered.
    #[error("No patch routine registered under '{0}'")]
    UnknownRoutine(String),

    /// A routine with the same name has already been registered.
    #[error("A patch routine named '{0}' is already registered")]
    DuplicateRoutine(String),

    /// A flag was required but the flag environment does not define it.
    #[error("Unknown flag '{0}'")]
    UnknownFlag(String),

    /// A type, method or field lookup failed.
    #[error("Member not found - {0}")]
    MethodNotFound(String),

    /// The method exists but has no instruction stream to edit.
    #[error("Method {0} has no body")]
    MissingBody(String),

    /// The operand does not fit the operand kind of the opcode.
    #[error("Invalid operand for '{opcode}': expected {expected}, found {found}")]
    InvalidOperand {
        /// Mnemonic of the opcode
        opcode: &'static str,
        /// The operand kind the opcode requires
        expected: &'static str,
        /// The operand kind that was supplied
        found: &'static str,
    },

    /// A stream position outside of the method body was used.
    #[error("Position {position} is out of bounds (stream length {len})")]
    OutOfBounds {
        /// The requested position
        position: usize,
        /// The current stream length
        len: usize,
    },

    /// Internal consistency failure.
    ///
    /// The error includes the source location where the inconsistency was detected
    /// for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },
}

impl Error {
    /// Wraps this error with the routine and method it occurred in.
    ///
    /// Errors that already carry patch context are returned unchanged so the innermost
    /// routine stays visible.
    #[must_use]
    pub fn in_patch(self, routine: &str, method: &str) -> Self {
        match self {
            Error::PatchFailed { .. } => self,
            other => Error::PatchFailed {
                routine: routine.to_string(),
                method: method.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, looking through [`Error::PatchFailed`] wrappers.
    #[must_use]
    pub fn root(&self) -> &Error {
        match self {
            Error::PatchFailed { source, .. } => source.root(),
            other => other,
        }
    }
}
