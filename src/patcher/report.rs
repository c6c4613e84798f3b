use std::fmt;

use crate::metadata::{BuildVersion, Token};

/// One routine application that went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedPatch {
    /// Routine name
    pub routine: String,
    /// Identity of the annotated method
    pub annotated: String,
    /// Token of the method that was edited
    pub target: Token,
}

/// One annotation whose flag gate did not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPatch {
    /// Routine name
    pub routine: String,
    /// Identity of the annotated method
    pub method: String,
    /// The flag that gated the annotation out
    pub flag: String,
}

/// Outcome of a successful session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    /// Version the target was identified as
    pub version: BuildVersion,
    /// Applied patches, in application order
    pub applied: Vec<AppliedPatch>,
    /// Annotations skipped because of their flag gate
    pub skipped: Vec<SkippedPatch>,
    /// Identities of the extern methods replaced by stubs
    pub stubbed: Vec<String>,
    /// Number of instructions whose encoding was widened
    pub widened: usize,
    /// Number of branches shortened
    pub shortened: usize,
}

impl PatchReport {
    pub(crate) fn new(version: BuildVersion) -> Self {
        PatchReport {
            version,
            applied: Vec::new(),
            skipped: Vec::new(),
            stubbed: Vec::new(),
            widened: 0,
            shortened: 0,
        }
    }

    /// Returns true if the routine was applied at least once.
    #[must_use]
    pub fn was_applied(&self, routine: &str) -> bool {
        self.applied.iter().any(|p| p.routine == routine)
    }

    /// Returns a one-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "target {}: {} applied, {} skipped, {} stubbed, {} widened, {} shortened",
            self.version,
            self.applied.len(),
            self.skipped.len(),
            self.stubbed.len(),
            self.widened,
            self.shortened
        )
    }
}

impl fmt::Display for PatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for patch in &self.applied {
            writeln!(f, "  applied {} to {}", patch.routine, patch.annotated)?;
        }
        for patch in &self.skipped {
            writeln!(f, "  skipped {} on {} ({})", patch.routine, patch.method, patch.flag)?;
        }
        for method in &self.stubbed {
            writeln!(f, "  stubbed {method}")?;
        }
        Ok(())
    }
}
