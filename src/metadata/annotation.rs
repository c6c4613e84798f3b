//! Declarative patch annotations attached to method definitions.
//!
//! An annotation names the patch routine that should edit a method and, optionally,
//! a flag condition that decides whether it applies to the current target at all.

/// Conditional gate on a patch annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlagCondition {
    /// Flag name, e.g. `"FNA"` or `"OS:Windows"`
    pub flag: String,
    /// The flag value for which the annotation applies
    pub expected: bool,
    /// Whether the annotation applies when the flag is not defined at all
    pub fallback: bool,
}

impl FlagCondition {
    /// Evaluates the condition against a resolved flag value (`None` if undefined).
    #[must_use]
    pub fn holds(&self, value: Option<bool>) -> bool {
        match value {
            Some(value) => value == self.expected,
            None => self.fallback,
        }
    }
}

/// Marks a method as the target of a named patch routine.
///
/// # Examples
///
/// ```rust
/// use cilpatch::metadata::PatchAnnotation;
///
/// let plain = PatchAnnotation::new("PatchLevelLoader");
/// assert!(plain.condition.is_none());
///
/// let gated = PatchAnnotation::new("PatchFNAInput").when("FNA");
/// assert_eq!(gated.condition.as_ref().map(|c| c.flag.as_str()), Some("FNA"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatchAnnotation {
    /// Name of the routine in the [`crate::patcher::PatchRegistry`]
    pub routine: String,
    /// Optional gate; `None` means always apply
    pub condition: Option<FlagCondition>,
}

impl PatchAnnotation {
    /// Creates an unconditional annotation.
    pub fn new(routine: impl Into<String>) -> Self {
        PatchAnnotation {
            routine: routine.into(),
            condition: None,
        }
    }

    /// Applies only if `flag` is set.
    #[must_use]
    pub fn when(self, flag: impl Into<String>) -> Self {
        self.gated(flag, true)
    }

    /// Applies only if `flag` is not set.
    #[must_use]
    pub fn unless(self, flag: impl Into<String>) -> Self {
        self.gated(flag, false)
    }

    /// Sets whether the annotation applies when its flag is undefined.
    #[must_use]
    pub fn or_else(mut self, fallback: bool) -> Self {
        if let Some(condition) = &mut self.condition {
            condition.fallback = fallback;
        }
        self
    }

    fn gated(mut self, flag: impl Into<String>, expected: bool) -> Self {
        self.condition = Some(FlagCondition {
            flag: flag.into(),
            expected,
            fallback: false,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_evaluation() {
        let when = PatchAnnotation::new("A").when("FNA");
        let condition = when.condition.unwrap();
        assert!(condition.holds(Some(true)));
        assert!(!condition.holds(Some(false)));
        assert!(!condition.holds(None));

        let unless = PatchAnnotation::new("A").unless("FNA").or_else(true);
        let condition = unless.condition.unwrap();
        assert!(condition.holds(Some(false)));
        assert!(!condition.holds(Some(true)));
        assert!(condition.holds(None));
    }

    #[test]
    fn test_or_else_without_condition() {
        let annotation = PatchAnnotation::new("A").or_else(true);
        assert!(annotation.condition.is_none());
    }
}
