use std::collections::BTreeMap;

use crate::{
    metadata::{BuildVersion, FlagCondition},
    Error, Result,
};

/// Resolved boolean feature flags of one target, plus its reconstructed version.
///
/// The environment is computed once per session, before any routine runs, and is
/// only handed out by shared reference afterwards.
///
/// # Examples
///
/// ```rust
/// use cilpatch::flags::FlagEnvironment;
/// use cilpatch::metadata::{BuildVersion, PatchAnnotation};
///
/// let env = FlagEnvironment::new(BuildVersion::new(1, 4, 0, 0))
///     .with_flag("FNA", true)
///     .with_flag("XNA", false);
///
/// assert!(env.is_set("FNA"));
/// assert_eq!(env.get("Steamworks"), None);
///
/// let annotation = PatchAnnotation::new("PatchInput").unless("FNA");
/// assert!(!env.evaluate(annotation.condition.as_ref().unwrap()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagEnvironment {
    flags: BTreeMap<String, bool>,
    version: BuildVersion,
}

impl FlagEnvironment {
    /// Creates an environment without flags.
    #[must_use]
    pub fn new(version: BuildVersion) -> Self {
        FlagEnvironment {
            flags: BTreeMap::new(),
            version,
        }
    }

    /// Defines (or redefines) a flag.
    #[must_use]
    pub fn with_flag(mut self, name: impl Into<String>, value: bool) -> Self {
        self.set(name, value);
        self
    }

    pub(crate) fn set(&mut self, name: impl Into<String>, value: bool) {
        self.flags.insert(name.into(), value);
    }

    /// Returns the value of a flag, `None` if it is not defined.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<bool> {
        self.flags.get(name).copied()
    }

    /// Returns true if the flag is defined and set.
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).unwrap_or(false)
    }

    /// Returns the value of a flag that must be defined.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownFlag`] if the flag is not defined.
    pub fn require(&self, name: &str) -> Result<bool> {
        self.get(name)
            .ok_or_else(|| Error::UnknownFlag(name.to_string()))
    }

    /// Evaluates an annotation gate against this environment.
    #[must_use]
    pub fn evaluate(&self, condition: &FlagCondition) -> bool {
        condition.holds(self.get(&condition.flag))
    }

    /// Iterates over all flags, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        self.flags.iter().map(|(name, value)| (name.as_str(), *value))
    }

    /// Returns the number of defined flags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Returns true if no flag is defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Returns the reconstructed target version.
    #[must_use]
    pub fn version(&self) -> BuildVersion {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::PatchAnnotation;

    fn env() -> FlagEnvironment {
        FlagEnvironment::new(BuildVersion::new(1, 3, 1, 2))
            .with_flag("FNA", true)
            .with_flag("XNA", false)
    }

    #[test]
    fn test_lookup() {
        let env = env();
        assert_eq!(env.get("FNA"), Some(true));
        assert_eq!(env.get("XNA"), Some(false));
        assert!(!env.is_set("XNA"));
        assert!(!env.is_set("Missing"));
        assert!(env.require("XNA").is_ok());
        assert!(matches!(env.require("Missing"), Err(Error::UnknownFlag(f)) if f == "Missing"));
        assert_eq!(env.len(), 2);
        assert_eq!(env.version(), BuildVersion::new(1, 3, 1, 2));
    }

    #[test]
    fn test_evaluate_conditions() {
        let env = env();
        let when = PatchAnnotation::new("A").when("FNA").condition.unwrap();
        let unless = PatchAnnotation::new("A").unless("FNA").condition.unwrap();
        let undefined = PatchAnnotation::new("A").when("OS:Windows").condition.unwrap();
        let undefined_default = PatchAnnotation::new("A")
            .when("OS:Windows")
            .or_else(true)
            .condition
            .unwrap();

        assert!(env.evaluate(&when));
        assert!(!env.evaluate(&unless));
        assert!(!env.evaluate(&undefined));
        assert!(env.evaluate(&undefined_default));
    }

    #[test]
    fn test_iter_sorted() {
        let env = env();
        let names: Vec<&str> = env.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["FNA", "XNA"]);
    }
}
