use std::{collections::HashMap, fmt};

use log::debug;

use crate::{
    metadata::Token,
    patcher::{FnRoutine, PatchContext, PatchRoutine},
    Error, Result,
};

/// The catalogue of patch routines known to a session, in registration order.
///
/// The registration index of a routine decides the order of deferred patches.
///
/// # Examples
///
/// ```rust
/// use cilpatch::patcher::{PatchOrdering, PatchRegistry};
///
/// let mut registry = PatchRegistry::new();
/// registry.register_fn("PatchLevelLoader", |_ctx, _target| Ok(()))?;
/// assert!(registry.register_fn("PatchLevelLoader", |_ctx, _target| Ok(())).is_err());
///
/// let (index, routine) = registry.get("PatchLevelLoader").unwrap();
/// assert_eq!(index, 0);
/// assert_eq!(routine.ordering(), PatchOrdering::Immediate);
/// # Ok::<(), cilpatch::Error>(())
/// ```
#[derive(Default)]
pub struct PatchRegistry {
    routines: Vec<Box<dyn PatchRoutine>>,
    index: HashMap<String, usize>,
}

impl PatchRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a routine and returns its registration index.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DuplicateRoutine`] if the name is taken.
    pub fn register(&mut self, routine: impl PatchRoutine + 'static) -> Result<usize> {
        let name = routine.name().to_string();
        if self.index.contains_key(&name) {
            return Err(Error::DuplicateRoutine(name));
        }

        let index = self.routines.len();
        debug!("Registered routine {} ({}) as #{}", name, routine.description(), index);
        self.index.insert(name, index);
        self.routines.push(Box::new(routine));
        Ok(index)
    }

    /// Adds an immediate, plain-shape closure routine.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DuplicateRoutine`] if the name is taken.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, apply: F) -> Result<usize>
    where
        F: Fn(&mut PatchContext<'_>, Token) -> Result<()> + 'static,
    {
        self.register(FnRoutine::new(name, apply))
    }

    /// Looks up a routine by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<(usize, &dyn PatchRoutine)> {
        let index = *self.index.get(name)?;
        self.routine(index).map(|routine| (index, routine))
    }

    /// Returns the routine registered at `index`.
    #[must_use]
    pub fn routine(&self, index: usize) -> Option<&dyn PatchRoutine> {
        self.routines.get(index).map(AsRef::as_ref)
    }

    /// Returns true if a routine called `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Iterates over the routine names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.routines.iter().map(|r| r.name())
    }

    /// Returns the number of routines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routines.len()
    }

    /// Returns true if no routine is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }
}

impl fmt::Debug for PatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patcher::{MethodShape, PatchOrdering};

    #[test]
    fn test_registration_order() {
        let mut registry = PatchRegistry::new();
        registry.register_fn("A", |_, _| Ok(())).unwrap();
        registry
            .register(
                FnRoutine::new("B", |_, _| Ok(()))
                    .with_ordering(PatchOrdering::Deferred)
                    .with_shape(MethodShape::Iterator)
                    .with_description("patches B"),
            )
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["A", "B"]);
        let (index, b) = registry.get("B").unwrap();
        assert_eq!(index, 1);
        assert_eq!(b.ordering(), PatchOrdering::Deferred);
        assert_eq!(b.shape(), MethodShape::Iterator);
        assert_eq!(b.description(), "patches B");
        assert_eq!(registry.routine(0).map(|r| r.description()), Some("No description available"));
        assert!(registry.get("C").is_none());
        assert_eq!(format!("{registry:?}"), r#"["A", "B"]"#);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = PatchRegistry::new();
        registry.register_fn("A", |_, _| Ok(())).unwrap();
        match registry.register_fn("A", |_, _| Ok(())) {
            Err(Error::DuplicateRoutine(name)) => assert_eq!(name, "A"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(registry.len(), 1);
    }
}
