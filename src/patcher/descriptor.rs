use strum::{Display, EnumString};

use crate::metadata::Token;

/// When a routine runs relative to the other routines of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Display, EnumString)]
pub enum PatchOrdering {
    /// Runs in scan order, as soon as the scan is complete
    #[default]
    Immediate,
    /// Runs after every immediate patch, grouped by routine registration order
    Deferred,
}

/// One pending application of a routine to a method.
///
/// Created while scanning annotations and consumed exactly once by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchDescriptor {
    /// Method the routine edits; equals `annotated` until resolution
    pub target: Token,
    /// Method that carries the annotation
    pub annotated: Token,
    /// Index of the routine in the registry
    pub routine: usize,
    /// Ordering class of the routine
    pub ordering: PatchOrdering,
    /// Position of the annotation in the scan
    pub scan_index: usize,
}

impl PatchDescriptor {
    /// Creates an unresolved descriptor.
    #[must_use]
    pub fn new(annotated: Token, routine: usize, ordering: PatchOrdering, scan_index: usize) -> Self {
        PatchDescriptor {
            target: annotated,
            annotated,
            routine,
            ordering,
            scan_index,
        }
    }

    /// Returns true once the target differs from the annotated method.
    #[must_use]
    pub fn is_redirected(&self) -> bool {
        self.target != self.annotated
    }
}

/// Orders descriptors the way a session applies them: immediates in scan order, then
/// deferred ones by routine registration index and scan order.
pub fn schedule(descriptors: Vec<PatchDescriptor>) -> (Vec<PatchDescriptor>, Vec<PatchDescriptor>) {
    let (mut immediate, mut deferred): (Vec<_>, Vec<_>) = descriptors
        .into_iter()
        .partition(|d| d.ordering == PatchOrdering::Immediate);
    immediate.sort_by_key(|d| d.scan_index);
    deferred.sort_by_key(|d| (d.routine, d.scan_index));
    (immediate, deferred)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule() {
        let d = |routine, ordering, scan| {
            PatchDescriptor::new(Token::method_def(scan as u32 + 1), routine, ordering, scan)
        };
        let (immediate, deferred) = schedule(vec![
            d(2, PatchOrdering::Deferred, 0),
            d(0, PatchOrdering::Immediate, 1),
            d(1, PatchOrdering::Deferred, 2),
            d(2, PatchOrdering::Deferred, 3),
            d(3, PatchOrdering::Immediate, 4),
        ]);

        let scans: Vec<usize> = immediate.iter().map(|d| d.scan_index).collect();
        assert_eq!(scans, vec![1, 4]);
        let order: Vec<(usize, usize)> = deferred.iter().map(|d| (d.routine, d.scan_index)).collect();
        assert_eq!(order, vec![(1, 2), (2, 0), (2, 3)]);
    }

    #[test]
    fn test_ordering_parse() {
        assert_eq!("Deferred".parse::<PatchOrdering>().unwrap(), PatchOrdering::Deferred);
        assert_eq!(PatchOrdering::default().to_string(), "Immediate");
    }
}
