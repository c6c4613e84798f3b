//! Stable handles into an instruction stream.
//!
//! Two handle types keep references into a body valid while the body is edited:
//!
//! - [`InstrId`] names one instruction slot of the stream's arena. Slots are never
//!   reused, so an id keeps denoting the same instruction no matter what is inserted
//!   or removed around it.
//! - [`Label`] is what branch operands carry. A label resolves through the stream's
//!   [`LabelTable`] to an [`InstrId`], which means branch targets follow their
//!   instruction by identity, not by index.
//!
//! The [`LabelTable`] is the branch resolver proper: it maps labels to targets and
//! moves them when their target disappears.

use std::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

static NEXT_TABLE: AtomicU32 = AtomicU32::new(1);

/// Identity of one instruction slot within an [`crate::body::InstructionStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrId(pub(crate) u32);

impl InstrId {
    /// Returns the arena index of this slot.
    #[must_use]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A branch target handle.
///
/// Labels are created by the stream they belong to and are meaningless in any other
/// stream. Each one records the table that allocated it, so a foreign label is
/// rejected even when its index exists locally. Clones of a stream share its table
/// identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label {
    table: u32,
    index: u32,
}

impl Label {
    /// Returns the index of this label in its table.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.index)
    }
}

/// Maps labels to the instruction slot they currently resolve to.
///
/// An unbound label (`None`) is legal while a body is under construction; it only
/// becomes an error when a branch references it at validation time.
#[derive(Debug, Clone)]
pub struct LabelTable {
    id: u32,
    targets: Vec<Option<InstrId>>,
}

impl Default for LabelTable {
    fn default() -> Self {
        LabelTable {
            id: NEXT_TABLE.fetch_add(1, Ordering::Relaxed),
            targets: Vec::new(),
        }
    }
}

impl LabelTable {
    /// Creates an empty table with a fresh identity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn label(&self, index: usize) -> Label {
        Label {
            table: self.id,
            index: index as u32,
        }
    }

    /// Allocates a new label, optionally bound to `target`.
    pub fn define(&mut self, target: Option<InstrId>) -> Label {
        let label = self.label(self.targets.len());
        self.targets.push(target);
        label
    }

    /// Returns true if `label` was allocated by this table.
    #[must_use]
    pub fn contains(&self, label: Label) -> bool {
        label.table == self.id && label.index() < self.targets.len()
    }

    /// Returns the slot `label` resolves to, if bound.
    #[must_use]
    pub fn target(&self, label: Label) -> Option<InstrId> {
        if !self.contains(label) {
            return None;
        }
        self.targets.get(label.index()).copied().flatten()
    }

    /// Binds (or rebinds) `label` to `target`. Foreign labels are ignored.
    pub fn bind(&mut self, label: Label, target: Option<InstrId>) {
        if !self.contains(label) {
            return;
        }
        if let Some(slot) = self.targets.get_mut(label.index()) {
            *slot = target;
        }
    }

    /// Returns every label currently bound to `id`, in allocation order.
    #[must_use]
    pub fn labels_at(&self, id: InstrId) -> Vec<Label> {
        self.targets
            .iter()
            .enumerate()
            .filter(|(_, target)| **target == Some(id))
            .map(|(index, _)| self.label(index))
            .collect()
    }

    /// Moves every label bound to `from` onto `to`.
    pub fn retarget(&mut self, from: InstrId, to: Option<InstrId>) {
        for target in &mut self.targets {
            if *target == Some(from) {
                *target = to;
            }
        }
    }

    /// Returns the number of allocated labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns true if no label was ever allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Iterates over `(label, target)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Label, Option<InstrId>)> + '_ {
        self.targets
            .iter()
            .enumerate()
            .map(|(index, target)| (self.label(index), *target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_bind() {
        let mut table = LabelTable::new();
        let bound = table.define(Some(InstrId(3)));
        let unbound = table.define(None);

        assert_eq!(table.target(bound), Some(InstrId(3)));
        assert_eq!(table.target(unbound), None);
        assert!(table.contains(unbound));
        assert!(!table.contains(table.label(7)));

        table.bind(unbound, Some(InstrId(1)));
        assert_eq!(table.target(unbound), Some(InstrId(1)));
    }

    #[test]
    fn test_retarget_moves_all_labels() {
        let mut table = LabelTable::new();
        let a = table.define(Some(InstrId(2)));
        let b = table.define(Some(InstrId(2)));
        let c = table.define(Some(InstrId(5)));

        assert_eq!(table.labels_at(InstrId(2)), vec![a, b]);
        table.retarget(InstrId(2), Some(InstrId(9)));
        assert!(table.labels_at(InstrId(2)).is_empty());
        assert_eq!(table.labels_at(InstrId(9)), vec![a, b]);
        assert_eq!(table.target(c), Some(InstrId(5)));
    }

    #[test]
    fn test_tables_do_not_share_labels() {
        let mut mine = LabelTable::new();
        let mut theirs = LabelTable::new();
        let local = mine.define(Some(InstrId(0)));
        let foreign = theirs.define(Some(InstrId(4)));

        assert_eq!(local.index(), foreign.index());
        assert_ne!(local, foreign);
        assert!(!mine.contains(foreign));
        assert_eq!(mine.target(foreign), None);

        mine.bind(foreign, Some(InstrId(9)));
        assert_eq!(mine.target(local), Some(InstrId(0)));

        let copy = mine.clone();
        assert!(copy.contains(local));
    }

    #[test]
    fn test_display() {
        let mut table = LabelTable::new();
        for _ in 0..4 {
            table.define(None);
        }
        assert_eq!(table.define(None).to_string(), "L4");
        assert_eq!(InstrId(12).to_string(), "#12");
    }
}
