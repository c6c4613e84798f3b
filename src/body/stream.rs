//! Arena-backed instruction stream of one method body.
//!
//! # Architecture
//!
//! Instructions live in an append-only arena of slots. The logical order of the body
//! is a separate vector of [`InstrId`]s, and every live slot caches its current
//! position. Removing an instruction takes it out of the order but keeps its slot,
//! together with a forwarding handle to the instruction that followed it, so anything
//! still holding the id (a cursor, a pending label) can find its way back into the
//! live stream.
//!
//! Branch operands carry [`Label`]s that resolve through the stream's [`LabelTable`].
//! Because labels resolve by identity, inserting or removing code anywhere never
//! changes what a branch points at. The only edit that could break a branch is
//! removing its target, and that is checked before anything is mutated:
//!
//! - [`InstructionStream::remove_range`] refuses to remove a target that a surviving
//!   branch still references,
//! - [`InstructionStream::remove_range_redirect`] moves such targets to the next
//!   surviving instruction instead.
//!
//! Either way, a label that no branch references simply moves along to the next
//! survivor.

use std::{collections::HashSet, fmt, mem};

use log::trace;

use crate::{
    assembly::{Instruction, OpCode, Operand},
    body::label::{InstrId, Label, LabelTable},
    metadata::member::TypeRef,
    Result,
};

/// A local variable declared by a method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    /// Index used by `ldloc` / `stloc`
    pub index: u16,
    /// Declared type
    pub var_type: TypeRef,
}

#[derive(Debug, Clone)]
struct Slot {
    instr: Instruction,
    /// Current logical position, `None` once removed
    pos: Option<usize>,
    /// Instruction that followed this one when it was removed
    forward: Option<InstrId>,
}

/// The ordered instruction sequence of one method body, plus its labels and locals.
///
/// # Examples
///
/// ```rust
/// use cilpatch::assembly::{Instruction, OpCode};
/// use cilpatch::body::InstructionStream;
///
/// let mut stream = InstructionStream::new();
/// let ret = stream.push(Instruction::ret())?;
/// let target = stream.mark(0)?;
/// stream.insert_before(0, Instruction::branch(OpCode::BrS, target)?)?;
///
/// // The label followed `ret` to position 1
/// assert_eq!(stream.position_of(ret), Some(1));
/// assert_eq!(stream.label_position(target), Some(1));
///
/// // `ret` is still referenced, so it cannot simply be removed
/// assert!(stream.remove_range(1, 1).is_err());
/// # Ok::<(), cilpatch::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct InstructionStream {
    owner: String,
    slots: Vec<Slot>,
    order: Vec<InstrId>,
    labels: LabelTable,
    locals: Vec<LocalVariable>,
    entry: Label,
}

impl Default for InstructionStream {
    fn default() -> Self {
        Self::new()
    }
}

impl InstructionStream {
    /// Creates an empty stream.
    #[must_use]
    pub fn new() -> Self {
        let mut labels = LabelTable::new();
        let entry = labels.define(None);
        InstructionStream {
            owner: String::new(),
            slots: Vec::new(),
            order: Vec::new(),
            labels,
            locals: Vec::new(),
            entry,
        }
    }

    /// Returns the identity of the method owning this body, used in error messages.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Sets the identity of the owning method.
    pub fn set_owner(&mut self, owner: impl Into<String>) {
        self.owner = owner.into();
    }

    /// Returns the number of live instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if the body has no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns the instruction at `pos`.
    #[must_use]
    pub fn get(&self, pos: usize) -> Option<&Instruction> {
        self.order
            .get(pos)
            .map(|id| &self.slots[id.index()].instr)
    }

    /// Returns the slot identity of the instruction at `pos`.
    #[must_use]
    pub fn id_at(&self, pos: usize) -> Option<InstrId> {
        self.order.get(pos).copied()
    }

    /// Returns the instruction held by `id`, if it is still part of the stream.
    #[must_use]
    pub fn instruction(&self, id: InstrId) -> Option<&Instruction> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.pos.is_some())
            .map(|slot| &slot.instr)
    }

    /// Iterates over the live instructions in order.
    pub fn iter(&self) -> impl Iterator<Item = &Instruction> + '_ {
        self.order.iter().map(|id| &self.slots[id.index()].instr)
    }

    /// Returns the slot identities in order.
    #[must_use]
    pub fn ids(&self) -> &[InstrId] {
        &self.order
    }

    /// Returns the current position of `id`, or `None` if it was removed.
    #[must_use]
    pub fn position_of(&self, id: InstrId) -> Option<usize> {
        self.slots.get(id.index()).and_then(|slot| slot.pos)
    }

    /// Follows the forwarding chain of a removed slot to the live instruction that now
    /// stands in its place. Returns `None` if that place is the end of the stream.
    #[must_use]
    pub fn resolve(&self, id: InstrId) -> Option<InstrId> {
        let mut current = id;
        loop {
            let slot = self.slots.get(current.index())?;
            if slot.pos.is_some() {
                return Some(current);
            }
            current = slot.forward?;
        }
    }

    /// Returns the label that always resolves to the first instruction.
    #[must_use]
    pub fn entry(&self) -> Label {
        self.entry
    }

    /// Returns the label table.
    #[must_use]
    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Allocates a new, unbound label.
    pub fn define_label(&mut self) -> Label {
        self.labels.define(None)
    }

    /// Allocates a label bound to the instruction at `pos`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is not an instruction position.
    pub fn mark(&mut self, pos: usize) -> Result<Label> {
        let id = self
            .id_at(pos)
            .ok_or_else(|| out_of_bounds_error!(pos, self.len()))?;
        Ok(self.labels.define(Some(id)))
    }

    /// Binds `label` to the instruction at `pos`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is not an instruction position, or
    /// [`crate::Error::DanglingBranchTarget`] if the label belongs to another stream.
    pub fn bind_label(&mut self, label: Label, pos: usize) -> Result<()> {
        if !self.labels.contains(label) {
            return Err(dangling_error!(
                self.owner,
                label,
                "label does not belong to this stream"
            ));
        }
        let id = self
            .id_at(pos)
            .ok_or_else(|| out_of_bounds_error!(pos, self.len()))?;
        self.labels.bind(label, Some(id));
        Ok(())
    }

    pub(crate) fn bind_label_to(&mut self, label: Label, target: Option<InstrId>) {
        self.labels.bind(label, target);
    }

    /// Returns the slot `label` resolves to.
    #[must_use]
    pub fn label_target(&self, label: Label) -> Option<InstrId> {
        self.labels.target(label)
    }

    /// Returns the current position `label` resolves to.
    #[must_use]
    pub fn label_position(&self, label: Label) -> Option<usize> {
        self.labels.target(label).and_then(|id| self.position_of(id))
    }

    /// Returns every label bound to `id`, excluding the entry label.
    #[must_use]
    pub fn labels_at(&self, id: InstrId) -> Vec<Label> {
        let mut labels = self.labels.labels_at(id);
        labels.retain(|label| *label != self.entry);
        labels
    }

    /// Returns true if some branch in the stream targets the instruction at `pos`.
    #[must_use]
    pub fn is_branch_target(&self, pos: usize) -> bool {
        let Some(id) = self.id_at(pos) else {
            return false;
        };
        let referenced = self.referenced_labels(&HashSet::new());
        self.labels
            .labels_at(id)
            .iter()
            .any(|label| referenced.contains(label))
    }

    /// Appends an instruction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingBranchTarget`] if the instruction references a label
    /// of another stream.
    pub fn push(&mut self, instr: Instruction) -> Result<InstrId> {
        self.insert_before(self.len(), instr)
    }

    /// Inserts an instruction so that it ends up at `pos`. `pos == len()` appends.
    ///
    /// Labels bound to the instruction previously at `pos` stay on it, so existing
    /// branches skip the inserted code.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if `pos > len()`, or
    /// [`crate::Error::DanglingBranchTarget`] if the instruction references a label of
    /// another stream.
    pub fn insert_before(&mut self, pos: usize, instr: Instruction) -> Result<InstrId> {
        if pos > self.len() {
            return Err(out_of_bounds_error!(pos, self.len()));
        }
        self.check_labels(&instr)?;

        let id = InstrId(self.slots.len() as u32);
        trace!("{}: insert {} at {}", self.owner, instr, pos);
        self.slots.push(Slot {
            instr,
            pos: None,
            forward: None,
        });
        self.order.insert(pos, id);
        self.reindex(pos);
        Ok(id)
    }

    /// Inserts an instruction directly after the one at `pos`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is not an instruction position.
    pub fn insert_after(&mut self, pos: usize, instr: Instruction) -> Result<InstrId> {
        if pos >= self.len() {
            return Err(out_of_bounds_error!(pos, self.len()));
        }
        self.insert_before(pos + 1, instr)
    }

    /// Removes `count` instructions starting at `pos` and returns them.
    ///
    /// Labels bound to a removed instruction move to the next surviving instruction (or
    /// become unbound at the end of the stream) as long as no surviving branch uses them.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::OutOfBounds`] if the range exceeds the stream
    /// - [`crate::Error::DanglingBranchTarget`] if a removed instruction is the target of
    ///   a surviving branch; the stream is left unchanged
    pub fn remove_range(&mut self, pos: usize, count: usize) -> Result<Vec<Instruction>> {
        self.remove(pos, count, false)
    }

    /// Removes `count` instructions starting at `pos`, redirecting every branch that
    /// targeted a removed instruction to the next surviving instruction.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::OutOfBounds`] if the range exceeds the stream
    /// - [`crate::Error::DanglingBranchTarget`] if a referenced target is removed and
    ///   nothing survives after the range; the stream is left unchanged
    pub fn remove_range_redirect(&mut self, pos: usize, count: usize) -> Result<Vec<Instruction>> {
        self.remove(pos, count, true)
    }

    fn remove(&mut self, pos: usize, count: usize, redirect: bool) -> Result<Vec<Instruction>> {
        let end = pos
            .checked_add(count)
            .filter(|end| *end <= self.len())
            .ok_or_else(|| out_of_bounds_error!(pos.saturating_add(count), self.len()))?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let removed: HashSet<InstrId> = self.order[pos..end].iter().copied().collect();
        let survivor = self.order.get(end).copied();
        let referenced = self.referenced_labels(&removed);

        for (label, target) in self.labels.iter() {
            let Some(target) = target.filter(|t| removed.contains(t)) else {
                continue;
            };
            if !referenced.contains(&label) {
                continue;
            }
            if !redirect {
                return Err(dangling_error!(
                    self.owner,
                    label,
                    "instruction {} at position {} is removed while a branch still targets it",
                    target,
                    self.position_of(target).unwrap_or(pos)
                ));
            }
            if survivor.is_none() {
                return Err(dangling_error!(
                    self.owner,
                    label,
                    "no instruction survives after the removed range to redirect to"
                ));
            }
        }

        let drained: Vec<InstrId> = self.order.drain(pos..end).collect();
        let mut instructions = Vec::with_capacity(drained.len());
        for id in drained {
            self.labels.retarget(id, survivor);
            let slot = &mut self.slots[id.index()];
            slot.pos = None;
            slot.forward = survivor;
            instructions.push(slot.instr.clone());
        }
        self.reindex(pos);

        trace!(
            "{}: removed {} instruction(s) at {}{}",
            self.owner,
            count,
            pos,
            if redirect { " (redirected)" } else { "" }
        );
        Ok(instructions)
    }

    /// Replaces the instruction at `pos`, keeping the slot identity and every label on
    /// it. Returns the previous instruction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is not an instruction position, or
    /// [`crate::Error::DanglingBranchTarget`] if the new instruction references a label of
    /// another stream.
    pub fn replace(&mut self, pos: usize, instr: Instruction) -> Result<Instruction> {
        let id = self
            .id_at(pos)
            .ok_or_else(|| out_of_bounds_error!(pos, self.len()))?;
        self.check_labels(&instr)?;
        trace!("{}: replace {} with {}", self.owner, self.slots[id.index()].instr, instr);
        Ok(mem::replace(&mut self.slots[id.index()].instr, instr))
    }

    /// Replaces the operand of the instruction at `pos`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] for a bad position and
    /// [`crate::Error::InvalidOperand`] if the operand does not fit the opcode.
    pub fn replace_operand(&mut self, pos: usize, operand: Operand) -> Result<()> {
        let instr = self
            .get(pos)
            .ok_or_else(|| out_of_bounds_error!(pos, self.len()))?
            .with_operand(operand)?;
        self.replace(pos, instr).map(|_| ())
    }

    /// Replaces the opcode of the instruction at `pos`, keeping its operand.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] for a bad position and
    /// [`crate::Error::InvalidOperand`] if the operand does not fit the new opcode.
    pub fn replace_opcode(&mut self, pos: usize, opcode: OpCode) -> Result<()> {
        let instr = self
            .get(pos)
            .ok_or_else(|| out_of_bounds_error!(pos, self.len()))?
            .with_opcode(opcode)?;
        self.replace(pos, instr).map(|_| ())
    }

    /// Declares a new local variable and returns its index.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the body already has 65535 locals.
    pub fn add_local(&mut self, var_type: TypeRef) -> Result<u16> {
        let index = u16::try_from(self.locals.len())
            .ok()
            .filter(|index| *index < u16::MAX)
            .ok_or_else(|| malformed_error!("Too many locals in {}", self.owner))?;
        self.locals.push(LocalVariable { index, var_type });
        Ok(index)
    }

    /// Returns the declared local variables.
    #[must_use]
    pub fn locals(&self) -> &[LocalVariable] {
        &self.locals
    }

    /// Checks that every label referenced by a branch resolves to a live instruction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingBranchTarget`] for the first violation found.
    pub fn validate(&self) -> Result<()> {
        for (pos, instr) in self.iter().enumerate() {
            for label in instr.targets() {
                if !self.labels.contains(label) {
                    return Err(dangling_error!(
                        self.owner,
                        label,
                        "'{}' at position {} uses a label of another stream",
                        instr,
                        pos
                    ));
                }
                match self.labels.target(label) {
                    None => {
                        return Err(dangling_error!(
                            self.owner,
                            label,
                            "'{}' at position {} targets an unbound label",
                            instr,
                            pos
                        ))
                    }
                    Some(target) if self.position_of(target).is_none() => {
                        return Err(dangling_error!(
                            self.owner,
                            label,
                            "'{}' at position {} targets removed instruction {}",
                            instr,
                            pos,
                            target
                        ))
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }

    /// Returns the byte offset of every instruction, followed by the total code size.
    #[must_use]
    pub fn byte_offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.len() + 1);
        let mut offset = 0;
        for instr in self.iter() {
            offsets.push(offset);
            offset += instr.encoded_size();
        }
        offsets.push(offset);
        offsets
    }

    /// Returns the encoded size of the body's code in bytes.
    #[must_use]
    pub fn code_size(&self) -> usize {
        self.iter().map(Instruction::encoded_size).sum()
    }

    fn referenced_labels(&self, skip: &HashSet<InstrId>) -> HashSet<Label> {
        self.order
            .iter()
            .filter(|id| !skip.contains(id))
            .flat_map(|id| self.slots[id.index()].instr.targets())
            .collect()
    }

    fn check_labels(&self, instr: &Instruction) -> Result<()> {
        match instr.targets().into_iter().find(|l| !self.labels.contains(*l)) {
            Some(label) => Err(dangling_error!(
                self.owner,
                label,
                "'{}' uses a label that does not belong to this stream",
                instr
            )),
            None => Ok(()),
        }
    }

    fn reindex(&mut self, from: usize) {
        for pos in from..self.order.len() {
            let id = self.order[pos];
            self.slots[id.index()].pos = Some(pos);
        }
        let first = self.order.first().copied();
        self.labels.bind(self.entry, first);
    }
}

impl fmt::Display for InstructionStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let offsets = self.byte_offsets();
        for (pos, id) in self.order.iter().enumerate() {
            for label in self.labels_at(*id) {
                writeln!(f, "{label}:")?;
            }
            writeln!(
                f,
                "  IL_{:04x}: {}",
                offsets[pos],
                self.slots[id.index()].instr
            )?;
        }
        Ok(())
    }
}
