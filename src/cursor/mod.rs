//! Navigation cursors with edit primitives.
//!
//! # Architecture
//!
//! A [`Cursor`] sits *between* two instructions of a method body: it points at the
//! instruction after it (its "current" instruction) or at the end of the body. The
//! position is stored as an [`InstrId`], not an index, so inserting or removing code
//! through any cursor never invalidates another one. A cursor whose current instruction
//! is removed follows the stream's forwarding handle to the next survivor.
//!
//! All cursors of a body share one [`MethodEditor`], which owns the stream behind a
//! `RefCell`. Every cursor call borrows the stream for its own duration only.
//!
//! # Searching
//!
//! [`Cursor::goto_next`] / [`Cursor::goto_prev`] move to the next / previous match of a
//! [`Pattern`] and fail with [`crate::Error::PatternNotFound`] otherwise; the `try_`
//! variants return `false` and leave the cursor where it was. Where the cursor lands is
//! chosen with [`MoveType`]:
//!
//! - `Before` - before the first matched instruction; branches to it skip emitted code
//! - `AfterLabel` - same position, but the next emit takes over every label on the
//!   matched instruction, so branches land on the emitted code
//! - `After` - after the last matched instruction
//!
//! Repeating a forward search after landing `Before` / `AfterLabel` continues behind
//! the previous match, so loops over all matches always make progress.
//!
//! # Editing
//!
//! Edits happen at the cursor and leave it after the edited code: emitted instructions
//! end up before the cursor, replaced instructions are stepped over.
//!
//! # Examples
//!
//! ```rust
//! use cilpatch::assembly::{Instruction, OpCode};
//! use cilpatch::body::InstructionStream;
//! use cilpatch::cursor::{MethodEditor, MoveType};
//! use cilpatch::metadata::Token;
//! use cilpatch::pattern::Predicate;
//!
//! let mut stream = InstructionStream::new();
//! stream.push(Instruction::ldarg(0))?;
//! stream.push(Instruction::ldc_i4(5))?;
//! stream.push(Instruction::ret())?;
//!
//! let editor = MethodEditor::new(Token::method_def(1), "Demo::Run", stream);
//! let mut cursor = editor.cursor();
//! cursor.goto_next(MoveType::After, Predicate::int(5))?;
//! cursor.emit(Instruction::pop())?;
//! cursor.emit(Instruction::ldc_i4(10))?;
//!
//! assert_eq!(cursor.index(), 4);
//! assert_eq!(editor.stream().get(2), Some(&Instruction::pop()));
//! # Ok::<(), cilpatch::Error>(())
//! ```

mod editor;

use log::trace;
use strum::Display;

pub use editor::MethodEditor;

use crate::{
    assembly::{Instruction, OpCode, Operand},
    body::{InstrId, InstructionStream, Label},
    metadata::TypeRef,
    pattern::{Match, Pattern},
    Error, Result,
};

/// Where a successful search leaves the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum MoveType {
    /// Before the match; labels stay on the matched instruction
    #[default]
    Before,
    /// After the last matched instruction
    After,
    /// Before the match; the next emit takes over the matched instruction's labels
    AfterLabel,
}

/// A movable position within one method body.
#[derive(Clone, Debug)]
pub struct Cursor<'a> {
    editor: &'a MethodEditor,
    next: Option<InstrId>,
    pending: Vec<Label>,
    last_match: Option<(InstrId, MoveType)>,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(editor: &'a MethodEditor) -> Self {
        let next = read_stream!(editor).id_at(0);
        Cursor {
            editor,
            next,
            pending: Vec::new(),
            last_match: None,
        }
    }

    /// Returns the editor this cursor works on.
    #[must_use]
    pub fn editor(&self) -> &'a MethodEditor {
        self.editor
    }

    /// Returns the identity of the edited method.
    #[must_use]
    pub fn method(&self) -> &'a str {
        self.editor.method()
    }

    /// Returns the current position: the index of the instruction after the cursor.
    #[must_use]
    pub fn index(&self) -> usize {
        let stream = read_stream!(self.editor);
        self.position_in(&stream)
    }

    /// Returns true if the cursor is past the last instruction.
    #[must_use]
    pub fn is_at_end(&self) -> bool {
        let stream = read_stream!(self.editor);
        self.position_in(&stream) == stream.len()
    }

    /// Returns the instruction after the cursor.
    #[must_use]
    pub fn current(&self) -> Option<Instruction> {
        let stream = read_stream!(self.editor);
        stream.get(self.position_in(&stream)).cloned()
    }

    /// Returns the identity of the instruction after the cursor.
    #[must_use]
    pub fn current_id(&self) -> Option<InstrId> {
        let stream = read_stream!(self.editor);
        stream.id_at(self.position_in(&stream))
    }

    /// Returns the instruction before the cursor.
    #[must_use]
    pub fn previous(&self) -> Option<Instruction> {
        let stream = read_stream!(self.editor);
        self.position_in(&stream)
            .checked_sub(1)
            .and_then(|pos| stream.get(pos))
            .cloned()
    }

    /// Returns the labels bound to the instruction after the cursor.
    #[must_use]
    pub fn incoming_labels(&self) -> Vec<Label> {
        let stream = read_stream!(self.editor);
        stream
            .id_at(self.position_in(&stream))
            .map(|id| stream.labels_at(id))
            .unwrap_or_default()
    }

    /// Returns the declared type of local `index`.
    #[must_use]
    pub fn local_type(&self, index: u16) -> Option<TypeRef> {
        read_stream!(self.editor)
            .locals()
            .get(usize::from(index))
            .map(|local| local.var_type.clone())
    }

    /// Steps over the current instruction and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] at the end of the body.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Instruction> {
        let editor = self.editor;
        let stream = read_stream!(editor);
        let pos = self.position_in(&stream);
        let instr = stream
            .get(pos)
            .cloned()
            .ok_or_else(|| out_of_bounds_error!(pos, stream.len()))?;
        self.place(&stream, pos + 1);
        self.reset();
        Ok(instr)
    }

    /// Steps back over the previous instruction and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] at the start of the body.
    pub fn prev(&mut self) -> Result<Instruction> {
        let editor = self.editor;
        let stream = read_stream!(editor);
        let pos = self.position_in(&stream);
        let target = pos
            .checked_sub(1)
            .ok_or_else(|| out_of_bounds_error!(0, stream.len()))?;
        let instr = stream
            .get(target)
            .cloned()
            .ok_or_else(|| out_of_bounds_error!(target, stream.len()))?;
        self.place(&stream, target);
        self.reset();
        Ok(instr)
    }

    /// Moves to `index`; `index == len` is the end of the body.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if `index > len`.
    pub fn goto(&mut self, index: usize) -> Result<()> {
        let editor = self.editor;
        let stream = read_stream!(editor);
        if index > stream.len() {
            return Err(out_of_bounds_error!(index, stream.len()));
        }
        self.place(&stream, index);
        self.reset();
        Ok(())
    }

    /// Moves before the first instruction.
    pub fn goto_start(&mut self) {
        let editor = self.editor;
        let stream = read_stream!(editor);
        self.place(&stream, 0);
        self.reset();
    }

    /// Moves past the last instruction.
    pub fn goto_end(&mut self) {
        self.next = None;
        self.reset();
    }

    /// Moves before the instruction `label` resolves to.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingBranchTarget`] if the label is not bound.
    pub fn goto_label(&mut self, label: Label) -> Result<()> {
        let editor = self.editor;
        let stream = read_stream!(editor);
        let pos = stream
            .label_position(label)
            .ok_or_else(|| dangling_error!(editor.method(), label, "label is not bound"))?;
        self.place(&stream, pos);
        self.reset();
        Ok(())
    }

    /// Moves to the next match of `pattern`, searching from the cursor onwards.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PatternNotFound`] if nothing matches; the cursor does not
    /// move.
    pub fn goto_next(&mut self, move_type: MoveType, pattern: impl Into<Pattern>) -> Result<()> {
        let pattern = pattern.into();
        if self.seek_next(move_type, &pattern) {
            Ok(())
        } else {
            Err(self.not_found(&pattern))
        }
    }

    /// Like [`Cursor::goto_next`], returning `false` instead of failing.
    pub fn try_goto_next(&mut self, move_type: MoveType, pattern: impl Into<Pattern>) -> bool {
        self.seek_next(move_type, &pattern.into())
    }

    /// Moves to the closest match of `pattern` that starts before the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PatternNotFound`] if nothing matches; the cursor does not
    /// move.
    pub fn goto_prev(&mut self, move_type: MoveType, pattern: impl Into<Pattern>) -> Result<()> {
        let pattern = pattern.into();
        if self.seek_prev(move_type, &pattern) {
            Ok(())
        } else {
            Err(self.not_found(&pattern))
        }
    }

    /// Like [`Cursor::goto_prev`], returning `false` instead of failing.
    pub fn try_goto_prev(&mut self, move_type: MoveType, pattern: impl Into<Pattern>) -> bool {
        self.seek_prev(move_type, &pattern.into())
    }

    /// Returns a new cursor before the next match, leaving this one untouched.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PatternNotFound`] if nothing matches.
    pub fn find_next(&self, pattern: impl Into<Pattern>) -> Result<Cursor<'a>> {
        let pattern = pattern.into();
        let mut found = self.clone();
        if found.seek_next(MoveType::Before, &pattern) {
            Ok(found)
        } else {
            Err(self.not_found(&pattern))
        }
    }

    /// Like [`Cursor::find_next`], returning `None` instead of failing.
    #[must_use]
    pub fn try_find_next(&self, pattern: impl Into<Pattern>) -> Option<Cursor<'a>> {
        let mut found = self.clone();
        found
            .seek_next(MoveType::Before, &pattern.into())
            .then_some(found)
    }

    /// Moves to the next position where exactly one of several mutually exclusive code
    /// shapes matches, and returns the index of that shape.
    ///
    /// The earliest position where any variant matches is selected. If more than one
    /// variant matches there, the code shape is ambiguous and nothing moves.
    ///
    /// # Arguments
    ///
    /// * `move_type` - Where to land relative to the selected variant's match
    /// * `variants` - `(name, pattern)` pairs; names only appear in errors
    ///
    /// # Errors
    ///
    /// - [`crate::Error::PatternNotFound`] if no variant matches
    /// - [`crate::Error::AmbiguousVariant`] if several variants match at the same position
    pub fn goto_next_variant(
        &mut self,
        move_type: MoveType,
        variants: &[(&str, Pattern)],
    ) -> Result<usize> {
        let editor = self.editor;
        let stream = read_stream!(editor);
        let from = self.search_start(&stream);

        let earliest = variants
            .iter()
            .filter_map(|(_, pattern)| pattern.find(&stream, from))
            .map(|found| found.start)
            .min();
        let Some(start) = earliest else {
            let described = variants
                .iter()
                .map(|(name, pattern)| format!("{name}: {pattern}"))
                .collect::<Vec<_>>()
                .join(" or ");
            return Err(Error::PatternNotFound {
                method: editor.method().to_string(),
                pattern: format!("one of {{{described}}}"),
            });
        };

        let matching: Vec<(usize, Match)> = variants
            .iter()
            .enumerate()
            .filter_map(|(i, (_, pattern))| pattern.matches_at(&stream, start).map(|m| (i, m)))
            .collect();
        match matching.as_slice() {
            [(chosen, found)] => {
                let (chosen, found) = (*chosen, *found);
                trace!(
                    "{}: variant '{}' selected at {}",
                    editor.method(),
                    variants[chosen].0,
                    start
                );
                self.land(&stream, found, move_type);
                Ok(chosen)
            }
            _ => Err(Error::AmbiguousVariant {
                method: editor.method().to_string(),
                variants: matching
                    .iter()
                    .map(|(i, _)| variants[*i].0.to_string())
                    .collect(),
                position: start,
            }),
        }
    }

    /// Creates a label bound to the instruction after the cursor.
    ///
    /// The label stays on that instruction even when code is emitted before it. At the
    /// end of the body the label is taken by the next emitted instruction.
    pub fn mark(&mut self) -> Label {
        let editor = self.editor;
        let mut stream = write_stream!(editor);
        let label = stream.define_label();
        match stream.id_at(self.position_in(&stream)) {
            Some(id) => stream.bind_label_to(label, Some(id)),
            None => self.pending.push(label),
        }
        label
    }

    /// Creates a label for "whatever ends up at this point": it resolves to the
    /// instruction after the cursor until something is emitted here, and to the first
    /// emitted instruction afterwards.
    pub fn mark_label(&mut self) -> Label {
        let editor = self.editor;
        let mut stream = write_stream!(editor);
        let label = stream.define_label();
        let current = stream.id_at(self.position_in(&stream));
        stream.bind_label_to(label, current);
        self.pending.push(label);
        label
    }

    /// Inserts `instr` before the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingBranchTarget`] if the instruction references a label
    /// of another body.
    pub fn emit(&mut self, instr: Instruction) -> Result<InstrId> {
        let editor = self.editor;
        let mut stream = write_stream!(editor);
        let pos = self.position_in(&stream);
        let id = stream.insert_before(pos, instr)?;
        for label in self.pending.drain(..) {
            stream.bind_label_to(label, Some(id));
        }
        Ok(id)
    }

    /// Inserts every instruction of `instrs` before the cursor, in order.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first failing [`Cursor::emit`].
    pub fn emit_all(&mut self, instrs: impl IntoIterator<Item = Instruction>) -> Result<()> {
        for instr in instrs {
            self.emit(instr)?;
        }
        Ok(())
    }

    /// Inserts an operand-less instruction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidOperand`] if the opcode needs an operand.
    pub fn emit_op(&mut self, opcode: OpCode) -> Result<InstrId> {
        self.emit(Instruction::op(opcode)?)
    }

    /// Inserts a branch to `label`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidOperand`] if the opcode is not a branch.
    pub fn emit_branch(&mut self, opcode: OpCode, label: Label) -> Result<InstrId> {
        self.emit(Instruction::branch(opcode, label)?)
    }

    /// Removes `count` instructions after the cursor.
    ///
    /// Labels this cursor is about to hand to the next emit do not count as dangling.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingBranchTarget`] if a removed instruction is still the
    /// target of a surviving branch, or [`crate::Error::OutOfBounds`]. Nothing is removed
    /// on error.
    pub fn remove(&mut self, count: usize) -> Result<Vec<Instruction>> {
        self.remove_with(count, false)
    }

    /// Removes `count` instructions after the cursor, redirecting branches that targeted
    /// them to the instruction now after the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingBranchTarget`] if a referenced instruction is removed
    /// at the end of the body, or [`crate::Error::OutOfBounds`].
    pub fn remove_redirect(&mut self, count: usize) -> Result<Vec<Instruction>> {
        self.remove_with(count, true)
    }

    fn remove_with(&mut self, count: usize, redirect: bool) -> Result<Vec<Instruction>> {
        let editor = self.editor;
        let mut stream = write_stream!(editor);
        let pos = self.position_in(&stream);
        let end = pos.saturating_add(count);
        if end > stream.len() {
            return Err(out_of_bounds_error!(end, stream.len()));
        }

        let doomed: Vec<InstrId> = stream.ids()[pos..end].to_vec();
        let survivor = stream.id_at(end);
        let previous: Vec<(Label, Option<InstrId>)> = self
            .pending
            .iter()
            .map(|label| (*label, stream.label_target(*label)))
            .collect();
        for (label, target) in &previous {
            if target.is_some_and(|t| doomed.contains(&t)) {
                stream.bind_label_to(*label, survivor);
            }
        }

        let removed = if redirect {
            stream.remove_range_redirect(pos, count)
        } else {
            stream.remove_range(pos, count)
        };
        match removed {
            Ok(removed) => {
                self.place(&stream, pos);
                Ok(removed)
            }
            Err(e) => {
                for (label, target) in previous {
                    stream.bind_label_to(label, target);
                }
                Err(e)
            }
        }
    }

    /// Replaces the instruction after the cursor and steps over it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] at the end of the body.
    pub fn replace(&mut self, instr: Instruction) -> Result<Instruction> {
        let editor = self.editor;
        let mut stream = write_stream!(editor);
        let pos = self.position_in(&stream);
        let old = stream.replace(pos, instr)?;
        self.place(&stream, pos + 1);
        self.pending.clear();
        Ok(old)
    }

    /// Replaces the operand of the instruction after the cursor and steps over it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] at the end of the body and
    /// [`crate::Error::InvalidOperand`] if the operand does not fit.
    pub fn replace_operand(&mut self, operand: Operand) -> Result<()> {
        let editor = self.editor;
        let mut stream = write_stream!(editor);
        let pos = self.position_in(&stream);
        stream.replace_operand(pos, operand)?;
        self.place(&stream, pos + 1);
        self.pending.clear();
        Ok(())
    }

    /// Replaces the opcode of the instruction after the cursor and steps over it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] at the end of the body and
    /// [`crate::Error::InvalidOperand`] if the operand does not fit the new opcode.
    pub fn replace_opcode(&mut self, opcode: OpCode) -> Result<()> {
        let editor = self.editor;
        let mut stream = write_stream!(editor);
        let pos = self.position_in(&stream);
        stream.replace_opcode(pos, opcode)?;
        self.place(&stream, pos + 1);
        self.pending.clear();
        Ok(())
    }

    /// Declares a new local variable in the body.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the local table is full.
    pub fn add_local(&mut self, var_type: TypeRef) -> Result<u16> {
        write_stream!(self.editor).add_local(var_type)
    }

    fn position_in(&self, stream: &InstructionStream) -> usize {
        self.next
            .and_then(|id| stream.resolve(id))
            .and_then(|id| stream.position_of(id))
            .unwrap_or(stream.len())
    }

    fn place(&mut self, stream: &InstructionStream, pos: usize) {
        self.next = stream.id_at(pos);
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.last_match = None;
    }

    fn search_start(&self, stream: &InstructionStream) -> usize {
        let index = self.position_in(stream);
        match self.last_match {
            Some((start, MoveType::Before | MoveType::AfterLabel))
                if stream.id_at(index) == Some(start) =>
            {
                index + 1
            }
            _ => index,
        }
    }

    fn search_end(&self, stream: &InstructionStream) -> usize {
        let index = self.position_in(stream);
        match self.last_match {
            Some((start, MoveType::After)) => stream
                .position_of(start)
                .filter(|pos| *pos < index)
                .unwrap_or(index),
            _ => index,
        }
    }

    fn seek_next(&mut self, move_type: MoveType, pattern: &Pattern) -> bool {
        let editor = self.editor;
        let stream = read_stream!(editor);
        let from = self.search_start(&stream);
        match pattern.find(&stream, from) {
            Some(found) => {
                trace!("{}: {} matched at {}", editor.method(), pattern, found.start);
                self.land(&stream, found, move_type);
                true
            }
            None => false,
        }
    }

    fn seek_prev(&mut self, move_type: MoveType, pattern: &Pattern) -> bool {
        let editor = self.editor;
        let stream = read_stream!(editor);
        let before = self.search_end(&stream);
        match pattern.rfind(&stream, before) {
            Some(found) => {
                trace!("{}: {} matched at {}", editor.method(), pattern, found.start);
                self.land(&stream, found, move_type);
                true
            }
            None => false,
        }
    }

    fn land(&mut self, stream: &InstructionStream, found: Match, move_type: MoveType) {
        let start = stream.id_at(found.start);
        self.pending.clear();
        match move_type {
            MoveType::Before => self.place(stream, found.start),
            MoveType::AfterLabel => {
                self.place(stream, found.start);
                if let Some(id) = start {
                    self.pending = stream.labels_at(id);
                }
            }
            MoveType::After => self.place(stream, found.end),
        }
        self.last_match = start.map(|id| (id, move_type));
    }

    fn not_found(&self, pattern: &Pattern) -> Error {
        Error::PatternNotFound {
            method: self.editor.method().to_string(),
            pattern: pattern.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{body::BodyBuilder, metadata::Token, pattern::Predicate};

    /// ```text
    /// 0: ldarg.0
    /// 1: brtrue.s skip
    /// 2: ldc.i4.1
    /// 3: pop
    /// 4: skip: ldc.i4.2
    /// 5: pop
    /// 6: ret
    /// ```
    fn editor() -> MethodEditor {
        let mut body = BodyBuilder::new();
        body.emit(Instruction::ldarg(0))
            .unwrap()
            .emit_branch(OpCode::BrtrueS, "skip")
            .unwrap()
            .emit(Instruction::ldc_i4(1))
            .unwrap()
            .emit(Instruction::pop())
            .unwrap()
            .define_label("skip")
            .unwrap()
            .emit(Instruction::ldc_i4(2))
            .unwrap()
            .emit(Instruction::pop())
            .unwrap()
            .emit(Instruction::ret())
            .unwrap();
        MethodEditor::new(Token::method_def(1), "Test::Run", body.build().unwrap())
    }

    fn branch_target_pos(editor: &MethodEditor) -> Option<usize> {
        let stream = editor.stream();
        let label = stream.get(1).and_then(Instruction::branch_target)?;
        stream.label_position(label)
    }

    #[test]
    fn test_goto_next_exact_position() {
        let editor = editor();
        let mut cursor = editor.cursor();
        cursor
            .goto_next(MoveType::Before, [Predicate::int(2), OpCode::Pop.into()])
            .unwrap();
        assert_eq!(cursor.index(), 4);

        cursor.goto_start();
        cursor.goto_next(MoveType::After, Predicate::int(2)).unwrap();
        assert_eq!(cursor.index(), 5);
    }

    #[test]
    fn test_try_goto_next_failure_leaves_everything() {
        let editor = editor();
        let mut cursor = editor.cursor();
        cursor.goto(2).unwrap();
        let before: Vec<Instruction> = editor.stream().iter().cloned().collect();

        assert!(!cursor.try_goto_next(MoveType::Before, Predicate::int(42)));
        assert_eq!(cursor.index(), 2);
        let after: Vec<Instruction> = editor.stream().iter().cloned().collect();
        assert_eq!(before, after);

        match cursor.goto_next(MoveType::Before, Predicate::int(42)) {
            Err(Error::PatternNotFound { method, pattern }) => {
                assert_eq!(method, "Test::Run");
                assert_eq!(pattern, "[ldc.i* 42]");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(cursor.index(), 2);
    }

    #[test]
    fn test_before_keeps_branch_on_original() {
        let editor = editor();
        let mut cursor = editor.cursor();
        cursor.goto_next(MoveType::Before, Predicate::int(2)).unwrap();
        cursor.emit(Instruction::nop()).unwrap();

        assert_eq!(branch_target_pos(&editor), Some(5));
        assert_eq!(cursor.current(), Some(Instruction::ldc_i4(2)));
    }

    #[test]
    fn test_after_label_moves_branch_to_emitted() {
        let editor = editor();
        let mut cursor = editor.cursor();
        cursor.goto_next(MoveType::AfterLabel, Predicate::int(2)).unwrap();
        cursor.emit(Instruction::nop()).unwrap();
        cursor.emit(Instruction::nop()).unwrap();

        assert_eq!(branch_target_pos(&editor), Some(4));
        assert_eq!(cursor.index(), 6);
        assert!(editor.validate().is_ok());
    }

    #[test]
    fn test_repeated_search_progresses() {
        let editor = editor();
        let mut cursor = editor.cursor();
        let mut hits = Vec::new();
        while cursor.try_goto_next(MoveType::Before, OpCode::Pop) {
            hits.push(cursor.index());
            cursor.emit(Instruction::dup()).unwrap();
        }
        assert_eq!(hits, vec![3, 6]);
    }

    #[test]
    fn test_goto_prev() {
        let editor = editor();
        let mut cursor = editor.cursor();
        cursor.goto_end();
        cursor.goto_prev(MoveType::Before, OpCode::Pop).unwrap();
        assert_eq!(cursor.index(), 5);
        cursor.goto_prev(MoveType::Before, OpCode::Pop).unwrap();
        assert_eq!(cursor.index(), 3);
        assert!(!cursor.try_goto_prev(MoveType::Before, OpCode::Pop));
        assert_eq!(cursor.index(), 3);

        cursor.goto_end();
        cursor.goto_prev(MoveType::After, OpCode::Pop).unwrap();
        assert_eq!(cursor.index(), 6);
        cursor.goto_prev(MoveType::After, OpCode::Pop).unwrap();
        assert_eq!(cursor.index(), 4);
    }

    #[test]
    fn test_find_next_does_not_move() {
        let editor = editor();
        let cursor = editor.cursor();
        let found = cursor.find_next(OpCode::Ret).unwrap();
        assert_eq!(found.index(), 6);
        assert_eq!(cursor.index(), 0);
        assert!(cursor.try_find_next(OpCode::Throw).is_none());
    }

    #[test]
    fn test_cursors_share_edits() {
        let editor = editor();
        let mut first = editor.cursor();
        let mut second = editor.cursor();
        second.goto_next(MoveType::Before, OpCode::Ret).unwrap();
        assert_eq!(second.index(), 6);

        first.emit(Instruction::nop()).unwrap();
        first.emit(Instruction::nop()).unwrap();
        assert_eq!(second.index(), 8);
        assert_eq!(second.current(), Some(Instruction::ret()));
    }

    #[test]
    fn test_cursor_on_removed_instruction() {
        let editor = editor();
        let mut parked = editor.cursor();
        parked.goto(5).unwrap();

        let mut other = editor.cursor();
        other.goto(5).unwrap();
        other.remove(1).unwrap();

        assert_eq!(parked.index(), 5);
        assert_eq!(parked.current(), Some(Instruction::ret()));
    }

    #[test]
    fn test_remove_branch_target_rejected_then_redirected() {
        let editor = editor();
        let mut cursor = editor.cursor();
        cursor.goto(4).unwrap();
        assert!(matches!(
            cursor.remove(2),
            Err(Error::DanglingBranchTarget { .. })
        ));
        assert_eq!(editor.len(), 7);

        cursor.remove_redirect(2).unwrap();
        assert_eq!(branch_target_pos(&editor), Some(4));
        assert_eq!(cursor.current(), Some(Instruction::ret()));
    }

    #[test]
    fn test_after_label_then_remove_then_emit() {
        let editor = editor();
        let mut cursor = editor.cursor();
        cursor.goto_next(MoveType::AfterLabel, Predicate::int(2)).unwrap();
        cursor.remove(2).unwrap();
        cursor.emit(Instruction::ldc_i4(3)).unwrap();

        assert_eq!(branch_target_pos(&editor), Some(4));
        assert_eq!(editor.stream().get(4), Some(&Instruction::ldc_i4(3)));
        assert!(editor.validate().is_ok());
    }

    #[test]
    fn test_mark_label_follows_emit() {
        let editor = editor();
        let mut cursor = editor.cursor();
        cursor.goto(6).unwrap();
        let marked = cursor.mark();
        let follows = cursor.mark_label();
        cursor.emit(Instruction::nop()).unwrap();

        let stream = editor.stream();
        assert_eq!(stream.label_position(marked), Some(7));
        assert_eq!(stream.label_position(follows), Some(6));
    }

    #[test]
    fn test_goto_label_and_branch() {
        let editor = editor();
        let mut cursor = editor.cursor();
        cursor.goto(6).unwrap();
        let exit = cursor.mark();

        cursor.goto_start();
        cursor.emit(Instruction::ldarg(0)).unwrap();
        cursor.emit_branch(OpCode::BrfalseS, exit).unwrap();
        cursor.goto_label(exit).unwrap();
        assert_eq!(cursor.current(), Some(Instruction::ret()));
        assert_eq!(cursor.index(), 8);
    }

    #[test]
    fn test_replace_advances() {
        let editor = editor();
        let mut cursor = editor.cursor();
        cursor.goto_next(MoveType::Before, OpCode::BrtrueS).unwrap();
        cursor.replace_opcode(OpCode::Brfalse).unwrap();
        assert_eq!(cursor.index(), 2);
        assert_eq!(cursor.previous().map(|i| i.opcode()), Some(OpCode::Brfalse));
        assert_eq!(branch_target_pos(&editor), Some(4));

        cursor.replace_operand(Operand::Int(100)).unwrap_err();
        cursor.replace(Instruction::ldc_i4(9)).unwrap();
        assert_eq!(cursor.index(), 3);
    }

    #[test]
    fn test_linear_movement() {
        let editor = editor();
        let mut cursor = editor.cursor();
        assert!(cursor.prev().is_err());
        assert_eq!(cursor.next().unwrap(), Instruction::ldarg(0));
        assert_eq!(cursor.prev().unwrap(), Instruction::ldarg(0));
        cursor.goto_end();
        assert!(cursor.is_at_end());
        assert!(cursor.next().is_err());
        assert!(cursor.goto(8).is_err());
    }

    #[test]
    fn test_variant_selection() {
        let editor = editor();
        let mut cursor = editor.cursor();
        let variants = [
            ("short", Pattern::new([Predicate::op(OpCode::BrtrueS)])),
            ("long", Pattern::new([Predicate::op(OpCode::Brtrue)])),
        ];
        assert_eq!(cursor.goto_next_variant(MoveType::After, &variants).unwrap(), 0);
        assert_eq!(cursor.index(), 2);

        let ambiguous = [
            ("branch", Pattern::new([Predicate::branch()])),
            ("short", Pattern::new([Predicate::op(OpCode::BrtrueS)])),
        ];
        cursor.goto_start();
        match cursor.goto_next_variant(MoveType::Before, &ambiguous) {
            Err(Error::AmbiguousVariant {
                variants, position, ..
            }) => {
                assert_eq!(variants, vec!["branch", "short"]);
                assert_eq!(position, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(cursor.index(), 0);

        let missing = [("throw", Pattern::new([Predicate::op(OpCode::Throw)]))];
        assert!(matches!(
            cursor.goto_next_variant(MoveType::Before, &missing),
            Err(Error::PatternNotFound { .. })
        ));
    }

    #[test]
    fn test_add_local() {
        let editor = editor();
        let mut cursor = editor.cursor();
        let index = cursor.add_local(TypeRef::boolean()).unwrap();
        assert_eq!(cursor.local_type(index), Some(TypeRef::boolean()));
        assert_eq!(cursor.local_type(index + 1), None);
    }
}
