//! Predicate-sequence pattern matching over instruction streams.
//!
//! # Architecture
//!
//! A [`Pattern`] is an ordered list of [`Predicate`]s. It matches at position `P` when
//! predicate `i` accepts the instruction at `P + i` for every `i`. Matching is greedy and
//! never backtracks: when a predicate fails, the whole window fails and the search
//! moves the start position by one. The cost is bounded by stream length times pattern
//! length, which is plenty for method bodies of a few hundred instructions.
//!
//! With [`Pattern::skipping_nops`], `nop` instructions between matched positions are
//! treated as label-only markers and stepped over, unless the next predicate itself
//! accepts the `nop`.
//!
//! # Examples
//!
//! ```rust
//! use cilpatch::assembly::{Instruction, OpCode};
//! use cilpatch::body::InstructionStream;
//! use cilpatch::pattern::{Pattern, Predicate};
//!
//! let mut stream = InstructionStream::new();
//! stream.push(Instruction::ldarg(0))?;
//! stream.push(Instruction::ldc_i4(1))?;
//! stream.push(Instruction::nop())?;
//! stream.push(Instruction::ret())?;
//!
//! let pattern = Pattern::new([Predicate::int(1), Predicate::op(OpCode::Ret)]).skipping_nops();
//! let found = pattern.find(&stream, 0).unwrap();
//! assert_eq!((found.start, found.end), (1, 4));
//! # Ok::<(), cilpatch::Error>(())
//! ```

mod predicate;

use std::fmt;

pub use predicate::Predicate;

use crate::{
    assembly::{Instruction, OpCode},
    body::InstructionStream,
};

/// A successful pattern match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Position of the first matched instruction
    pub start: usize,
    /// Position just after the last matched instruction
    pub end: usize,
}

impl Match {
    /// Returns the number of positions the match spans, skipped `nop`s included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true for the match of an empty pattern.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// An ordered sequence of predicates.
#[derive(Clone, Debug)]
pub struct Pattern {
    predicates: Vec<Predicate>,
    skip_nops: bool,
}

impl Pattern {
    /// Creates a pattern from predicates.
    pub fn new(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Pattern {
            predicates: predicates.into_iter().collect(),
            skip_nops: false,
        }
    }

    /// Steps over `nop`s between matched positions.
    #[must_use]
    pub fn skipping_nops(mut self) -> Self {
        self.skip_nops = true;
        self
    }

    /// Returns the predicates.
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Returns the number of predicates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// Returns true if the pattern has no predicates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Tests whether the pattern matches starting exactly at `pos`.
    #[must_use]
    pub fn matches_at(&self, stream: &InstructionStream, pos: usize) -> Option<Match> {
        if pos > stream.len() {
            return None;
        }

        let mut cursor = pos;
        for (i, predicate) in self.predicates.iter().enumerate() {
            if i > 0 && self.skip_nops {
                while let Some(instr) = stream.get(cursor) {
                    if !Self::is_skippable(instr, predicate) {
                        break;
                    }
                    cursor += 1;
                }
            }
            let instr = stream.get(cursor)?;
            if !predicate.accepts(instr) {
                return None;
            }
            cursor += 1;
        }

        Some(Match {
            start: pos,
            end: cursor,
        })
    }

    /// Finds the first match starting at or after `from`.
    #[must_use]
    pub fn find(&self, stream: &InstructionStream, from: usize) -> Option<Match> {
        (from..=stream.len()).find_map(|pos| self.matches_at(stream, pos))
    }

    /// Finds the closest match starting strictly before `before`.
    #[must_use]
    pub fn rfind(&self, stream: &InstructionStream, before: usize) -> Option<Match> {
        let upper = before.min(stream.len() + 1);
        (0..upper).rev().find_map(|pos| self.matches_at(stream, pos))
    }

    /// Returns every non-overlapping match, front to back.
    #[must_use]
    pub fn find_all(&self, stream: &InstructionStream) -> Vec<Match> {
        let mut matches = Vec::new();
        let mut from = 0;
        while let Some(found) = self.find(stream, from) {
            matches.push(found);
            from = found.end.max(found.start + 1);
        }
        matches
    }

    fn is_skippable(instr: &Instruction, next: &Predicate) -> bool {
        instr.opcode() == OpCode::Nop && !next.accepts(instr)
    }
}

impl<const N: usize> From<[Predicate; N]> for Pattern {
    fn from(predicates: [Predicate; N]) -> Self {
        Pattern::new(predicates)
    }
}

impl From<Predicate> for Pattern {
    fn from(predicate: Predicate) -> Self {
        Pattern::new([predicate])
    }
}

impl From<OpCode> for Pattern {
    fn from(opcode: OpCode) -> Self {
        Pattern::new([Predicate::op(opcode)])
    }
}

impl From<Vec<Predicate>> for Pattern {
    fn from(predicates: Vec<Predicate>) -> Self {
        Pattern::new(predicates)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, predicate) in self.predicates.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{predicate}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::OpClass;

    fn stream_of(instrs: Vec<Instruction>) -> InstructionStream {
        let mut stream = InstructionStream::new();
        for instr in instrs {
            stream.push(instr).unwrap();
        }
        stream
    }

    #[test]
    fn test_find_first_match() {
        let stream = stream_of(vec![
            Instruction::ldc_i4(1),
            Instruction::pop(),
            Instruction::ldc_i4(1),
            Instruction::ret(),
            Instruction::ldc_i4(1),
            Instruction::ret(),
        ]);
        let pattern = Pattern::new([Predicate::int(1), OpCode::Ret.into()]);

        assert_eq!(pattern.find(&stream, 0), Some(Match { start: 2, end: 4 }));
        assert_eq!(pattern.find(&stream, 3), Some(Match { start: 4, end: 6 }));
        assert_eq!(pattern.find(&stream, 5), None);
        assert_eq!(pattern.rfind(&stream, 4), Some(Match { start: 2, end: 4 }));
        assert_eq!(pattern.rfind(&stream, 2), None);
        assert_eq!(pattern.find_all(&stream).len(), 2);
    }

    #[test]
    fn test_no_backtracking() {
        // a window that fails half way restarts one position later
        let stream = stream_of(vec![
            Instruction::ldc_i4(1),
            Instruction::ldc_i4(1),
            Instruction::ldc_i4(2),
        ]);
        let pattern = Pattern::new([Predicate::int(1), Predicate::int(2)]);
        assert_eq!(pattern.find(&stream, 0), Some(Match { start: 1, end: 3 }));
    }

    #[test]
    fn test_skipping_nops() {
        let stream = stream_of(vec![
            Instruction::ldarg(0),
            Instruction::nop(),
            Instruction::nop(),
            Instruction::ret(),
        ]);
        let strict = Pattern::new([Predicate::ldarg(0), OpCode::Ret.into()]);
        assert_eq!(strict.find(&stream, 0), None);

        let lenient = strict.clone().skipping_nops();
        let found = lenient.find(&stream, 0).unwrap();
        assert_eq!(found, Match { start: 0, end: 4 });
        assert_eq!(found.len(), 4);

        // a predicate that wants the nop gets it
        let explicit =
            Pattern::new([Predicate::ldarg(0), OpCode::Nop.into(), OpCode::Nop.into()]).skipping_nops();
        assert_eq!(explicit.find(&stream, 0), Some(Match { start: 0, end: 3 }));
    }

    #[test]
    fn test_match_past_end() {
        let stream = stream_of(vec![Instruction::ldc_i4(1)]);
        let pattern = Pattern::new([Predicate::int(1), Predicate::any()]);
        assert_eq!(pattern.find(&stream, 0), None);
        assert!(pattern.matches_at(&stream, 5).is_none());
    }

    #[test]
    fn test_display() {
        let pattern = Pattern::new([
            Predicate::call("Monocle.MInput", "get_Keyboard"),
            Predicate::class(OpClass::StoreLocal),
        ]);
        assert_eq!(pattern.to_string(), "[call Monocle.MInput::get_Keyboard, stloc*]");
    }
}
