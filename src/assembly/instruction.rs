//! CIL instruction representation and operand types.
//!
//! An [`Instruction`] is the value type the whole engine revolves around: an [`OpCode`]
//! plus an [`Operand`]. Instructions are immutable once constructed. Edits never change
//! the operand kind of an existing instance; instead the instance held by a stream
//! slot is replaced (see [`crate::body::InstructionStream::replace`]).
//!
//! # Key Components
//!
//! - [`Instruction`] - One decoded instruction
//! - [`Operand`] - Type-safe operand representation
//! - [`FlowType`] - Control flow behavior classification
//!
//! # Examples
//!
//! ```rust
//! use cilpatch::assembly::{Instruction, OpCode, Operand};
//!
//! let push = Instruction::ldc_i4(42);
//! assert_eq!(push.opcode(), OpCode::LdcI4S);
//! assert_eq!(push.int_value(), Some(42));
//!
//! // Operands are validated against the opcode's operand kind
//! assert!(Instruction::new(OpCode::Ldstr, Operand::Int(3)).is_err());
//! # Ok::<(), cilpatch::Error>(())
//! ```

use std::fmt;

use strum::IntoStaticStr;

use crate::{
    assembly::opcodes::{OpClass, OpCode, OperandKind},
    body::Label,
    metadata::member::{FieldRef, MethodRef, TypeRef},
    Error, Result,
};

/// Control flow behavior of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowType {
    /// Normal execution continues to next instruction
    Sequential,
    /// Conditional branch to another location
    ConditionalBranch,
    /// Always branches to another location (unconditional jump)
    UnconditionalBranch,
    /// Call to another method
    Call,
    /// Returns from current method
    Return,
    /// Multi-way branch (switch statement)
    Switch,
    /// Exception throwing
    Throw,
    /// End of finally or filter block
    EndFinally,
    /// Leave protected region (try/catch/finally)
    Leave,
}

impl FlowType {
    /// Returns true if execution never falls through to the next instruction.
    #[must_use]
    pub fn ends_block(&self) -> bool {
        matches!(
            self,
            FlowType::UnconditionalBranch
                | FlowType::Return
                | FlowType::Throw
                | FlowType::EndFinally
                | FlowType::Leave
        )
    }
}

/// The operand of a CIL instruction.
///
/// Branch targets are [`Label`]s, not offsets or indices: a label resolves to an
/// instruction by identity inside its [`crate::body::InstructionStream`], so it survives
/// any insertion or removal elsewhere in the stream.
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
pub enum Operand {
    /// No operand present
    None,
    /// Integer literal (covers `ldc.i4.s`, `ldc.i4`, `ldc.i8` and `unaligned.`)
    Int(i64),
    /// Floating point literal
    Float(f64),
    /// String literal (`ldstr`)
    String(String),
    /// Field reference
    Field(FieldRef),
    /// Method reference
    Method(MethodRef),
    /// Type reference
    Type(TypeRef),
    /// Single branch target
    Target(Label),
    /// Jump table of a `switch`
    Switch(Vec<Label>),
    /// Local variable index
    Local(u16),
    /// Argument index
    Argument(u16),
}

impl Operand {
    /// Returns the name of the operand variant, used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        self.into()
    }

    /// Returns true if this operand can be encoded with the given operand kind.
    #[must_use]
    pub fn fits(&self, kind: OperandKind) -> bool {
        match (kind, self) {
            (OperandKind::None, Operand::None) => true,
            (OperandKind::Int8, Operand::Int(v)) => i8::try_from(*v).is_ok(),
            (OperandKind::UInt8, Operand::Int(v)) => u8::try_from(*v).is_ok(),
            (OperandKind::Int32, Operand::Int(v)) => i32::try_from(*v).is_ok(),
            (OperandKind::Int64, Operand::Int(_)) => true,
            (OperandKind::Float32 | OperandKind::Float64, Operand::Float(_)) => true,
            (OperandKind::String, Operand::String(_)) => true,
            (OperandKind::Field, Operand::Field(_)) => true,
            (OperandKind::Method | OperandKind::Signature, Operand::Method(_)) => true,
            (OperandKind::Type, Operand::Type(_)) => true,
            (
                OperandKind::Token,
                Operand::Field(_) | Operand::Method(_) | Operand::Type(_),
            ) => true,
            (OperandKind::ShortBranch | OperandKind::Branch, Operand::Target(_)) => true,
            (OperandKind::Switch, Operand::Switch(_)) => true,
            (OperandKind::ShortVariable | OperandKind::Variable, Operand::Local(_)) => true,
            (OperandKind::ShortArgument | OperandKind::Argument, Operand::Argument(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Int(v) => write!(f, "{v}"),
            Operand::Float(v) => write!(f, "{v}"),
            Operand::String(s) => write!(f, "{s:?}"),
            Operand::Field(field) => write!(f, "{field}"),
            Operand::Method(method) => write!(f, "{method}"),
            Operand::Type(ty) => write!(f, "{ty}"),
            Operand::Target(label) => write!(f, "{label}"),
            Operand::Switch(labels) => {
                write!(f, "(")?;
                for (i, label) in labels.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{label}")?;
                }
                write!(f, ")")
            }
            Operand::Local(index) => write!(f, "V_{index}"),
            Operand::Argument(index) => write!(f, "A_{index}"),
        }
    }
}

/// One CIL instruction: an opcode and its operand.
///
/// Equality is structural (opcode + operand), never identity. Identity of an
/// instruction inside a method body is the [`crate::body::InstrId`] of its slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    opcode: OpCode,
    operand: Operand,
}

impl Instruction {
    /// Creates a new instruction, validating the operand against the opcode.
    ///
    /// # Arguments
    ///
    /// * `opcode` - The operation to perform
    /// * `operand` - The operand, which must fit [`OpCode::operand_kind`]
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidOperand`] if the operand variant (or integer range)
    /// does not fit the opcode.
    pub fn new(opcode: OpCode, operand: Operand) -> Result<Self> {
        let kind = opcode.operand_kind();
        if !operand.fits(kind) {
            return Err(Error::InvalidOperand {
                opcode: opcode.mnemonic(),
                expected: kind.name(),
                found: operand.kind_name(),
            });
        }
        Ok(Instruction { opcode, operand })
    }

    /// Creates an operand-less instruction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidOperand`] if the opcode requires an operand.
    pub fn op(opcode: OpCode) -> Result<Self> {
        Self::new(opcode, Operand::None)
    }

    /// Creates a branch to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidOperand`] if the opcode is not a single-target branch.
    pub fn branch(opcode: OpCode, target: Label) -> Result<Self> {
        Self::new(opcode, Operand::Target(target))
    }

    /// Creates a `switch` over the given jump table.
    #[must_use]
    pub fn switch(targets: Vec<Label>) -> Self {
        Self::raw(OpCode::Switch, Operand::Switch(targets))
    }

    // Only used by constructors that are correct by construction.
    pub(crate) fn raw(opcode: OpCode, operand: Operand) -> Self {
        debug_assert!(operand.fits(opcode.operand_kind()));
        Instruction { opcode, operand }
    }

    /// `nop`
    #[must_use]
    pub fn nop() -> Self {
        Self::raw(OpCode::Nop, Operand::None)
    }

    /// `ret`
    #[must_use]
    pub fn ret() -> Self {
        Self::raw(OpCode::Ret, Operand::None)
    }

    /// `pop`
    #[must_use]
    pub fn pop() -> Self {
        Self::raw(OpCode::Pop, Operand::None)
    }

    /// `dup`
    #[must_use]
    pub fn dup() -> Self {
        Self::raw(OpCode::Dup, Operand::None)
    }

    /// `ldnull`
    #[must_use]
    pub fn ldnull() -> Self {
        Self::raw(OpCode::Ldnull, Operand::None)
    }

    /// Pushes a 32-bit integer, picking the shortest encoding.
    #[must_use]
    pub fn ldc_i4(value: i32) -> Self {
        let implied = match value {
            -1 => Some(OpCode::LdcI4M1),
            0 => Some(OpCode::LdcI40),
            1 => Some(OpCode::LdcI41),
            2 => Some(OpCode::LdcI42),
            3 => Some(OpCode::LdcI43),
            4 => Some(OpCode::LdcI44),
            5 => Some(OpCode::LdcI45),
            6 => Some(OpCode::LdcI46),
            7 => Some(OpCode::LdcI47),
            8 => Some(OpCode::LdcI48),
            _ => None,
        };
        match implied {
            Some(opcode) => Self::raw(opcode, Operand::None),
            None if i8::try_from(value).is_ok() => {
                Self::raw(OpCode::LdcI4S, Operand::Int(i64::from(value)))
            }
            None => Self::raw(OpCode::LdcI4, Operand::Int(i64::from(value))),
        }
    }

    /// Pushes a boolean (`ldc.i4.1` / `ldc.i4.0`).
    #[must_use]
    pub fn ldc_bool(value: bool) -> Self {
        Self::ldc_i4(i32::from(value))
    }

    /// `ldc.r4`
    #[must_use]
    pub fn ldc_r4(value: f32) -> Self {
        Self::raw(OpCode::LdcR4, Operand::Float(f64::from(value)))
    }

    /// `ldstr`
    #[must_use]
    pub fn ldstr(value: impl Into<String>) -> Self {
        Self::raw(OpCode::Ldstr, Operand::String(value.into()))
    }

    /// `call`
    #[must_use]
    pub fn call(method: MethodRef) -> Self {
        Self::raw(OpCode::Call, Operand::Method(method))
    }

    /// `callvirt`
    #[must_use]
    pub fn callvirt(method: MethodRef) -> Self {
        Self::raw(OpCode::Callvirt, Operand::Method(method))
    }

    /// `newobj`
    #[must_use]
    pub fn newobj(ctor: MethodRef) -> Self {
        Self::raw(OpCode::Newobj, Operand::Method(ctor))
    }

    /// `ldfld`
    #[must_use]
    pub fn ldfld(field: FieldRef) -> Self {
        Self::raw(OpCode::Ldfld, Operand::Field(field))
    }

    /// `ldsfld`
    #[must_use]
    pub fn ldsfld(field: FieldRef) -> Self {
        Self::raw(OpCode::Ldsfld, Operand::Field(field))
    }

    /// `stfld`
    #[must_use]
    pub fn stfld(field: FieldRef) -> Self {
        Self::raw(OpCode::Stfld, Operand::Field(field))
    }

    /// `stsfld`
    #[must_use]
    pub fn stsfld(field: FieldRef) -> Self {
        Self::raw(OpCode::Stsfld, Operand::Field(field))
    }

    /// `initobj`
    #[must_use]
    pub fn initobj(ty: TypeRef) -> Self {
        Self::raw(OpCode::Initobj, Operand::Type(ty))
    }

    /// `isinst`
    #[must_use]
    pub fn isinst(ty: TypeRef) -> Self {
        Self::raw(OpCode::Isinst, Operand::Type(ty))
    }

    /// Loads a local, picking the shortest encoding.
    #[must_use]
    pub fn ldloc(index: u16) -> Self {
        match index {
            0 => Self::raw(OpCode::Ldloc0, Operand::None),
            1 => Self::raw(OpCode::Ldloc1, Operand::None),
            2 => Self::raw(OpCode::Ldloc2, Operand::None),
            3 => Self::raw(OpCode::Ldloc3, Operand::None),
            i if i <= 255 => Self::raw(OpCode::LdlocS, Operand::Local(i)),
            i => Self::raw(OpCode::Ldloc, Operand::Local(i)),
        }
    }

    /// Stores into a local, picking the shortest encoding.
    #[must_use]
    pub fn stloc(index: u16) -> Self {
        match index {
            0 => Self::raw(OpCode::Stloc0, Operand::None),
            1 => Self::raw(OpCode::Stloc1, Operand::None),
            2 => Self::raw(OpCode::Stloc2, Operand::None),
            3 => Self::raw(OpCode::Stloc3, Operand::None),
            i if i <= 255 => Self::raw(OpCode::StlocS, Operand::Local(i)),
            i => Self::raw(OpCode::Stloc, Operand::Local(i)),
        }
    }

    /// Loads the address of a local.
    #[must_use]
    pub fn ldloca(index: u16) -> Self {
        if index <= 255 {
            Self::raw(OpCode::LdlocaS, Operand::Local(index))
        } else {
            Self::raw(OpCode::Ldloca, Operand::Local(index))
        }
    }

    /// Loads an argument, picking the shortest encoding.
    #[must_use]
    pub fn ldarg(index: u16) -> Self {
        match index {
            0 => Self::raw(OpCode::Ldarg0, Operand::None),
            1 => Self::raw(OpCode::Ldarg1, Operand::None),
            2 => Self::raw(OpCode::Ldarg2, Operand::None),
            3 => Self::raw(OpCode::Ldarg3, Operand::None),
            i if i <= 255 => Self::raw(OpCode::LdargS, Operand::Argument(i)),
            i => Self::raw(OpCode::Ldarg, Operand::Argument(i)),
        }
    }

    /// Returns the opcode.
    #[must_use]
    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// Returns the operand.
    #[must_use]
    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    /// Returns a copy of this instruction with a different operand.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidOperand`] if the operand does not fit the opcode.
    pub fn with_operand(&self, operand: Operand) -> Result<Self> {
        Self::new(self.opcode, operand)
    }

    /// Returns a copy of this instruction with a different opcode, keeping the operand.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidOperand`] if the operand does not fit the new opcode.
    pub fn with_opcode(&self, opcode: OpCode) -> Result<Self> {
        Self::new(opcode, self.operand.clone())
    }

    /// Returns the control flow behavior of this instruction.
    #[must_use]
    pub fn flow_type(&self) -> FlowType {
        self.opcode.flow_type()
    }

    /// Returns true if the opcode belongs to the given macro family.
    #[must_use]
    pub fn is(&self, class: OpClass) -> bool {
        self.opcode.is_in(class)
    }

    /// Returns the single branch target, if this is a branch.
    #[must_use]
    pub fn branch_target(&self) -> Option<Label> {
        match self.operand {
            Operand::Target(label) => Some(label),
            _ => None,
        }
    }

    /// Returns every label this instruction references (branch target or jump table).
    #[must_use]
    pub fn targets(&self) -> Vec<Label> {
        match &self.operand {
            Operand::Target(label) => vec![*label],
            Operand::Switch(labels) => labels.clone(),
            _ => Vec::new(),
        }
    }

    /// Returns true if this instruction references `label`.
    #[must_use]
    pub fn references(&self, label: Label) -> bool {
        match &self.operand {
            Operand::Target(target) => *target == label,
            Operand::Switch(labels) => labels.contains(&label),
            _ => false,
        }
    }

    /// Returns the integer this instruction pushes, whatever its encoding.
    ///
    /// Covers the `ldc.i4.N` shorthands as well as `ldc.i4.s`, `ldc.i4` and `ldc.i8`.
    #[must_use]
    pub fn int_value(&self) -> Option<i64> {
        if let Some(value) = self.opcode.implied_int() {
            return Some(value);
        }
        match (self.opcode, &self.operand) {
            (OpCode::LdcI4S | OpCode::LdcI4 | OpCode::LdcI8, Operand::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Returns the float this instruction pushes (`ldc.r4` / `ldc.r8`).
    #[must_use]
    pub fn float_value(&self) -> Option<f64> {
        match self.operand {
            Operand::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the string literal of an `ldstr`.
    #[must_use]
    pub fn string_value(&self) -> Option<&str> {
        match &self.operand {
            Operand::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the local index addressed by a local load/store/address instruction.
    #[must_use]
    pub fn local_index(&self) -> Option<u16> {
        if let Some(index) = self.opcode.implied_local() {
            return Some(index);
        }
        match self.operand {
            Operand::Local(index) => Some(index),
            _ => None,
        }
    }

    /// Returns the argument index addressed by an argument instruction.
    #[must_use]
    pub fn argument_index(&self) -> Option<u16> {
        if let Some(index) = self.opcode.implied_argument() {
            return Some(index);
        }
        match self.operand {
            Operand::Argument(index) => Some(index),
            _ => None,
        }
    }

    /// Returns the referenced method, if any.
    #[must_use]
    pub fn method(&self) -> Option<&MethodRef> {
        match &self.operand {
            Operand::Method(method) => Some(method),
            _ => None,
        }
    }

    /// Returns the referenced field, if any.
    #[must_use]
    pub fn field(&self) -> Option<&FieldRef> {
        match &self.operand {
            Operand::Field(field) => Some(field),
            _ => None,
        }
    }

    /// Returns the referenced type, if any.
    #[must_use]
    pub fn type_ref(&self) -> Option<&TypeRef> {
        match &self.operand {
            Operand::Type(ty) => Some(ty),
            _ => None,
        }
    }

    /// Returns the encoded size of this instruction in bytes.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        let targets = match &self.operand {
            Operand::Switch(labels) => labels.len(),
            _ => 0,
        };
        self.opcode.encoded_size(targets)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand {
            Operand::None => write!(f, "{}", self.opcode),
            _ => write!(f, "{} {}", self.opcode, self.operand),
        }
    }
}
