//! CIL opcodes (ECMA-335) and their static properties.
//!
//! Every opcode is a variant of [`OpCode`]. Single-byte opcodes carry their byte value,
//! two-byte opcodes that use the `0xFE` prefix are stored as `0xFE00 | second_byte`
//! (e.g. [`OpCode::Ceq`] = `0xFE01`). Mnemonics are derived through `strum`, so
//! `OpCode::BrS.to_string() == "br.s"` and `"br.s".parse::<OpCode>()` round-trip.
//!
//! Besides the raw table, this module answers the questions the patch engine asks
//! about an opcode: which [`OperandKind`] it takes, how many bytes it encodes to,
//! how it affects control flow, which macro family it belongs to ([`OpClass`]) and
//! what its short/long branch counterpart is.
#![allow(missing_docs)]

use strum::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

use crate::assembly::instruction::FlowType;

/// Prefix byte shared by all two-byte opcodes.
pub const FE_PREFIX: u8 = 0xFE;

/// The kind of operand an opcode encodes.
///
/// The operand kind decides which [`crate::assembly::Operand`] variants an instruction
/// may carry and how many bytes the operand occupies once encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum OperandKind {
    /// No operand present
    None,
    /// Signed 8-bit integer literal (`ldc.i4.s`)
    Int8,
    /// Unsigned 8-bit integer literal (`unaligned.`)
    UInt8,
    /// Signed 32-bit integer literal (`ldc.i4`)
    Int32,
    /// Signed 64-bit integer literal (`ldc.i8`)
    Int64,
    /// 32-bit float literal (`ldc.r4`)
    Float32,
    /// 64-bit float literal (`ldc.r8`)
    Float64,
    /// User string literal (`ldstr`)
    String,
    /// Field reference
    Field,
    /// Method reference
    Method,
    /// Stand-alone call site signature (`calli`)
    Signature,
    /// Type reference
    Type,
    /// Any member token (`ldtoken`)
    Token,
    /// Branch target with a one byte displacement
    ShortBranch,
    /// Branch target with a four byte displacement
    Branch,
    /// Switch jump table
    Switch,
    /// Local variable index encoded in one byte
    ShortVariable,
    /// Local variable index encoded in two bytes
    Variable,
    /// Argument index encoded in one byte
    ShortArgument,
    /// Argument index encoded in two bytes
    Argument,
}

impl OperandKind {
    /// Returns the encoded size in bytes of this operand kind.
    ///
    /// Returns `None` for the variable-size switch table, whose size depends on the
    /// number of targets (see [`OpCode::encoded_size`]).
    #[must_use]
    pub const fn size(&self) -> Option<usize> {
        match self {
            OperandKind::None => Some(0),
            OperandKind::Int8
            | OperandKind::UInt8
            | OperandKind::ShortBranch
            | OperandKind::ShortVariable
            | OperandKind::ShortArgument => Some(1),
            OperandKind::Variable | OperandKind::Argument => Some(2),
            OperandKind::Int32
            | OperandKind::Float32
            | OperandKind::String
            | OperandKind::Field
            | OperandKind::Method
            | OperandKind::Signature
            | OperandKind::Type
            | OperandKind::Token
            | OperandKind::Branch => Some(4),
            OperandKind::Int64 | OperandKind::Float64 => Some(8),
            OperandKind::Switch => None,
        }
    }

    /// Returns the human readable name of this operand kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// A family of opcodes that perform the same operation in different encodings.
///
/// CIL has several "macro" encodings for the same logical operation, e.g. loading
/// local 0 can be `ldloc.0`, `ldloc.s 0` or `ldloc 0`. Patterns usually care about
/// the operation, not the encoding, and match against an [`OpClass`] instead of a
/// concrete [`OpCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum OpClass {
    /// `ldloc.0`-`ldloc.3`, `ldloc.s`, `ldloc`
    #[strum(serialize = "ldloc*")]
    LoadLocal,
    /// `stloc.0`-`stloc.3`, `stloc.s`, `stloc`
    #[strum(serialize = "stloc*")]
    StoreLocal,
    /// `ldloca.s`, `ldloca`
    #[strum(serialize = "ldloca*")]
    LoadLocalAddress,
    /// `ldarg.0`-`ldarg.3`, `ldarg.s`, `ldarg`
    #[strum(serialize = "ldarg*")]
    LoadArgument,
    /// `starg.s`, `starg`
    #[strum(serialize = "starg*")]
    StoreArgument,
    /// Every `ldc.i4*` form and `ldc.i8`
    #[strum(serialize = "ldc.i*")]
    LoadInteger,
    /// Every branch, conditional or not, short or long (excluding `switch` and `leave`)
    #[strum(serialize = "branch")]
    Branch,
    /// Every conditional branch, short or long
    #[strum(serialize = "conditional branch")]
    ConditionalBranch,
    /// `call`, `callvirt`
    #[strum(serialize = "call*")]
    Call,
    /// `ldfld`, `ldsfld`
    #[strum(serialize = "ldfld*")]
    LoadField,
    /// `ldflda`, `ldsflda`
    #[strum(serialize = "ldflda*")]
    LoadFieldAddress,
    /// `stfld`, `stsfld`
    #[strum(serialize = "stfld*")]
    StoreField,
}

macro_rules! define_opcodes {
    ($( $variant:ident = $code:expr, $mnemonic:literal, $operand:ident; )*) => {
        /// A CIL opcode.
        ///
        /// The discriminant-independent numeric encoding is available through
        /// [`OpCode::value`]; the mnemonic through `Display` / [`OpCode::mnemonic`].
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Display,
            EnumString,
            IntoStaticStr,
            EnumIter,
            EnumCount,
        )]
        pub enum OpCode {
            $(
                #[doc = concat!("`", $mnemonic, "`")]
                #[strum(serialize = $mnemonic)]
                $variant,
            )*
        }

        impl OpCode {
            /// Returns the numeric encoding (`0xFExx` for two-byte opcodes).
            #[must_use]
            pub const fn value(self) -> u16 {
                match self {
                    $( OpCode::$variant => $code, )*
                }
            }

            /// Returns the kind of operand this opcode takes.
            #[must_use]
            pub const fn operand_kind(self) -> OperandKind {
                match self {
                    $( OpCode::$variant => OperandKind::$operand, )*
                }
            }

            /// Looks up an opcode by its numeric encoding.
            #[must_use]
            pub fn from_value(value: u16) -> Option<OpCode> {
                match value {
                    $( $code => Some(OpCode::$variant), )*
                    _ => None,
                }
            }
        }
    };
}

define_opcodes! {
    Nop = 0x00, "nop", None;
    Break = 0x01, "break", None;
    Ldarg0 = 0x02, "ldarg.0", None;
    Ldarg1 = 0x03, "ldarg.1", None;
    Ldarg2 = 0x04, "ldarg.2", None;
    Ldarg3 = 0x05, "ldarg.3", None;
    Ldloc0 = 0x06, "ldloc.0", None;
    Ldloc1 = 0x07, "ldloc.1", None;
    Ldloc2 = 0x08, "ldloc.2", None;
    Ldloc3 = 0x09, "ldloc.3", None;
    Stloc0 = 0x0A, "stloc.0", None;
    Stloc1 = 0x0B, "stloc.1", None;
    Stloc2 = 0x0C, "stloc.2", None;
    Stloc3 = 0x0D, "stloc.3", None;
    LdargS = 0x0E, "ldarg.s", ShortArgument;
    LdargaS = 0x0F, "ldarga.s", ShortArgument;
    StargS = 0x10, "starg.s", ShortArgument;
    LdlocS = 0x11, "ldloc.s", ShortVariable;
    LdlocaS = 0x12, "ldloca.s", ShortVariable;
    StlocS = 0x13, "stloc.s", ShortVariable;
    Ldnull = 0x14, "ldnull", None;
    LdcI4M1 = 0x15, "ldc.i4.m1", None;
    LdcI40 = 0x16, "ldc.i4.0", None;
    LdcI41 = 0x17, "ldc.i4.1", None;
    LdcI42 = 0x18, "ldc.i4.2", None;
    LdcI43 = 0x19, "ldc.i4.3", None;
    LdcI44 = 0x1A, "ldc.i4.4", None;
    LdcI45 = 0x1B, "ldc.i4.5", None;
    LdcI46 = 0x1C, "ldc.i4.6", None;
    LdcI47 = 0x1D, "ldc.i4.7", None;
    LdcI48 = 0x1E, "ldc.i4.8", None;
    LdcI4S = 0x1F, "ldc.i4.s", Int8;
    LdcI4 = 0x20, "ldc.i4", Int32;
    LdcI8 = 0x21, "ldc.i8", Int64;
    LdcR4 = 0x22, "ldc.r4", Float32;
    LdcR8 = 0x23, "ldc.r8", Float64;
    Dup = 0x25, "dup", None;
    Pop = 0x26, "pop", None;
    Jmp = 0x27, "jmp", Method;
    Call = 0x28, "call", Method;
    Calli = 0x29, "calli", Signature;
    Ret = 0x2A, "ret", None;
    BrS = 0x2B, "br.s", ShortBranch;
    BrfalseS = 0x2C, "brfalse.s", ShortBranch;
    BrtrueS = 0x2D, "brtrue.s", ShortBranch;
    BeqS = 0x2E, "beq.s", ShortBranch;
    BgeS = 0x2F, "bge.s", ShortBranch;
    BgtS = 0x30, "bgt.s", ShortBranch;
    BleS = 0x31, "ble.s", ShortBranch;
    BltS = 0x32, "blt.s", ShortBranch;
    BneUnS = 0x33, "bne.un.s", ShortBranch;
    BgeUnS = 0x34, "bge.un.s", ShortBranch;
    BgtUnS = 0x35, "bgt.un.s", ShortBranch;
    BleUnS = 0x36, "ble.un.s", ShortBranch;
    BltUnS = 0x37, "blt.un.s", ShortBranch;
    Br = 0x38, "br", Branch;
    Brfalse = 0x39, "brfalse", Branch;
    Brtrue = 0x3A, "brtrue", Branch;
    Beq = 0x3B, "beq", Branch;
    Bge = 0x3C, "bge", Branch;
    Bgt = 0x3D, "bgt", Branch;
    Ble = 0x3E, "ble", Branch;
    Blt = 0x3F, "blt", Branch;
    BneUn = 0x40, "bne.un", Branch;
    BgeUn = 0x41, "bge.un", Branch;
    BgtUn = 0x42, "bgt.un", Branch;
    BleUn = 0x43, "ble.un", Branch;
    BltUn = 0x44, "blt.un", Branch;
    Switch = 0x45, "switch", Switch;
    LdindI1 = 0x46, "ldind.i1", None;
    LdindU1 = 0x47, "ldind.u1", None;
    LdindI2 = 0x48, "ldind.i2", None;
    LdindU2 = 0x49, "ldind.u2", None;
    LdindI4 = 0x4A, "ldind.i4", None;
    LdindU4 = 0x4B, "ldind.u4", None;
    LdindI8 = 0x4C, "ldind.i8", None;
    LdindI = 0x4D, "ldind.i", None;
    LdindR4 = 0x4E, "ldind.r4", None;
    LdindR8 = 0x4F, "ldind.r8", None;
    LdindRef = 0x50, "ldind.ref", None;
    StindRef = 0x51, "stind.ref", None;
    StindI1 = 0x52, "stind.i1", None;
    StindI2 = 0x53, "stind.i2", None;
    StindI4 = 0x54, "stind.i4", None;
    StindI8 = 0x55, "stind.i8", None;
    StindR4 = 0x56, "stind.r4", None;
    StindR8 = 0x57, "stind.r8", None;
    Add = 0x58, "add", None;
    Sub = 0x59, "sub", None;
    Mul = 0x5A, "mul", None;
    Div = 0x5B, "div", None;
    DivUn = 0x5C, "div.un", None;
    Rem = 0x5D, "rem", None;
    RemUn = 0x5E, "rem.un", None;
    And = 0x5F, "and", None;
    Or = 0x60, "or", None;
    Xor = 0x61, "xor", None;
    Shl = 0x62, "shl", None;
    Shr = 0x63, "shr", None;
    ShrUn = 0x64, "shr.un", None;
    Neg = 0x65, "neg", None;
    Not = 0x66, "not", None;
    ConvI1 = 0x67, "conv.i1", None;
    ConvI2 = 0x68, "conv.i2", None;
    ConvI4 = 0x69, "conv.i4", None;
    ConvI8 = 0x6A, "conv.i8", None;
    ConvR4 = 0x6B, "conv.r4", None;
    ConvR8 = 0x6C, "conv.r8", None;
    ConvU4 = 0x6D, "conv.u4", None;
    ConvU8 = 0x6E, "conv.u8", None;
    Callvirt = 0x6F, "callvirt", Method;
    Cpobj = 0x70, "cpobj", Type;
    Ldobj = 0x71, "ldobj", Type;
    Ldstr = 0x72, "ldstr", String;
    Newobj = 0x73, "newobj", Method;
    Castclass = 0x74, "castclass", Type;
    Isinst = 0x75, "isinst", Type;
    ConvRUn = 0x76, "conv.r.un", None;
    Unbox = 0x79, "unbox", Type;
    Throw = 0x7A, "throw", None;
    Ldfld = 0x7B, "ldfld", Field;
    Ldflda = 0x7C, "ldflda", Field;
    Stfld = 0x7D, "stfld", Field;
    Ldsfld = 0x7E, "ldsfld", Field;
    Ldsflda = 0x7F, "ldsflda", Field;
    Stsfld = 0x80, "stsfld", Field;
    Stobj = 0x81, "stobj", Type;
    ConvOvfI1Un = 0x82, "conv.ovf.i1.un", None;
    ConvOvfI2Un = 0x83, "conv.ovf.i2.un", None;
    ConvOvfI4Un = 0x84, "conv.ovf.i4.un", None;
    ConvOvfI8Un = 0x85, "conv.ovf.i8.un", None;
    ConvOvfU1Un = 0x86, "conv.ovf.u1.un", None;
    ConvOvfU2Un = 0x87, "conv.ovf.u2.un", None;
    ConvOvfU4Un = 0x88, "conv.ovf.u4.un", None;
    ConvOvfU8Un = 0x89, "conv.ovf.u8.un", None;
    ConvOvfIUn = 0x8A, "conv.ovf.i.un", None;
    ConvOvfUUn = 0x8B, "conv.ovf.u.un", None;
    Box = 0x8C, "box", Type;
    Newarr = 0x8D, "newarr", Type;
    Ldlen = 0x8E, "ldlen", None;
    Ldelema = 0x8F, "ldelema", Type;
    LdelemI1 = 0x90, "ldelem.i1", None;
    LdelemU1 = 0x91, "ldelem.u1", None;
    LdelemI2 = 0x92, "ldelem.i2", None;
    LdelemU2 = 0x93, "ldelem.u2", None;
    LdelemI4 = 0x94, "ldelem.i4", None;
    LdelemU4 = 0x95, "ldelem.u4", None;
    LdelemI8 = 0x96, "ldelem.i8", None;
    LdelemI = 0x97, "ldelem.i", None;
    LdelemR4 = 0x98, "ldelem.r4", None;
    LdelemR8 = 0x99, "ldelem.r8", None;
    LdelemRef = 0x9A, "ldelem.ref", None;
    StelemI = 0x9B, "stelem.i", None;
    StelemI1 = 0x9C, "stelem.i1", None;
    StelemI2 = 0x9D, "stelem.i2", None;
    StelemI4 = 0x9E, "stelem.i4", None;
    StelemI8 = 0x9F, "stelem.i8", None;
    StelemR4 = 0xA0, "stelem.r4", None;
    StelemR8 = 0xA1, "stelem.r8", None;
    StelemRef = 0xA2, "stelem.ref", None;
    Ldelem = 0xA3, "ldelem", Type;
    Stelem = 0xA4, "stelem", Type;
    UnboxAny = 0xA5, "unbox.any", Type;
    ConvOvfI1 = 0xB3, "conv.ovf.i1", None;
    ConvOvfU1 = 0xB4, "conv.ovf.u1", None;
    ConvOvfI2 = 0xB5, "conv.ovf.i2", None;
    ConvOvfU2 = 0xB6, "conv.ovf.u2", None;
    ConvOvfI4 = 0xB7, "conv.ovf.i4", None;
    ConvOvfU4 = 0xB8, "conv.ovf.u4", None;
    ConvOvfI8 = 0xB9, "conv.ovf.i8", None;
    ConvOvfU8 = 0xBA, "conv.ovf.u8", None;
    Refanyval = 0xC2, "refanyval", Type;
    Ckfinite = 0xC3, "ckfinite", None;
    Mkrefany = 0xC6, "mkrefany", Type;
    Ldtoken = 0xD0, "ldtoken", Token;
    ConvU2 = 0xD1, "conv.u2", None;
    ConvU1 = 0xD2, "conv.u1", None;
    ConvI = 0xD3, "conv.i", None;
    ConvOvfI = 0xD4, "conv.ovf.i", None;
    ConvOvfU = 0xD5, "conv.ovf.u", None;
    AddOvf = 0xD6, "add.ovf", None;
    AddOvfUn = 0xD7, "add.ovf.un", None;
    MulOvf = 0xD8, "mul.ovf", None;
    MulOvfUn = 0xD9, "mul.ovf.un", None;
    SubOvf = 0xDA, "sub.ovf", None;
    SubOvfUn = 0xDB, "sub.ovf.un", None;
    Endfinally = 0xDC, "endfinally", None;
    Leave = 0xDD, "leave", Branch;
    LeaveS = 0xDE, "leave.s", ShortBranch;
    StindI = 0xDF, "stind.i", None;
    ConvU = 0xE0, "conv.u", None;
    Arglist = 0xFE00, "arglist", None;
    Ceq = 0xFE01, "ceq", None;
    Cgt = 0xFE02, "cgt", None;
    CgtUn = 0xFE03, "cgt.un", None;
    Clt = 0xFE04, "clt", None;
    CltUn = 0xFE05, "clt.un", None;
    Ldftn = 0xFE06, "ldftn", Method;
    Ldvirtftn = 0xFE07, "ldvirtftn", Method;
    Ldarg = 0xFE09, "ldarg", Argument;
    Ldarga = 0xFE0A, "ldarga", Argument;
    Starg = 0xFE0B, "starg", Argument;
    Ldloc = 0xFE0C, "ldloc", Variable;
    Ldloca = 0xFE0D, "ldloca", Variable;
    Stloc = 0xFE0E, "stloc", Variable;
    Localloc = 0xFE0F, "localloc", None;
    Endfilter = 0xFE11, "endfilter", None;
    Unaligned = 0xFE12, "unaligned.", UInt8;
    Volatile = 0xFE13, "volatile.", None;
    Tail = 0xFE14, "tail.", None;
    Initobj = 0xFE15, "initobj", Type;
    Constrained = 0xFE16, "constrained.", Type;
    Cpblk = 0xFE17, "cpblk", None;
    Initblk = 0xFE18, "initblk", None;
    Rethrow = 0xFE1A, "rethrow", None;
    Sizeof = 0xFE1C, "sizeof", Type;
    Refanytype = 0xFE1D, "refanytype", None;
    Readonly = 0xFE1E, "readonly.", None;
}

impl OpCode {
    /// Returns the mnemonic of this opcode, e.g. `"ldc.i4.s"`.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    /// Returns true if this opcode uses the two-byte `0xFE` encoding.
    #[must_use]
    pub const fn is_prefixed(self) -> bool {
        self.value() > 0xFF
    }

    /// Returns the encoded size in bytes of the opcode alone (1 or 2).
    #[must_use]
    pub const fn opcode_size(self) -> usize {
        if self.is_prefixed() {
            2
        } else {
            1
        }
    }

    /// Returns the encoded size in bytes of an instruction with this opcode.
    ///
    /// `switch_targets` is only consulted for [`OpCode::Switch`], whose size is
    /// `1 + 4 + 4 * n`.
    #[must_use]
    pub const fn encoded_size(self, switch_targets: usize) -> usize {
        match self.operand_kind().size() {
            Some(size) => self.opcode_size() + size,
            None => self.opcode_size() + 4 + 4 * switch_targets,
        }
    }

    /// Returns how this opcode affects control flow.
    #[must_use]
    pub const fn flow_type(self) -> FlowType {
        match self {
            OpCode::Br | OpCode::BrS => FlowType::UnconditionalBranch,
            OpCode::Call
            | OpCode::Callvirt
            | OpCode::Calli
            | OpCode::Newobj
            | OpCode::Jmp => FlowType::Call,
            OpCode::Ret => FlowType::Return,
            OpCode::Switch => FlowType::Switch,
            OpCode::Throw | OpCode::Rethrow => FlowType::Throw,
            OpCode::Endfinally | OpCode::Endfilter => FlowType::EndFinally,
            OpCode::Leave | OpCode::LeaveS => FlowType::Leave,
            _ => {
                if self.is_branch() {
                    FlowType::ConditionalBranch
                } else {
                    FlowType::Sequential
                }
            }
        }
    }

    /// Returns true for every instruction that carries a single branch target,
    /// including `leave` / `leave.s`.
    #[must_use]
    pub const fn is_branch(self) -> bool {
        matches!(
            self.operand_kind(),
            OperandKind::ShortBranch | OperandKind::Branch
        )
    }

    /// Returns true for branch opcodes with a one byte displacement.
    #[must_use]
    pub const fn is_short_branch(self) -> bool {
        matches!(self.operand_kind(), OperandKind::ShortBranch)
    }

    /// Returns true for conditional branches (short or long).
    #[must_use]
    pub const fn is_conditional_branch(self) -> bool {
        self.is_branch()
            && !matches!(
                self,
                OpCode::Br | OpCode::BrS | OpCode::Leave | OpCode::LeaveS
            )
    }

    /// Returns the long-form counterpart of a short-form opcode.
    ///
    /// Covers branches as well as the one-byte local/argument forms. Returns `None`
    /// for opcodes that have no long counterpart.
    #[must_use]
    pub const fn long_form(self) -> Option<OpCode> {
        Some(match self {
            OpCode::BrS => OpCode::Br,
            OpCode::BrfalseS => OpCode::Brfalse,
            OpCode::BrtrueS => OpCode::Brtrue,
            OpCode::BeqS => OpCode::Beq,
            OpCode::BgeS => OpCode::Bge,
            OpCode::BgtS => OpCode::Bgt,
            OpCode::BleS => OpCode::Ble,
            OpCode::BltS => OpCode::Blt,
            OpCode::BneUnS => OpCode::BneUn,
            OpCode::BgeUnS => OpCode::BgeUn,
            OpCode::BgtUnS => OpCode::BgtUn,
            OpCode::BleUnS => OpCode::BleUn,
            OpCode::BltUnS => OpCode::BltUn,
            OpCode::LeaveS => OpCode::Leave,
            OpCode::LdlocS => OpCode::Ldloc,
            OpCode::LdlocaS => OpCode::Ldloca,
            OpCode::StlocS => OpCode::Stloc,
            OpCode::LdargS => OpCode::Ldarg,
            OpCode::LdargaS => OpCode::Ldarga,
            OpCode::StargS => OpCode::Starg,
            _ => return None,
        })
    }

    /// Returns the short-form counterpart of a long-form opcode.
    #[must_use]
    pub const fn short_form(self) -> Option<OpCode> {
        Some(match self {
            OpCode::Br => OpCode::BrS,
            OpCode::Brfalse => OpCode::BrfalseS,
            OpCode::Brtrue => OpCode::BrtrueS,
            OpCode::Beq => OpCode::BeqS,
            OpCode::Bge => OpCode::BgeS,
            OpCode::Bgt => OpCode::BgtS,
            OpCode::Ble => OpCode::BleS,
            OpCode::Blt => OpCode::BltS,
            OpCode::BneUn => OpCode::BneUnS,
            OpCode::BgeUn => OpCode::BgeUnS,
            OpCode::BgtUn => OpCode::BgtUnS,
            OpCode::BleUn => OpCode::BleUnS,
            OpCode::BltUn => OpCode::BltUnS,
            OpCode::Leave => OpCode::LeaveS,
            OpCode::Ldloc => OpCode::LdlocS,
            OpCode::Ldloca => OpCode::LdlocaS,
            OpCode::Stloc => OpCode::StlocS,
            OpCode::Ldarg => OpCode::LdargS,
            OpCode::Ldarga => OpCode::LdargaS,
            OpCode::Starg => OpCode::StargS,
            _ => return None,
        })
    }

    /// Returns the integer an `ldc.i4.*` shorthand pushes without an operand.
    #[must_use]
    pub const fn implied_int(self) -> Option<i64> {
        Some(match self {
            OpCode::LdcI4M1 => -1,
            OpCode::LdcI40 => 0,
            OpCode::LdcI41 => 1,
            OpCode::LdcI42 => 2,
            OpCode::LdcI43 => 3,
            OpCode::LdcI44 => 4,
            OpCode::LdcI45 => 5,
            OpCode::LdcI46 => 6,
            OpCode::LdcI47 => 7,
            OpCode::LdcI48 => 8,
            _ => return None,
        })
    }

    /// Returns the local index a `ldloc.N` / `stloc.N` shorthand addresses.
    #[must_use]
    pub const fn implied_local(self) -> Option<u16> {
        Some(match self {
            OpCode::Ldloc0 | OpCode::Stloc0 => 0,
            OpCode::Ldloc1 | OpCode::Stloc1 => 1,
            OpCode::Ldloc2 | OpCode::Stloc2 => 2,
            OpCode::Ldloc3 | OpCode::Stloc3 => 3,
            _ => return None,
        })
    }

    /// Returns the argument index a `ldarg.N` shorthand addresses.
    #[must_use]
    pub const fn implied_argument(self) -> Option<u16> {
        Some(match self {
            OpCode::Ldarg0 => 0,
            OpCode::Ldarg1 => 1,
            OpCode::Ldarg2 => 2,
            OpCode::Ldarg3 => 3,
            _ => return None,
        })
    }

    /// Returns true if this opcode belongs to the given macro family.
    #[must_use]
    pub fn is_in(self, class: OpClass) -> bool {
        match class {
            OpClass::LoadLocal => matches!(
                self,
                OpCode::Ldloc0
                    | OpCode::Ldloc1
                    | OpCode::Ldloc2
                    | OpCode::Ldloc3
                    | OpCode::LdlocS
                    | OpCode::Ldloc
            ),
            OpClass::StoreLocal => matches!(
                self,
                OpCode::Stloc0
                    | OpCode::Stloc1
                    | OpCode::Stloc2
                    | OpCode::Stloc3
                    | OpCode::StlocS
                    | OpCode::Stloc
            ),
            OpClass::LoadLocalAddress => matches!(self, OpCode::LdlocaS | OpCode::Ldloca),
            OpClass::LoadArgument => matches!(
                self,
                OpCode::Ldarg0
                    | OpCode::Ldarg1
                    | OpCode::Ldarg2
                    | OpCode::Ldarg3
                    | OpCode::LdargS
                    | OpCode::Ldarg
            ),
            OpClass::StoreArgument => matches!(self, OpCode::StargS | OpCode::Starg),
            OpClass::LoadInteger => {
                self.implied_int().is_some()
                    || matches!(self, OpCode::LdcI4S | OpCode::LdcI4 | OpCode::LdcI8)
            }
            OpClass::Branch => {
                self.is_branch() && !matches!(self, OpCode::Leave | OpCode::LeaveS)
            }
            OpClass::ConditionalBranch => self.is_conditional_branch(),
            OpClass::Call => matches!(self, OpCode::Call | OpCode::Callvirt),
            OpClass::LoadField => matches!(self, OpCode::Ldfld | OpCode::Ldsfld),
            OpClass::LoadFieldAddress => matches!(self, OpCode::Ldflda | OpCode::Ldsflda),
            OpClass::StoreField => matches!(self, OpCode::Stfld | OpCode::Stsfld),
        }
    }
}
