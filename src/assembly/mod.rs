//! CIL instruction model.
//!
//! This module contains the value types a method body is made of: the [`OpCode`] table
//! with its static properties and the [`Instruction`] / [`Operand`] pair. Nothing in here
//! knows about positions or streams; see [`crate::body`] for that.
//!
//! # Key Components
//!
//! - [`OpCode`] - Every ECMA-335 opcode with mnemonic, size and flow information
//! - [`OpClass`] - Macro families of opcodes (any `ldloc*`, any branch, ...)
//! - [`Instruction`] - Opcode plus validated operand
//! - [`Operand`] - Operand values, with identity-based branch targets
//! - [`FlowType`] - Control flow classification

mod instruction;
mod opcodes;

pub use instruction::{FlowType, Instruction, Operand};
pub use opcodes::{OpClass, OpCode, OperandKind, FE_PREFIX};
