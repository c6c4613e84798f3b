//! # cilpatch Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the cilpatch library. Import this module to get quick access to everything a
//! patch catalogue is usually written with.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all cilpatch operations
pub use crate::Error;

/// The result type used throughout cilpatch
pub use crate::Result;

// ================================================================================================
// Instruction Model
// ================================================================================================

/// Opcodes, operands and instructions
pub use crate::assembly::{FlowType, Instruction, OpClass, OpCode, Operand};

/// Instruction streams and their builder
pub use crate::body::{BodyBuilder, InstrId, InstructionStream, Label};

// ================================================================================================
// Module Model
// ================================================================================================

/// Definitions and references
pub use crate::metadata::{
    BuildVersion, FieldRef, MethodDef, MethodRef, Module, Token, TypeDef, TypeRef,
};

/// Builders and patch annotations
pub use crate::metadata::{FlagCondition, MethodDefBuilder, PatchAnnotation, TypeDefBuilder};

// ================================================================================================
// Matching and Editing
// ================================================================================================

/// Pattern matching
pub use crate::pattern::{Pattern, Predicate};

/// Cursors
pub use crate::cursor::{Cursor, MethodEditor, MoveType};

// ================================================================================================
// Patching
// ================================================================================================

/// Flags and version gating
pub use crate::flags::{FlagEnvironment, FlagProbe, VersionSource};

/// Routines, registry and session
pub use crate::patcher::{
    FnRoutine, MethodShape, PatchContext, PatchOrdering, PatchRegistry, PatchReport,
    PatchRoutine, PatchSession, SessionPhase,
};

/// Session configuration
pub use crate::config::PatchConfig;
