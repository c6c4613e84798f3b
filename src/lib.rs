// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # cilpatch
//!
//! A patch engine for CIL method bodies. Patch routines locate code by pattern instead
//! of by offset, so one catalogue of patches can be applied to every build of a target
//! whose shape still matches.
//!
//! ## Features
//!
//! - **Identity-labelled instruction streams** - Branches point at instructions, not offsets,
//!   and survive arbitrary insertion and removal around them
//! - **Pattern cursors** - Navigate a body with predicate sequences, then emit, remove or
//!   replace code at the cursor
//! - **Flag environments** - Patches are gated on flags derived from the target (referenced
//!   assemblies, present types and fields, host OS) and on a version read from its code
//! - **Transactional sessions** - All patches apply or none do; a marker type prevents
//!   patching a target twice
//! - **Post-processing** - Extern stubbing for headless runs and branch widening after edits
//!
//! ## Quick Start
//!
//! ```rust
//! use cilpatch::prelude::*;
//!
//! let mut module = Module::new("Game.exe");
//! let player = TypeDefBuilder::new("Game.Player").build(&mut module)?;
//! let mut body = BodyBuilder::new();
//! body.emit(Instruction::ldarg(0))?
//!     .emit(Instruction::ldc_i4(3))?
//!     .emit(Instruction::ret())?;
//! MethodDefBuilder::new("MaxDashes")
//!     .returns(TypeRef::int32())
//!     .body(body.build()?)
//!     .annotate(PatchAnnotation::new("MoreDashes"))
//!     .build(&mut module, player)?;
//!
//! let mut registry = PatchRegistry::new();
//! registry.register_fn("MoreDashes", |ctx, target| {
//!     ctx.edit(target, |editor| {
//!         let mut cursor = editor.cursor();
//!         cursor.goto_next(MoveType::Before, Predicate::int(3))?;
//!         cursor.replace(Instruction::ldc_i4(5))?;
//!         Ok(())
//!     })
//! })?;
//!
//! let report = PatchSession::new(&registry, PatchConfig::default()).run(&mut module)?;
//! assert_eq!(report.applied.len(), 1);
//! # Ok::<(), cilpatch::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`assembly`] - Opcodes, operands and instructions
//! - [`body`] - The instruction stream with its label table, and a builder for new bodies
//! - [`metadata`] - The in-memory module model: types, methods, fields, annotations
//! - [`pattern`] - Instruction predicates and the pattern matcher
//! - [`cursor`] - Navigation and editing within one method body
//! - [`flags`] - Flag probes, version reconstruction and the flag environment
//! - [`patcher`] - Routine registry, patch session and post-processing
//! - [`config`] - Session configuration
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`Result`], carrying an [`Error`]. Errors raised
//! while a routine runs are wrapped with the routine name and the target method, see
//! [`Error::PatchFailed`].

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use cilpatch::prelude::*;
///
/// let registry = PatchRegistry::new();
/// let session = PatchSession::new(&registry, PatchConfig::default());
/// assert_eq!(session.phase(), SessionPhase::Idle);
/// ```
pub mod prelude;

/// CIL opcodes, operands and instructions
///
/// Instructions are kept decoded; a branch operand is a [`body::Label`], not a byte
/// displacement. Encoded sizes are still known per opcode so layouts can be computed.
pub mod assembly;

/// Method bodies as arena-backed instruction streams
pub mod body;

/// Session configuration
pub mod config;

pub mod cursor;

pub mod flags;

/// The in-memory module model
///
/// A [`metadata::Module`] holds type, method and field definitions addressed by
/// [`metadata::Token`]. Methods carry their body and their [`metadata::PatchAnnotation`]s.
pub mod metadata;

pub mod patcher;

pub mod pattern;

/// `cilpatch` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `cilpatch` Error type
///
/// Lists every failure the engine reports, from version gating to dangling branches.
pub use error::Error;
