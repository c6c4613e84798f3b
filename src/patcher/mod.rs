//! Flag-gated patch registry and the session that applies it.
//!
//! # Architecture
//!
//! Patch routines are registered by name in a [`PatchRegistry`]. Methods of the target
//! opt into routines through [`crate::metadata::PatchAnnotation`]s. A [`PatchSession`]
//! connects the two:
//!
//! ```text
//! Idle -> Scanning -> Resolving -> ApplyingImmediate -> ApplyingDeferred
//!      -> PostProcessing -> Done            (or Failed from any phase)
//! ```
//!
//! - **Scanning** walks the method table in order and turns every annotation whose
//!   flag gate holds into a [`PatchDescriptor`].
//! - **Resolving** uses the [`BodyResolver`] to point each descriptor at the body the
//!   routine was written against (see [`MethodShape`]).
//! - **Applying** runs immediate descriptors in scan order, then deferred descriptors by
//!   routine registration order. Deferred routines therefore see every immediate edit.
//!   Every method a routine touched is validated right after it returns.
//! - **PostProcessing** stubs externs and repairs operand encodings module-wide.
//!
//! # Key Components
//!
//! - [`PatchRoutine`] / [`FnRoutine`] - The unit of patching
//! - [`PatchContext`] - What a routine can see and edit
//! - [`PatchReport`] - Outcome of a successful session

mod context;
mod descriptor;
pub mod postprocess;
mod registry;
mod report;
mod resolver;
mod routine;
mod session;

pub use context::PatchContext;
pub use descriptor::{schedule, PatchDescriptor, PatchOrdering};
pub use registry::PatchRegistry;
pub use report::{AppliedPatch, PatchReport, SkippedPatch};
pub use resolver::{BodyResolver, MethodShape, ASYNC_INTERFACE, ITERATOR_INTERFACE, ORIGINAL_PREFIX};
pub use routine::{FnRoutine, PatchRoutine};
pub use session::{PatchSession, SessionPhase};
