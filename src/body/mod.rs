//! Method bodies as editable instruction streams.
//!
//! # Key Components
//!
//! - [`InstructionStream`] - Arena of instruction slots with identity-based labels
//! - [`InstrId`] / [`Label`] - Stable handles that survive edits
//! - [`LabelTable`] - The branch resolver mapping labels to instructions
//! - [`BodyBuilder`] - Builds streams with named, forward-referencable labels

mod builder;
mod label;
mod stream;

pub use builder::BodyBuilder;
pub use label::{InstrId, Label, LabelTable};
pub use stream::{InstructionStream, LocalVariable};
