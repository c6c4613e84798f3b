//! Construction of instruction streams with named labels.
//!
//! [`BodyBuilder`] assembles an [`InstructionStream`] front to back. Branches refer to
//! labels by name and may reference a label before it is defined; everything is
//! resolved when [`BodyBuilder::build`] runs.
//!
//! # Examples
//!
//! ```rust
//! use cilpatch::assembly::{Instruction, OpCode};
//! use cilpatch::body::BodyBuilder;
//!
//! let mut builder = BodyBuilder::new();
//! builder
//!     .emit(Instruction::ldarg(0))?
//!     .emit_branch(OpCode::BrfalseS, "false_case")?
//!     .emit(Instruction::ldc_i4(1))?
//!     .emit(Instruction::ret())?
//!     .define_label("false_case")?
//!     .emit(Instruction::ldc_i4(0))?
//!     .emit(Instruction::ret())?;
//!
//! let stream = builder.build()?;
//! assert_eq!(stream.len(), 6);
//! # Ok::<(), cilpatch::Error>(())
//! ```

use std::collections::{HashMap, HashSet};

use crate::{
    assembly::{Instruction, OpCode},
    body::{label::Label, stream::InstructionStream},
    metadata::member::TypeRef,
    Result,
};

/// Builds an [`InstructionStream`] with forward-referencable named labels.
#[derive(Debug, Default)]
pub struct BodyBuilder {
    stream: InstructionStream,
    labels: HashMap<String, Label>,
    defined: HashSet<String>,
    pending: Vec<Label>,
}

impl BodyBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a local variable and returns its index.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the local table is full.
    pub fn local(&mut self, var_type: TypeRef) -> Result<u16> {
        self.stream.add_local(var_type)
    }

    /// Returns the label registered under `name`, creating it on first use.
    pub fn label(&mut self, name: &str) -> Label {
        if let Some(label) = self.labels.get(name) {
            return *label;
        }
        let label = self.stream.define_label();
        self.labels.insert(name.to_string(), label);
        label
    }

    /// Places the label `name` on the next emitted instruction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the label was already defined.
    pub fn define_label(&mut self, name: &str) -> Result<&mut Self> {
        if !self.defined.insert(name.to_string()) {
            return Err(malformed_error!("Label '{}' is defined twice", name));
        }
        let label = self.label(name);
        self.pending.push(label);
        Ok(self)
    }

    /// Appends an instruction.
    ///
    /// # Errors
    ///
    /// Returns an error if the instruction references a label of another stream.
    pub fn emit(&mut self, instr: Instruction) -> Result<&mut Self> {
        let id = self.stream.push(instr)?;
        for label in self.pending.drain(..) {
            self.stream.bind_label_to(label, Some(id));
        }
        Ok(self)
    }

    /// Appends an operand-less instruction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidOperand`] if the opcode requires an operand.
    pub fn emit_op(&mut self, opcode: OpCode) -> Result<&mut Self> {
        self.emit(Instruction::op(opcode)?)
    }

    /// Appends a branch to the label `name`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidOperand`] if `opcode` is not a branch.
    pub fn emit_branch(&mut self, opcode: OpCode, name: &str) -> Result<&mut Self> {
        let label = self.label(name);
        self.emit(Instruction::branch(opcode, label)?)
    }

    /// Appends a `switch` over the given labels.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if no target is given.
    pub fn emit_switch(&mut self, names: &[&str]) -> Result<&mut Self> {
        if names.is_empty() {
            return Err(malformed_error!("Switch needs at least one target"));
        }
        let targets = names.iter().map(|name| self.label(name)).collect();
        self.emit(Instruction::switch(targets))
    }

    /// Finishes the body.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a label is referenced but never defined or
    /// defined after the last instruction.
    pub fn build(self) -> Result<InstructionStream> {
        if !self.pending.is_empty() {
            return Err(malformed_error!(
                "{} label(s) defined after the last instruction",
                self.pending.len()
            ));
        }
        let mut undefined: Vec<&String> = self
            .labels
            .keys()
            .filter(|name| !self.defined.contains(*name))
            .collect();
        if !undefined.is_empty() {
            undefined.sort();
            return Err(malformed_error!("Undefined label(s): {:?}", undefined));
        }

        self.stream.validate()?;
        Ok(self.stream)
    }
}
