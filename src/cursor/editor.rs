use std::cell::{Ref, RefCell};

use crate::{
    body::InstructionStream,
    cursor::Cursor,
    metadata::Token,
    Result,
};

/// Edit session over one method body.
///
/// The editor owns the body's [`InstructionStream`] behind a `RefCell`, which is what
/// allows several [`Cursor`]s over the same body to coexist: every cursor operation
/// borrows the stream only for its own duration, and edits made through one cursor
/// are immediately visible to all others.
#[derive(Debug)]
pub struct MethodEditor {
    pub(crate) stream: RefCell<InstructionStream>,
    token: Token,
    method: String,
}

impl MethodEditor {
    /// Wraps `stream`, the body of the method `token` / `method`.
    pub fn new(token: Token, method: impl Into<String>, stream: InstructionStream) -> Self {
        MethodEditor {
            stream: RefCell::new(stream),
            token,
            method: method.into(),
        }
    }

    /// Returns the token of the edited method.
    #[must_use]
    pub fn token(&self) -> Token {
        self.token
    }

    /// Returns the identity of the edited method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns a cursor positioned before the first instruction.
    #[must_use]
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor::new(self)
    }

    /// Returns a cursor positioned before the instruction at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if `index > len()`.
    pub fn cursor_at(&self, index: usize) -> Result<Cursor<'_>> {
        let mut cursor = Cursor::new(self);
        cursor.goto(index)?;
        Ok(cursor)
    }

    /// Borrows the stream for reading.
    ///
    /// # Panics
    ///
    /// Panics if called while a cursor edit holds the stream mutably. The returned `Ref`
    /// also blocks edits: drop it before calling any editing method of a [`Cursor`],
    /// or that call panics.
    #[must_use]
    pub fn stream(&self) -> Ref<'_, InstructionStream> {
        read_stream!(self)
    }

    /// Returns the number of instructions in the body.
    #[must_use]
    pub fn len(&self) -> usize {
        read_stream!(self).len()
    }

    /// Returns true if the body is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        read_stream!(self).is_empty()
    }

    /// Checks the body for dangling branch targets.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingBranchTarget`] for the first violation.
    pub fn validate(&self) -> Result<()> {
        read_stream!(self).validate()
    }

    /// Ends the edit session and returns the body.
    #[must_use]
    pub fn into_stream(self) -> InstructionStream {
        self.stream.into_inner()
    }
}
