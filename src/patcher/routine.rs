use std::fmt;

use crate::{
    metadata::Token,
    patcher::{MethodShape, PatchContext, PatchOrdering},
    Result,
};

/// A named edit applied to every method annotated with its name.
///
/// # Examples
///
/// ```rust
/// use cilpatch::assembly::OpCode;
/// use cilpatch::cursor::MoveType;
/// use cilpatch::metadata::Token;
/// use cilpatch::patcher::{PatchContext, PatchRoutine};
/// use cilpatch::pattern::Predicate;
/// use cilpatch::Result;
///
/// struct DisableThrow;
///
/// impl PatchRoutine for DisableThrow {
///     fn name(&self) -> &str {
///         "DisableThrow"
///     }
///
///     fn apply(&self, ctx: &mut PatchContext<'_>, target: Token) -> Result<()> {
///         ctx.edit(target, |editor| {
///             let mut cursor = editor.cursor();
///             while cursor.try_goto_next(MoveType::Before, Predicate::op(OpCode::Throw)) {
///                 cursor.replace_opcode(OpCode::Pop)?;
///             }
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait PatchRoutine {
    /// Unique name, as used by annotations.
    fn name(&self) -> &str;

    /// When the routine runs relative to others.
    fn ordering(&self) -> PatchOrdering {
        PatchOrdering::Immediate
    }

    /// Which body of the annotated method the routine edits.
    fn shape(&self) -> MethodShape {
        MethodShape::Plain
    }

    /// Get a description of what this routine does.
    fn description(&self) -> &str {
        "No description available"
    }

    /// Applies the routine to `target`, the resolved method.
    ///
    /// # Errors
    ///
    /// Any error aborts the whole session.
    fn apply(&self, ctx: &mut PatchContext<'_>, target: Token) -> Result<()>;
}

/// A [`PatchRoutine`] backed by a closure.
pub struct FnRoutine<F> {
    name: String,
    ordering: PatchOrdering,
    shape: MethodShape,
    description: String,
    apply: F,
}

impl<F> FnRoutine<F>
where
    F: Fn(&mut PatchContext<'_>, Token) -> Result<()>,
{
    /// Creates an immediate, plain-shape routine.
    pub fn new(name: impl Into<String>, apply: F) -> Self {
        FnRoutine {
            name: name.into(),
            ordering: PatchOrdering::Immediate,
            shape: MethodShape::Plain,
            description: String::new(),
            apply,
        }
    }

    /// Sets the ordering class.
    #[must_use]
    pub fn with_ordering(mut self, ordering: PatchOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Sets the expected method shape.
    #[must_use]
    pub fn with_shape(mut self, shape: MethodShape) -> Self {
        self.shape = shape;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl<F> PatchRoutine for FnRoutine<F>
where
    F: Fn(&mut PatchContext<'_>, Token) -> Result<()>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn ordering(&self) -> PatchOrdering {
        self.ordering
    }

    fn shape(&self) -> MethodShape {
        self.shape
    }

    fn description(&self) -> &str {
        if self.description.is_empty() {
            "No description available"
        } else {
            &self.description
        }
    }

    fn apply(&self, ctx: &mut PatchContext<'_>, target: Token) -> Result<()> {
        (self.apply)(ctx, target)
    }
}

impl<F> fmt::Debug for FnRoutine<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRoutine")
            .field("name", &self.name)
            .field("ordering", &self.ordering)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}
