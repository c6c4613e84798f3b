//! Locating the body a routine should actually edit.
//!
//! Compilers move the code of iterator and async methods into a nested state-machine
//! type; the annotated method itself becomes a shell that only constructs the state
//! machine. Routines declare which [`MethodShape`] they were written against, and the
//! [`BodyResolver`] maps the annotated method to the method holding that code.

use std::collections::HashMap;

use log::debug;
use strum::{Display, EnumString};

use crate::{
    metadata::{MethodDef, Module, Token, TypeDef},
    Error, Result,
};

/// Interface implemented by iterator state machines.
pub const ITERATOR_INTERFACE: &str = "System.Collections.IEnumerator";
/// Interface implemented by async state machines.
pub const ASYNC_INTERFACE: &str = "System.Runtime.CompilerServices.IAsyncStateMachine";
/// Prefix under which a replaced method keeps its original body.
pub const ORIGINAL_PREFIX: &str = "orig_";

/// The code shape a routine expects to edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
pub enum MethodShape {
    /// The annotated method itself
    #[default]
    Plain,
    /// `MoveNext` of the iterator state machine behind the annotated method
    Iterator,
    /// `MoveNext` of the async state machine behind the annotated method
    Async,
    /// The `orig_` copy of the annotated method in the same type
    Original,
}

/// Maps annotated methods to the methods a routine edits, caching every answer.
#[derive(Debug, Default)]
pub struct BodyResolver {
    cache: HashMap<(Token, MethodShape), Token>,
}

impl BodyResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the method holding the `shape` code of `method`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MethodNotFound`] for an unknown token and
    /// [`crate::Error::ResolutionFailure`] if no matching implementation exists.
    pub fn resolve(&mut self, module: &Module, method: Token, shape: MethodShape) -> Result<Token> {
        if let Some(resolved) = self.cache.get(&(method, shape)) {
            return Ok(*resolved);
        }

        let def = module
            .method(method)
            .ok_or_else(|| Error::MethodNotFound(method.to_string()))?;
        let resolved = match shape {
            MethodShape::Plain => method,
            MethodShape::Iterator => state_machine(module, def, shape, ITERATOR_INTERFACE)?,
            MethodShape::Async => state_machine(module, def, shape, ASYNC_INTERFACE)?,
            MethodShape::Original => original(module, def)?,
        };
        if resolved != method {
            debug!("Resolved {} body of {} to {}", shape, def.id(), resolved);
        }

        self.cache.insert((method, shape), resolved);
        Ok(resolved)
    }

    /// Returns the number of cached resolutions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns true if nothing has been resolved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

fn failure(def: &MethodDef, shape: MethodShape, reason: impl Into<String>) -> Error {
    Error::ResolutionFailure {
        method: def.id(),
        shape: shape.to_string(),
        reason: reason.into(),
    }
}

fn declaring_type<'m>(module: &'m Module, def: &MethodDef, shape: MethodShape) -> Result<&'m TypeDef> {
    module
        .find_type(&def.declaring_type.full_name)
        .ok_or_else(|| failure(def, shape, "declaring type is not defined in the module"))
}

fn state_machine(
    module: &Module,
    def: &MethodDef,
    shape: MethodShape,
    interface: &str,
) -> Result<Token> {
    let owner = declaring_type(module, def, shape)?;
    let prefix = format!("<{}>d__", def.name);

    let machine = module
        .nested_types(owner.token)
        .find(|ty| ty.name().starts_with(&prefix) && ty.implements(interface))
        .ok_or_else(|| {
            failure(
                def,
                shape,
                format!("no nested {prefix}* type implementing {interface}"),
            )
        })?;

    module
        .methods_of(machine.token)
        .find(|m| m.name == "MoveNext")
        .map(|m| m.token)
        .ok_or_else(|| failure(def, shape, format!("{} has no MoveNext", machine.full_name)))
}

fn original(module: &Module, def: &MethodDef) -> Result<Token> {
    let shape = MethodShape::Original;
    let owner = declaring_type(module, def, shape)?;
    let name = format!("{ORIGINAL_PREFIX}{}", def.name);

    module
        .methods_of(owner.token)
        .find(|m| m.name == name && m.signature.params == def.signature.params)
        .map(|m| m.token)
        .ok_or_else(|| failure(def, shape, format!("no {name} with the same parameters")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MethodDefBuilder, TypeDefBuilder, TypeRef};

    struct Fixture {
        module: Module,
        routine: Token,
        routine_move_next: Token,
        load: Token,
        load_move_next: Token,
        update: Token,
        orig_update: Token,
    }

    fn fixture() -> Fixture {
        let mut module = Module::new("Game.exe");
        let level = TypeDefBuilder::new("Game.Level").build(&mut module).unwrap();

        let routine = MethodDefBuilder::new("Routine")
            .returns(TypeRef::new("System.Collections.IEnumerator"))
            .build(&mut module, level)
            .unwrap();
        let load = MethodDefBuilder::new("Load").build(&mut module, level).unwrap();
        let update = MethodDefBuilder::new("Update")
            .param(TypeRef::int32())
            .build(&mut module, level)
            .unwrap();
        MethodDefBuilder::new("orig_Update")
            .build(&mut module, level)
            .unwrap();
        let orig_update = MethodDefBuilder::new("orig_Update")
            .param(TypeRef::int32())
            .build(&mut module, level)
            .unwrap();

        // a display class nested next to the state machine must not be picked up
        let decoy = TypeDefBuilder::new("<>c__DisplayClass3_0")
            .nested_in(level)
            .build(&mut module)
            .unwrap();
        MethodDefBuilder::new("MoveNext").build(&mut module, decoy).unwrap();

        let iterator = TypeDefBuilder::new("<Routine>d__12")
            .nested_in(level)
            .implements(ITERATOR_INTERFACE)
            .build(&mut module)
            .unwrap();
        let routine_move_next = MethodDefBuilder::new("MoveNext")
            .returns(TypeRef::boolean())
            .build(&mut module, iterator)
            .unwrap();

        let machine = TypeDefBuilder::new("<Load>d__7")
            .nested_in(level)
            .implements(ASYNC_INTERFACE)
            .build(&mut module)
            .unwrap();
        let load_move_next = MethodDefBuilder::new("MoveNext").build(&mut module, machine).unwrap();

        Fixture {
            module,
            routine,
            routine_move_next,
            load,
            load_move_next,
            update,
            orig_update,
        }
    }

    #[test]
    fn test_resolve_shapes() {
        let f = fixture();
        let mut resolver = BodyResolver::new();

        assert_eq!(
            resolver.resolve(&f.module, f.update, MethodShape::Plain).unwrap(),
            f.update
        );
        assert_eq!(
            resolver.resolve(&f.module, f.routine, MethodShape::Iterator).unwrap(),
            f.routine_move_next
        );
        assert_eq!(
            resolver.resolve(&f.module, f.load, MethodShape::Async).unwrap(),
            f.load_move_next
        );
        assert_eq!(
            resolver.resolve(&f.module, f.update, MethodShape::Original).unwrap(),
            f.orig_update
        );
        assert_eq!(resolver.len(), 4);
    }

    #[test]
    fn test_resolution_failures() {
        let f = fixture();
        let mut resolver = BodyResolver::new();

        // the iterator of `Routine` is not an async state machine
        match resolver.resolve(&f.module, f.routine, MethodShape::Async) {
            Err(Error::ResolutionFailure { method, shape, .. }) => {
                assert_eq!(method, "System.Collections.IEnumerator Game.Level::Routine()");
                assert_eq!(shape, "Async");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            resolver.resolve(&f.module, f.load, MethodShape::Original),
            Err(Error::ResolutionFailure { .. })
        ));
        assert!(matches!(
            resolver.resolve(&f.module, Token::method_def(99), MethodShape::Plain),
            Err(Error::MethodNotFound(_))
        ));
        assert!(resolver.is_empty());
    }
}
