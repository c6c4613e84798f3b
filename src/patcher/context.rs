use std::collections::{BTreeSet, HashMap};

use log::trace;

use crate::{
    config::PatchConfig,
    cursor::MethodEditor,
    flags::FlagEnvironment,
    metadata::{FieldRef, MethodDef, MethodRef, Module, Token, TypeRef},
    Error, Result,
};

/// Member lookups shared by all routines of a session.
///
/// Entries are only ever added; a lookup that failed is not cached.
#[derive(Debug, Default)]
pub(crate) struct LookupCache {
    methods: HashMap<String, MethodRef>,
    fields: HashMap<String, FieldRef>,
}

/// Everything a routine sees while it is applied.
///
/// Method bodies are edited through [`PatchContext::edit`], which lends the body to a
/// [`MethodEditor`] and records the method as touched so the session can validate it
/// once the routine returns.
pub struct PatchContext<'a> {
    module: &'a mut Module,
    flags: &'a FlagEnvironment,
    config: &'a PatchConfig,
    cache: &'a mut LookupCache,
    touched: BTreeSet<Token>,
    routine: &'a str,
    annotated: Token,
    target: Token,
}

impl<'a> PatchContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        module: &'a mut Module,
        flags: &'a FlagEnvironment,
        config: &'a PatchConfig,
        cache: &'a mut LookupCache,
        routine: &'a str,
        annotated: Token,
        target: Token,
    ) -> Self {
        PatchContext {
            module,
            flags,
            config,
            cache,
            touched: BTreeSet::new(),
            routine,
            annotated,
            target,
        }
    }

    /// Returns the flag environment of the session.
    #[must_use]
    pub fn flags(&self) -> &FlagEnvironment {
        self.flags
    }

    /// Returns the session configuration.
    #[must_use]
    pub fn config(&self) -> &PatchConfig {
        self.config
    }

    /// Returns the module being patched.
    #[must_use]
    pub fn module(&self) -> &Module {
        self.module
    }

    /// Returns the name of the routine being applied.
    #[must_use]
    pub fn routine(&self) -> &str {
        self.routine
    }

    /// Returns the resolved method the routine was applied to.
    #[must_use]
    pub fn target(&self) -> Token {
        self.target
    }

    /// Returns the method carrying the annotation, before state-machine resolution.
    #[must_use]
    pub fn annotated(&self) -> Token {
        self.annotated
    }

    /// Returns the definition of the annotated method.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MethodNotFound`] if the token is unknown.
    pub fn annotated_method(&self) -> Result<&MethodDef> {
        self.method(self.annotated)
    }

    /// Returns a method definition.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MethodNotFound`] if the token is unknown.
    pub fn method(&self, token: Token) -> Result<&MethodDef> {
        self.module
            .method(token)
            .ok_or_else(|| Error::MethodNotFound(token.to_string()))
    }

    /// Edits the body of `token`.
    ///
    /// The body is handed to `f` inside a [`MethodEditor`] and put back afterwards,
    /// whether `f` succeeds or not.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MethodNotFound`] or [`crate::Error::MissingBody`] if there is
    /// nothing to edit, otherwise whatever `f` returns.
    pub fn edit<R, F>(&mut self, token: Token, f: F) -> Result<R>
    where
        F: FnOnce(&MethodEditor) -> Result<R>,
    {
        let method = self
            .module
            .method_mut(token)
            .ok_or_else(|| Error::MethodNotFound(token.to_string()))?;
        let id = method.id();
        let stream = method.body.take().ok_or_else(|| Error::MissingBody(id.clone()))?;

        trace!("{}: editing {}", self.routine, id);
        let editor = MethodEditor::new(token, id, stream);
        let result = f(&editor);
        method.body = Some(editor.into_stream());
        self.touched.insert(token);
        result
    }

    /// Edits the body of the resolved target method.
    ///
    /// # Errors
    ///
    /// See [`PatchContext::edit`].
    pub fn edit_target<R, F>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&MethodEditor) -> Result<R>,
    {
        self.edit(self.target, f)
    }

    /// Returns a reference to a type defined in the module.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MethodNotFound`] if the type does not exist.
    pub fn find_type(&self, full_name: &str) -> Result<TypeRef> {
        self.module
            .find_type(full_name)
            .map(|ty| ty.to_ref())
            .ok_or_else(|| Error::MethodNotFound(format!("type {full_name}")))
    }

    /// Returns a reference to the first method `name` of `type_name`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MethodNotFound`] if there is no such method.
    pub fn find_method(&mut self, type_name: &str, name: &str) -> Result<MethodRef> {
        let key = format!("{type_name}::{name}");
        if let Some(found) = self.cache.methods.get(&key) {
            return Ok(found.clone());
        }
        let found = self
            .module
            .find_method(type_name, name)
            .map(MethodDef::to_ref)
            .ok_or_else(|| Error::MethodNotFound(key.clone()))?;
        self.cache.methods.insert(key, found.clone());
        Ok(found)
    }

    /// Returns a reference to the method with the identity `id`,
    /// `ReturnType Type::Name(Params)`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MethodNotFound`] if there is no such method.
    pub fn find_method_by_id(&mut self, id: &str) -> Result<MethodRef> {
        if let Some(found) = self.cache.methods.get(id) {
            return Ok(found.clone());
        }
        let found = self
            .module
            .find_method_by_id(id)
            .map(MethodDef::to_ref)
            .ok_or_else(|| Error::MethodNotFound(id.to_string()))?;
        self.cache.methods.insert(id.to_string(), found.clone());
        Ok(found)
    }

    /// Returns a reference to the field `name` of `type_name`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MethodNotFound`] if there is no such field.
    pub fn find_field(&mut self, type_name: &str, name: &str) -> Result<FieldRef> {
        let key = format!("{type_name}::{name}");
        if let Some(found) = self.cache.fields.get(&key) {
            return Ok(found.clone());
        }
        let found = self
            .module
            .find_field(type_name, name)
            .ok_or_else(|| Error::MethodNotFound(format!("field {key}")))?;
        self.cache.fields.insert(key, found.clone());
        Ok(found)
    }

    /// Returns the methods edited so far.
    #[must_use]
    pub fn touched(&self) -> &BTreeSet<Token> {
        &self.touched
    }

    pub(crate) fn into_touched(self) -> BTreeSet<Token> {
        self.touched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::Instruction,
        body::BodyBuilder,
        cursor::MoveType,
        metadata::{BuildVersion, MethodDefBuilder, TypeDefBuilder},
        pattern::Predicate,
    };

    fn module() -> (Module, Token, Token) {
        let mut module = Module::new("Game.exe");
        let level = TypeDefBuilder::new("Game.Level")
            .field("Paused", TypeRef::boolean())
            .build(&mut module)
            .unwrap();
        let mut body = BodyBuilder::new();
        body.emit(Instruction::ldc_i4(1)).unwrap().emit(Instruction::ret()).unwrap();
        let update = MethodDefBuilder::new("Update")
            .returns(TypeRef::int32())
            .body(body.build().unwrap())
            .build(&mut module, level)
            .unwrap();
        let abstract_method = MethodDefBuilder::new("Render").build(&mut module, level).unwrap();
        (module, update, abstract_method)
    }

    #[test]
    fn test_edit_records_touched() {
        let (mut module, update, _) = module();
        let flags = FlagEnvironment::new(BuildVersion::short(1, 0));
        let config = PatchConfig::default();
        let mut cache = LookupCache::default();
        let mut ctx = PatchContext::new(
            &mut module, &flags, &config, &mut cache, "Test", update, update,
        );

        let len = ctx
            .edit_target(|editor| {
                let mut cursor = editor.cursor();
                cursor.goto_next(MoveType::Before, Predicate::int(1))?;
                cursor.replace(Instruction::ldc_i4(2))?;
                Ok(editor.len())
            })
            .unwrap();
        assert_eq!(len, 2);
        assert!(ctx.touched().contains(&update));
        assert_eq!(
            ctx.method(update).unwrap().body.as_ref().unwrap().get(0),
            Some(&Instruction::ldc_i4(2))
        );
    }

    #[test]
    fn test_failed_edit_keeps_body() {
        let (mut module, update, render) = module();
        let flags = FlagEnvironment::new(BuildVersion::short(1, 0));
        let config = PatchConfig::default();
        let mut cache = LookupCache::default();
        let mut ctx = PatchContext::new(
            &mut module, &flags, &config, &mut cache, "Test", update, update,
        );

        let result: Result<()> = ctx.edit(update, |editor| {
            editor.cursor().goto_next(MoveType::Before, Predicate::int(5))
        });
        assert!(matches!(result, Err(Error::PatternNotFound { .. })));
        assert!(ctx.method(update).unwrap().body.is_some());

        assert!(matches!(
            ctx.edit(render, |_| Ok(())),
            Err(Error::MissingBody(_))
        ));
    }

    #[test]
    fn test_lookups_are_cached() {
        let (mut module, update, _) = module();
        let flags = FlagEnvironment::new(BuildVersion::short(1, 0));
        let config = PatchConfig::default();
        let mut cache = LookupCache::default();
        {
            let mut ctx = PatchContext::new(
                &mut module, &flags, &config, &mut cache, "Test", update, update,
            );
            let by_name = ctx.find_method("Game.Level", "Update").unwrap();
            let by_id = ctx.find_method_by_id("System.Int32 Game.Level::Update()").unwrap();
            assert_eq!(by_name, by_id);
            assert_eq!(ctx.find_field("Game.Level", "Paused").unwrap().name, "Paused");
            assert!(ctx.find_field("Game.Level", "Missing").is_err());
            assert!(ctx.find_type("Game.Level").is_ok());
        }
        assert_eq!(cache.methods.len(), 2);
        assert_eq!(cache.fields.len(), 1);
    }
}
