//! Fluent builders for type and method rows.
//!
//! # Examples
//!
//! ```rust
//! use cilpatch::body::BodyBuilder;
//! use cilpatch::assembly::Instruction;
//! use cilpatch::metadata::{MethodDefBuilder, Module, PatchAnnotation, TypeDefBuilder, TypeRef};
//!
//! let mut module = Module::new("Celeste.exe");
//! let level = TypeDefBuilder::new("Celeste.Level")
//!     .field("Paused", TypeRef::boolean())
//!     .build(&mut module)?;
//!
//! let mut body = BodyBuilder::new();
//! body.emit(Instruction::ret())?;
//!
//! let update = MethodDefBuilder::new("Update")
//!     .body(body.build()?)
//!     .annotate(PatchAnnotation::new("PatchLevelUpdate"))
//!     .build(&mut module, level)?;
//!
//! assert_eq!(module.method(update).map(|m| m.name.as_str()), Some("Update"));
//! # Ok::<(), cilpatch::Error>(())
//! ```

use crate::{
    body::InstructionStream,
    metadata::{
        annotation::PatchAnnotation,
        member::{MethodSig, TypeRef},
        module::{MethodAttributes, MethodDef, MethodImplFlags, Module, PInvokeInfo},
        token::Token,
    },
    Result,
};

/// Builder for type definitions.
pub struct TypeDefBuilder {
    name: String,
    declaring_type: Option<Token>,
    interfaces: Vec<TypeRef>,
    fields: Vec<(String, TypeRef, bool)>,
}

impl TypeDefBuilder {
    /// Creates a builder for a type.
    ///
    /// # Arguments
    ///
    /// * `name` - Full name for top-level types, simple name for nested types
    pub fn new(name: impl Into<String>) -> Self {
        TypeDefBuilder {
            name: name.into(),
            declaring_type: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Nests the type inside `declaring_type`.
    #[must_use]
    pub fn nested_in(mut self, declaring_type: Token) -> Self {
        self.declaring_type = Some(declaring_type);
        self
    }

    /// Adds an implemented interface.
    #[must_use]
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(TypeRef::new(interface));
        self
    }

    /// Adds an instance field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, field_type: TypeRef) -> Self {
        self.fields.push((name.into(), field_type, false));
        self
    }

    /// Adds a static field.
    #[must_use]
    pub fn static_field(mut self, name: impl Into<String>, field_type: TypeRef) -> Self {
        self.fields.push((name.into(), field_type, true));
        self
    }

    /// Adds the type to `module` and returns its token.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for an empty or duplicate name and
    /// [`crate::Error::MethodNotFound`] for an unknown declaring type.
    pub fn build(self, module: &mut Module) -> Result<Token> {
        if self.name.is_empty() {
            return Err(malformed_error!("Type name cannot be empty"));
        }

        let full_name = match self.declaring_type {
            Some(parent) => {
                let parent_name = module
                    .type_def(parent)
                    .map(|t| t.full_name.clone())
                    .ok_or_else(|| {
                        crate::Error::MethodNotFound(format!("declaring type {parent}"))
                    })?;
                format!("{}/{}", parent_name, self.name)
            }
            None => self.name,
        };

        module.insert_type(full_name, self.declaring_type, self.interfaces, self.fields)
    }
}

/// Builder for method definitions.
pub struct MethodDefBuilder {
    name: String,
    attributes: MethodAttributes,
    impl_flags: MethodImplFlags,
    return_type: TypeRef,
    params: Vec<TypeRef>,
    pinvoke: Option<PInvokeInfo>,
    body: Option<InstructionStream>,
    annotations: Vec<PatchAnnotation>,
}

impl MethodDefBuilder {
    /// Creates a builder for a public instance method returning `void`.
    pub fn new(name: impl Into<String>) -> Self {
        MethodDefBuilder {
            name: name.into(),
            attributes: MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG,
            impl_flags: MethodImplFlags::empty(),
            return_type: TypeRef::void(),
            params: Vec::new(),
            pinvoke: None,
            body: None,
            annotations: Vec::new(),
        }
    }

    /// Replaces the method attributes.
    #[must_use]
    pub fn flags(mut self, attributes: MethodAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Marks the method static.
    #[must_use]
    pub fn static_method(mut self) -> Self {
        self.attributes |= MethodAttributes::STATIC;
        self
    }

    /// Sets the return type.
    #[must_use]
    pub fn returns(mut self, return_type: TypeRef) -> Self {
        self.return_type = return_type;
        self
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(mut self, param_type: TypeRef) -> Self {
        self.params.push(param_type);
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: InstructionStream) -> Self {
        self.body = Some(body);
        self
    }

    /// Declares the method as a P/Invoke import from `module`.
    #[must_use]
    pub fn pinvoke(mut self, module: impl Into<String>, entry_point: impl Into<String>) -> Self {
        self.pinvoke = Some(PInvokeInfo {
            module: module.into(),
            entry_point: entry_point.into(),
        });
        self.attributes |= MethodAttributes::STATIC | MethodAttributes::PINVOKE_IMPL;
        self.impl_flags |= MethodImplFlags::PRESERVE_SIG;
        self
    }

    /// Attaches a patch annotation.
    #[must_use]
    pub fn annotate(mut self, annotation: PatchAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Adds the method to `declaring_type` in `module` and returns its token.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for an empty name or a P/Invoke method with a
    /// body, and [`crate::Error::MethodNotFound`] for an unknown declaring type.
    pub fn build(self, module: &mut Module, declaring_type: Token) -> Result<Token> {
        if self.name.is_empty() {
            return Err(malformed_error!("Method name cannot be empty"));
        }
        if self.pinvoke.is_some() && self.body.is_some() {
            return Err(malformed_error!(
                "P/Invoke method {} cannot have a body",
                self.name
            ));
        }

        let has_this = !self.attributes.contains(MethodAttributes::STATIC);
        let method = MethodDef {
            token: Token::new(0),
            name: self.name,
            declaring_type: TypeRef::new(""),
            signature: MethodSig {
                has_this,
                return_type: self.return_type,
                params: self.params,
            },
            attributes: self.attributes,
            impl_flags: self.impl_flags,
            pinvoke: self.pinvoke,
            body: self.body,
            annotations: self.annotations,
        };
        module.insert_method(declaring_type, method)
    }
}
