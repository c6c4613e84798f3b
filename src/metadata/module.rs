//! In-memory method table of a target module.
//!
//! # Architecture
//!
//! A [`Module`] holds the definitions the patch engine works on: the referenced
//! assemblies, a flat type table and a flat method table. Both tables are addressed
//! by [`Token`] rows, so table order is token order and a `MethodDef` token is a
//! stable method identity for the whole session.
//!
//! Nested types are ordinary rows that point at their declaring type; the declaring
//! type lists them in `nested`. This is what the state-machine resolver walks to find
//! compiler-generated classes such as `<DashCoroutine>d__427`.
//!
//! Rows are added through [`crate::metadata::TypeDefBuilder`] and
//! [`crate::metadata::MethodDefBuilder`].

use bitflags::bitflags;

use crate::{
    body::InstructionStream,
    metadata::{
        annotation::PatchAnnotation,
        member::{FieldRef, MethodRef, MethodSig, TypeRef},
        token::Token,
        version::BuildVersion,
    },
    Error, Result,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method attributes relevant to patching
    pub struct MethodAttributes: u32 {
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// Runtime should check name encoding
        const RT_SPECIAL_NAME = 0x1000;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method implementation flags relevant to patching
    pub struct MethodImplFlags: u32 {
        /// Method cannot be inlined
        const NO_INLINING = 0x0008;
        /// Method signature is not to be mangled to do HRESULT conversion
        const PRESERVE_SIG = 0x0080;
        /// Reserved for internal use
        const INTERNAL_CALL = 0x1000;
    }
}

/// Import information of a P/Invoke method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PInvokeInfo {
    /// Name of the native module, e.g. `"fmodstudio"`
    pub module: String,
    /// Exported symbol name
    pub entry_point: String,
}

/// A referenced assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyRef {
    /// Simple assembly name, e.g. `"FNA"`
    pub name: String,
    /// Referenced version, if known
    pub version: Option<BuildVersion>,
}

/// A field definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field token
    pub token: Token,
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: TypeRef,
    /// True for static fields
    pub is_static: bool,
}

/// A type definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    /// TypeDef token
    pub token: Token,
    /// Full name, nested types separated by `/`
    pub full_name: String,
    /// Declaring type of a nested type
    pub declaring_type: Option<Token>,
    /// Implemented interfaces
    pub interfaces: Vec<TypeRef>,
    /// Methods in table order
    pub methods: Vec<Token>,
    /// Fields
    pub fields: Vec<FieldDef>,
    /// Directly nested types
    pub nested: Vec<Token>,
}

impl TypeDef {
    /// Returns a reference to this type.
    #[must_use]
    pub fn to_ref(&self) -> TypeRef {
        TypeRef::new(self.full_name.clone())
    }

    /// Returns the simple name of this type.
    #[must_use]
    pub fn name(&self) -> &str {
        let tail = self
            .full_name
            .rsplit_once('/')
            .map_or(self.full_name.as_str(), |(_, nested)| nested);
        tail.rsplit_once('.').map_or(tail, |(_, name)| name)
    }

    /// Returns true if this type implements the interface `full_name`.
    #[must_use]
    pub fn implements(&self, full_name: &str) -> bool {
        self.interfaces.iter().any(|i| i.is(full_name))
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A method definition.
#[derive(Debug, Clone)]
pub struct MethodDef {
    /// MethodDef token
    pub token: Token,
    /// Method name
    pub name: String,
    /// The declaring type
    pub declaring_type: TypeRef,
    /// Signature
    pub signature: MethodSig,
    /// Attributes
    pub attributes: MethodAttributes,
    /// Implementation flags
    pub impl_flags: MethodImplFlags,
    /// P/Invoke import, for extern methods
    pub pinvoke: Option<PInvokeInfo>,
    /// Method body, `None` for abstract and extern methods
    pub body: Option<InstructionStream>,
    /// Patch annotations, in declaration order
    pub annotations: Vec<PatchAnnotation>,
}

impl MethodDef {
    /// Returns a reference to this method.
    #[must_use]
    pub fn to_ref(&self) -> MethodRef {
        MethodRef::new(
            self.declaring_type.clone(),
            self.name.clone(),
            self.signature.clone(),
        )
    }

    /// Returns the unique textual identity, `ReturnType Type::Name(Params)`.
    #[must_use]
    pub fn id(&self) -> String {
        self.to_ref().id()
    }

    /// Returns true for static methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.attributes.contains(MethodAttributes::STATIC)
    }

    /// Returns true if the method is implemented through P/Invoke.
    #[must_use]
    pub fn is_pinvoke(&self) -> bool {
        self.pinvoke.is_some() || self.attributes.contains(MethodAttributes::PINVOKE_IMPL)
    }
}

/// The method table of one target module.
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Module name
    pub name: String,
    /// Referenced assemblies
    pub assembly_refs: Vec<AssemblyRef>,
    types: Vec<TypeDef>,
    methods: Vec<MethodDef>,
}

impl Module {
    /// Creates an empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Adds an assembly reference.
    pub fn add_assembly_ref(&mut self, name: impl Into<String>, version: Option<BuildVersion>) {
        self.assembly_refs.push(AssemblyRef {
            name: name.into(),
            version,
        });
    }

    /// Returns true if any referenced assembly name contains `marker`.
    #[must_use]
    pub fn references_assembly(&self, marker: &str) -> bool {
        self.assembly_refs.iter().any(|r| r.name.contains(marker))
    }

    /// Iterates over all types in table order.
    pub fn types(&self) -> impl Iterator<Item = &TypeDef> + '_ {
        self.types.iter()
    }

    /// Iterates over all methods in table order.
    pub fn methods(&self) -> impl Iterator<Item = &MethodDef> + '_ {
        self.methods.iter()
    }

    /// Iterates mutably over all methods in table order.
    pub fn methods_mut(&mut self) -> impl Iterator<Item = &mut MethodDef> + '_ {
        self.methods.iter_mut()
    }

    /// Returns the number of method rows.
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Looks up a type by token.
    #[must_use]
    pub fn type_def(&self, token: Token) -> Option<&TypeDef> {
        if token.table() != Token::TYPE_DEF || token.row() == 0 {
            return None;
        }
        self.types.get(token.row() as usize - 1)
    }

    /// Looks up a type by full name.
    #[must_use]
    pub fn find_type(&self, full_name: &str) -> Option<&TypeDef> {
        self.types.iter().find(|t| t.full_name == full_name)
    }

    /// Looks up a method by token.
    #[must_use]
    pub fn method(&self, token: Token) -> Option<&MethodDef> {
        if !token.is_method_def() {
            return None;
        }
        self.methods.get(token.row() as usize - 1)
    }

    /// Looks up a method by token, mutably.
    pub fn method_mut(&mut self, token: Token) -> Option<&mut MethodDef> {
        if !token.is_method_def() {
            return None;
        }
        self.methods.get_mut(token.row() as usize - 1)
    }

    /// Returns the methods declared by `type_token`, in table order.
    pub fn methods_of(&self, type_token: Token) -> impl Iterator<Item = &MethodDef> + '_ {
        self.type_def(type_token)
            .into_iter()
            .flat_map(|t| t.methods.iter())
            .filter_map(|token| self.method(*token))
    }

    /// Finds the first method called `name` on the type `type_name`.
    #[must_use]
    pub fn find_method(&self, type_name: &str, name: &str) -> Option<&MethodDef> {
        let ty = self.find_type(type_name)?;
        self.methods_of(ty.token).find(|m| m.name == name)
    }

    /// Finds a method by its full identity (see [`MethodDef::id`]).
    #[must_use]
    pub fn find_method_by_id(&self, id: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.id() == id)
    }

    /// Finds a field on the type `type_name`.
    #[must_use]
    pub fn find_field(&self, type_name: &str, name: &str) -> Option<FieldRef> {
        let ty = self.find_type(type_name)?;
        ty.field(name)
            .map(|f| FieldRef::new(ty.to_ref(), f.name.clone(), f.field_type.clone()))
    }

    /// Returns the types directly nested in `type_token`.
    pub fn nested_types(&self, type_token: Token) -> impl Iterator<Item = &TypeDef> + '_ {
        self.type_def(type_token)
            .into_iter()
            .flat_map(|t| t.nested.iter())
            .filter_map(|token| self.type_def(*token))
    }

    pub(crate) fn insert_type(
        &mut self,
        full_name: String,
        declaring_type: Option<Token>,
        interfaces: Vec<TypeRef>,
        fields: Vec<(String, TypeRef, bool)>,
    ) -> Result<Token> {
        if self.find_type(&full_name).is_some() {
            return Err(malformed_error!("Type {} is defined twice", full_name));
        }
        let row = u32::try_from(self.types.len() + 1)
            .map_err(|_| malformed_error!("Type table overflow"))?;
        let token = Token::type_def(row);

        if let Some(parent) = declaring_type {
            let parent_index = self
                .type_def(parent)
                .map(|_| parent.row() as usize - 1)
                .ok_or_else(|| Error::MethodNotFound(format!("declaring type {parent}")))?;
            self.types[parent_index].nested.push(token);
        }

        let field_base = self.types.iter().map(|t| t.fields.len()).sum::<usize>();
        let fields = fields
            .into_iter()
            .enumerate()
            .map(|(i, (name, field_type, is_static))| FieldDef {
                token: Token::field_def((field_base + i + 1) as u32),
                name,
                field_type,
                is_static,
            })
            .collect();

        self.types.push(TypeDef {
            token,
            full_name,
            declaring_type,
            interfaces,
            methods: Vec::new(),
            fields,
            nested: Vec::new(),
        });
        Ok(token)
    }

    pub(crate) fn insert_method(&mut self, type_token: Token, mut method: MethodDef) -> Result<Token> {
        let type_index = self
            .type_def(type_token)
            .map(|_| type_token.row() as usize - 1)
            .ok_or_else(|| Error::MethodNotFound(format!("declaring type {type_token}")))?;
        let row = u32::try_from(self.methods.len() + 1)
            .map_err(|_| malformed_error!("Method table overflow"))?;
        let token = Token::method_def(row);

        method.token = token;
        method.declaring_type = self.types[type_index].to_ref();
        let id = method.id();
        if let Some(body) = &mut method.body {
            body.set_owner(id);
        }

        self.types[type_index].methods.push(token);
        self.methods.push(method);
        Ok(token)
    }
}
