//! Metadata model of the target module.
//!
//! The patch engine does not parse binaries. It works on the definitions a loader
//! hands it: types, methods with decoded bodies, referenced assemblies and the patch
//! annotations that say which routine edits which method.
//!
//! # Key Components
//!
//! - [`Module`] / [`TypeDef`] / [`MethodDef`] - The method table
//! - [`TypeRef`] / [`MethodRef`] / [`FieldRef`] - Name-based member references
//! - [`Token`] - Row identity of definitions
//! - [`BuildVersion`] - Version numbers as reconstructed from the target
//! - [`PatchAnnotation`] - Declarative patch registration with optional flag gate
//! - [`TypeDefBuilder`] / [`MethodDefBuilder`] - Fluent row construction

pub(crate) mod annotation;
pub(crate) mod builders;
pub(crate) mod member;
pub(crate) mod module;
pub mod token;
pub mod version;

pub use annotation::{FlagCondition, PatchAnnotation};
pub use builders::{MethodDefBuilder, TypeDefBuilder};
pub use member::{FieldRef, MethodRef, MethodSig, TypeRef};
pub use module::{
    AssemblyRef, FieldDef, MethodAttributes, MethodDef, MethodImplFlags, Module, PInvokeInfo,
    TypeDef,
};
pub use token::Token;
pub use version::BuildVersion;
