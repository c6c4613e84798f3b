//! Member references carried by instruction operands.
//!
//! References are resolved by name, not by token: an operand names the declaring type
//! and the member, plus the signature for methods. This is what patterns match on and
//! what routines emit, independent of the metadata row numbers of the target.
//!
//! Type names use the reflection notation of full names, with `/` separating a nested
//! type from its declaring type (`Celeste.Player/<DashCoroutine>d__427`).

use std::fmt;

/// A reference to a type by full name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef {
    /// Namespace-qualified name, nested types separated by `/`
    pub full_name: String,
}

impl TypeRef {
    /// Creates a type reference from its full name.
    pub fn new(full_name: impl Into<String>) -> Self {
        TypeRef {
            full_name: full_name.into(),
        }
    }

    /// `System.Void`
    #[must_use]
    pub fn void() -> Self {
        Self::new("System.Void")
    }

    /// `System.Int32`
    #[must_use]
    pub fn int32() -> Self {
        Self::new("System.Int32")
    }

    /// `System.Boolean`
    #[must_use]
    pub fn boolean() -> Self {
        Self::new("System.Boolean")
    }

    /// `System.String`
    #[must_use]
    pub fn string() -> Self {
        Self::new("System.String")
    }

    /// `System.Object`
    #[must_use]
    pub fn object() -> Self {
        Self::new("System.Object")
    }

    /// Returns the simple name, without namespace or declaring type.
    #[must_use]
    pub fn name(&self) -> &str {
        let tail = self
            .full_name
            .rsplit_once('/')
            .map_or(self.full_name.as_str(), |(_, nested)| nested);
        tail.rsplit_once('.').map_or(tail, |(_, name)| name)
    }

    /// Returns the namespace of the outermost declaring type.
    #[must_use]
    pub fn namespace(&self) -> &str {
        let outer = self
            .full_name
            .split_once('/')
            .map_or(self.full_name.as_str(), |(outer, _)| outer);
        outer.rsplit_once('.').map_or("", |(ns, _)| ns)
    }

    /// Returns true for `System.Void`.
    #[must_use]
    pub fn is_void(&self) -> bool {
        self.full_name == "System.Void"
    }

    /// Returns true if this reference names `full_name`.
    #[must_use]
    pub fn is(&self, full_name: &str) -> bool {
        self.full_name == full_name
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

/// Signature of a method: calling convention, return type and parameter types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSig {
    /// True for instance methods (implicit `this`)
    pub has_this: bool,
    /// Return type
    pub return_type: TypeRef,
    /// Parameter types, excluding `this`
    pub params: Vec<TypeRef>,
}

impl MethodSig {
    /// Creates an instance method signature.
    #[must_use]
    pub fn instance(return_type: TypeRef, params: Vec<TypeRef>) -> Self {
        MethodSig {
            has_this: true,
            return_type,
            params,
        }
    }

    /// Creates a static method signature.
    #[must_use]
    pub fn static_method(return_type: TypeRef, params: Vec<TypeRef>) -> Self {
        MethodSig {
            has_this: false,
            return_type,
            params,
        }
    }

    /// Returns true if the parameter types equal `params`, by full name.
    #[must_use]
    pub fn params_match(&self, params: &[&str]) -> bool {
        self.params.len() == params.len()
            && self.params.iter().zip(params).all(|(p, name)| p.is(name))
    }
}

/// A reference to a method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// The type declaring the method
    pub declaring_type: TypeRef,
    /// Method name (`.ctor` for constructors)
    pub name: String,
    /// Method signature
    pub signature: MethodSig,
}

impl MethodRef {
    /// Creates a method reference.
    pub fn new(declaring_type: TypeRef, name: impl Into<String>, signature: MethodSig) -> Self {
        MethodRef {
            declaring_type,
            name: name.into(),
            signature,
        }
    }

    /// Returns the unique textual identity of the referenced method:
    /// `ReturnType DeclaringType::Name(Param1,Param2)`.
    #[must_use]
    pub fn id(&self) -> String {
        let params = self
            .signature
            .params
            .iter()
            .map(|p| p.full_name.as_str())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{} {}::{}({})",
            self.signature.return_type, self.declaring_type, self.name, params
        )
    }

    /// Returns true if this is an instance or static constructor.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == ".ctor" || self.name == ".cctor"
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// A reference to a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// The type declaring the field
    pub declaring_type: TypeRef,
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: TypeRef,
}

impl FieldRef {
    /// Creates a field reference.
    pub fn new(declaring_type: TypeRef, name: impl Into<String>, field_type: TypeRef) -> Self {
        FieldRef {
            declaring_type,
            name: name.into(),
            field_type,
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}::{}",
            self.field_type, self.declaring_type, self.name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        let nested = TypeRef::new("Celeste.Player/<DashCoroutine>d__427");
        assert_eq!(nested.name(), "<DashCoroutine>d__427");
        assert_eq!(nested.namespace(), "Celeste");

        let plain = TypeRef::new("System.Collections.IEnumerator");
        assert_eq!(plain.name(), "IEnumerator");
        assert_eq!(plain.namespace(), "System.Collections");

        let global = TypeRef::new("Program");
        assert_eq!(global.name(), "Program");
        assert_eq!(global.namespace(), "");
    }

    #[test]
    fn test_method_id() {
        let method = MethodRef::new(
            TypeRef::new("Celeste.Level"),
            "LoadLevel",
            MethodSig::instance(
                TypeRef::void(),
                vec![TypeRef::new("Celeste.Player/IntroTypes"), TypeRef::boolean()],
            ),
        );
        assert_eq!(
            method.id(),
            "System.Void Celeste.Level::LoadLevel(Celeste.Player/IntroTypes,System.Boolean)"
        );
        assert!(method
            .signature
            .params_match(&["Celeste.Player/IntroTypes", "System.Boolean"]));
        assert!(!method.signature.params_match(&["System.Boolean"]));
    }

    #[test]
    fn test_field_display() {
        let field = FieldRef::new(TypeRef::new("Celeste.Level"), "Paused", TypeRef::boolean());
        assert_eq!(field.to_string(), "System.Boolean Celeste.Level::Paused");
    }
}
