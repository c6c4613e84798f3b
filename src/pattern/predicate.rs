//! Single-instruction predicates.
//!
//! A [`Predicate`] decides whether one instruction has a given shape. Predicates are
//! plain values: they can be cloned, combined with [`Predicate::negate`] /
//! [`Predicate::any_of`], and every one of them renders a human readable description
//! that ends up in [`crate::Error::PatternNotFound`] when a search fails.
//!
//! Integer predicates look through encodings: `Predicate::int(2)` accepts `ldc.i4.2`,
//! `ldc.i4.s 2`, `ldc.i4 2` and `ldc.i8 2` alike. Local and argument predicates do the
//! same for the macro forms (`ldloc.1`, `ldloc.s 1`, `ldloc 1`).

use std::{fmt, rc::Rc};

use crate::assembly::{Instruction, OpClass, OpCode};

type CustomFn = Rc<dyn Fn(&Instruction) -> bool>;

/// A test over a single instruction.
#[derive(Clone)]
pub enum Predicate {
    /// Accepts every instruction
    Any,
    /// Exact opcode
    OpCode(OpCode),
    /// Any opcode of a macro family
    OpClass(OpClass),
    /// Integer literal, any encoding
    Int(i64),
    /// Floating point literal
    Float(f64),
    /// `ldstr` with this exact value
    Str(String),
    /// `call` / `callvirt` of a method, optionally with exact parameter types
    Call {
        /// Full name of the declaring type
        declaring_type: String,
        /// Method name
        name: String,
        /// Parameter type full names, `None` accepts every overload
        params: Option<Vec<String>>,
    },
    /// `newobj` of a type, optionally with exact constructor parameter types
    NewObj {
        /// Full name of the constructed type
        declaring_type: String,
        /// Parameter type full names, `None` accepts every constructor
        params: Option<Vec<String>>,
    },
    /// Field access with one of the given opcodes
    Field {
        /// Accepted opcodes
        opcodes: &'static [OpCode],
        /// Full name of the declaring type
        declaring_type: String,
        /// Field name
        name: String,
    },
    /// Instruction with a type operand
    Type {
        /// Exact opcode
        opcode: OpCode,
        /// Full name of the type operand
        type_name: String,
    },
    /// Local access of a family, optionally with a specific index
    Local(OpClass, Option<u16>),
    /// Argument load, optionally with a specific index
    Argument(Option<u16>),
    /// Negation
    Not(Box<Predicate>),
    /// Accepts if any alternative accepts
    AnyOf(Vec<Predicate>),
    /// Arbitrary test with a description
    Custom {
        /// Description shown in errors
        description: String,
        /// The test
        test: CustomFn,
    },
}

impl Predicate {
    /// Wildcard.
    #[must_use]
    pub fn any() -> Self {
        Predicate::Any
    }

    /// Exact opcode.
    #[must_use]
    pub fn op(opcode: OpCode) -> Self {
        Predicate::OpCode(opcode)
    }

    /// Any opcode of a macro family.
    #[must_use]
    pub fn class(class: OpClass) -> Self {
        Predicate::OpClass(class)
    }

    /// Any branch, conditional or not.
    #[must_use]
    pub fn branch() -> Self {
        Predicate::OpClass(OpClass::Branch)
    }

    /// Integer literal in any `ldc.i4*` / `ldc.i8` encoding.
    #[must_use]
    pub fn int(value: i64) -> Self {
        Predicate::Int(value)
    }

    /// `ldc.r4` / `ldc.r8` with this value.
    #[must_use]
    pub fn float(value: f64) -> Self {
        Predicate::Float(value)
    }

    /// `ldstr` with this value.
    pub fn ldstr(value: impl Into<String>) -> Self {
        Predicate::Str(value.into())
    }

    /// `call` or `callvirt` of `declaring_type::name`.
    pub fn call(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Predicate::Call {
            declaring_type: declaring_type.into(),
            name: name.into(),
            params: None,
        }
    }

    /// `newobj` of `declaring_type`.
    pub fn newobj(declaring_type: impl Into<String>) -> Self {
        Predicate::NewObj {
            declaring_type: declaring_type.into(),
            params: None,
        }
    }

    /// `ldfld declaring_type::name`.
    pub fn ldfld(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::field(&[OpCode::Ldfld], declaring_type, name)
    }

    /// `ldsfld declaring_type::name`.
    pub fn ldsfld(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::field(&[OpCode::Ldsfld], declaring_type, name)
    }

    /// `ldflda declaring_type::name`.
    pub fn ldflda(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::field(&[OpCode::Ldflda], declaring_type, name)
    }

    /// `stfld declaring_type::name`.
    pub fn stfld(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::field(&[OpCode::Stfld], declaring_type, name)
    }

    /// `stsfld declaring_type::name`.
    pub fn stsfld(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::field(&[OpCode::Stsfld], declaring_type, name)
    }

    fn field(
        opcodes: &'static [OpCode],
        declaring_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Predicate::Field {
            opcodes,
            declaring_type: declaring_type.into(),
            name: name.into(),
        }
    }

    /// `isinst type_name`.
    pub fn isinst(type_name: impl Into<String>) -> Self {
        Predicate::Type {
            opcode: OpCode::Isinst,
            type_name: type_name.into(),
        }
    }

    /// `initobj type_name`.
    pub fn initobj(type_name: impl Into<String>) -> Self {
        Predicate::Type {
            opcode: OpCode::Initobj,
            type_name: type_name.into(),
        }
    }

    /// Any load of local `index`.
    #[must_use]
    pub fn ldloc(index: u16) -> Self {
        Predicate::Local(OpClass::LoadLocal, Some(index))
    }

    /// Any store to local `index`.
    #[must_use]
    pub fn stloc(index: u16) -> Self {
        Predicate::Local(OpClass::StoreLocal, Some(index))
    }

    /// Any address load of local `index`.
    #[must_use]
    pub fn ldloca(index: u16) -> Self {
        Predicate::Local(OpClass::LoadLocalAddress, Some(index))
    }

    /// Any load of argument `index`.
    #[must_use]
    pub fn ldarg(index: u16) -> Self {
        Predicate::Argument(Some(index))
    }

    /// Negates `predicate`.
    #[must_use]
    pub fn negate(predicate: Predicate) -> Self {
        Predicate::Not(Box::new(predicate))
    }

    /// Accepts if any of `alternatives` accepts.
    #[must_use]
    pub fn any_of(alternatives: Vec<Predicate>) -> Self {
        Predicate::AnyOf(alternatives)
    }

    /// Arbitrary test.
    pub fn custom<F>(description: impl Into<String>, test: F) -> Self
    where
        F: Fn(&Instruction) -> bool + 'static,
    {
        Predicate::Custom {
            description: description.into(),
            test: Rc::new(test),
        }
    }

    /// Restricts a call or constructor predicate to the given parameter types.
    ///
    /// Has no effect on other predicate kinds.
    #[must_use]
    pub fn with_params(mut self, types: &[&str]) -> Self {
        let wanted = Some(types.iter().map(|t| (*t).to_string()).collect());
        match &mut self {
            Predicate::Call { params, .. } | Predicate::NewObj { params, .. } => *params = wanted,
            _ => {}
        }
        self
    }

    /// Tests `instr`.
    #[must_use]
    pub fn accepts(&self, instr: &Instruction) -> bool {
        match self {
            Predicate::Any => true,
            Predicate::OpCode(opcode) => instr.opcode() == *opcode,
            Predicate::OpClass(class) => instr.is(*class),
            Predicate::Int(value) => instr.int_value() == Some(*value),
            Predicate::Float(value) => instr.float_value() == Some(*value),
            Predicate::Str(value) => {
                instr.opcode() == OpCode::Ldstr && instr.string_value() == Some(value.as_str())
            }
            Predicate::Call {
                declaring_type,
                name,
                params,
            } => {
                instr.is(OpClass::Call)
                    && instr.method().is_some_and(|m| {
                        m.declaring_type.is(declaring_type)
                            && m.name == *name
                            && params_match(params.as_deref(), &m.signature.params)
                    })
            }
            Predicate::NewObj {
                declaring_type,
                params,
            } => {
                instr.opcode() == OpCode::Newobj
                    && instr.method().is_some_and(|m| {
                        m.declaring_type.is(declaring_type)
                            && params_match(params.as_deref(), &m.signature.params)
                    })
            }
            Predicate::Field {
                opcodes,
                declaring_type,
                name,
            } => {
                opcodes.contains(&instr.opcode())
                    && instr
                        .field()
                        .is_some_and(|f| f.declaring_type.is(declaring_type) && f.name == *name)
            }
            Predicate::Type { opcode, type_name } => {
                instr.opcode() == *opcode && instr.type_ref().is_some_and(|t| t.is(type_name))
            }
            Predicate::Local(class, index) => {
                instr.is(*class) && index.map_or(true, |i| instr.local_index() == Some(i))
            }
            Predicate::Argument(index) => {
                instr.is(OpClass::LoadArgument)
                    && index.map_or(true, |i| instr.argument_index() == Some(i))
            }
            Predicate::Not(inner) => !inner.accepts(instr),
            Predicate::AnyOf(alternatives) => alternatives.iter().any(|p| p.accepts(instr)),
            Predicate::Custom { test, .. } => test(instr),
        }
    }
}

fn params_match(wanted: Option<&[String]>, actual: &[crate::metadata::TypeRef]) -> bool {
    match wanted {
        None => true,
        Some(wanted) => {
            wanted.len() == actual.len()
                && wanted.iter().zip(actual).all(|(w, a)| a.is(w))
        }
    }
}

impl From<OpCode> for Predicate {
    fn from(opcode: OpCode) -> Self {
        Predicate::OpCode(opcode)
    }
}

impl From<OpClass> for Predicate {
    fn from(class: OpClass) -> Self {
        Predicate::OpClass(class)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Any => write!(f, "*"),
            Predicate::OpCode(opcode) => write!(f, "{opcode}"),
            Predicate::OpClass(class) => write!(f, "{class}"),
            Predicate::Int(value) => write!(f, "ldc.i* {value}"),
            Predicate::Float(value) => write!(f, "ldc.r* {value}"),
            Predicate::Str(value) => write!(f, "ldstr {value:?}"),
            Predicate::Call {
                declaring_type,
                name,
                params,
            } => {
                write!(f, "call {declaring_type}::{name}")?;
                write_params(f, params.as_deref())
            }
            Predicate::NewObj {
                declaring_type,
                params,
            } => {
                write!(f, "newobj {declaring_type}::.ctor")?;
                write_params(f, params.as_deref())
            }
            Predicate::Field {
                opcodes,
                declaring_type,
                name,
            } => {
                let mnemonics: Vec<&str> = opcodes.iter().map(|op| op.mnemonic()).collect();
                write!(f, "{} {declaring_type}::{name}", mnemonics.join("|"))
            }
            Predicate::Type { opcode, type_name } => write!(f, "{opcode} {type_name}"),
            Predicate::Local(class, Some(index)) => write!(f, "{class} {index}"),
            Predicate::Local(class, None) => write!(f, "{class}"),
            Predicate::Argument(Some(index)) => write!(f, "ldarg* {index}"),
            Predicate::Argument(None) => write!(f, "ldarg*"),
            Predicate::Not(inner) => write!(f, "!{inner}"),
            Predicate::AnyOf(alternatives) => {
                write!(f, "(")?;
                for (i, alternative) in alternatives.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{alternative}")?;
                }
                write!(f, ")")
            }
            Predicate::Custom { description, .. } => write!(f, "{description}"),
        }
    }
}

fn write_params(f: &mut fmt::Formatter<'_>, params: Option<&[String]>) -> fmt::Result {
    match params {
        Some(params) => write!(f, "({})", params.join(",")),
        None => Ok(()),
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({self})")
    }
}
