#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// Static type of a variable or expression.
///
/// `Unknown` only appears in models that have not been through
/// [`Program::resolve`](crate::Program::resolve) yet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    #[default]
    Unknown,
    Bool,
    Int,
    Float,
    Void,
    Class(String),
}

impl Type {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Type::Bool | Type::Int | Type::Float)
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            Type::Class(name) => Some(name),
            _ => None,
        }
    }

    /// Whether a value of type `from` may be stored in a slot of this type.
    pub fn accepts(&self, from: &Type) -> bool {
        self == from || (*self == Type::Float && *from == Type::Int)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Unknown => f.write_str("<unknown>"),
            Type::Bool => f.write_str("bool"),
            Type::Int => f.write_str("int"),
            Type::Float => f.write_str("double"),
            Type::Void => f.write_str("void"),
            Type::Class(name) => f.write_str(name),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Literal {
    pub fn ty(&self) -> Type {
        match self {
            Literal::Bool(_) => Type::Bool,
            Literal::Int(_) => Type::Int,
            Literal::Float(_) => Type::Float,
        }
    }

    /// The value a field of type `ty` holds when no initializer is given.
    pub fn default_for(ty: &Type) -> Option<Literal> {
        match ty {
            Type::Bool => Some(Literal::Bool(false)),
            Type::Int => Some(Literal::Int(0)),
            Type::Float => Some(Literal::Float(0.0)),
            _ => None,
        }
    }

    /// Converts an integer literal stored in a `double` slot.
    pub fn coerce_to(self, ty: &Type) -> Literal {
        match (self, ty) {
            (Literal::Int(n), Type::Float) => Literal::Float(n as f64),
            (lit, _) => lit,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(n) => write!(f, "{n}"),
            Literal::Float(x) => write!(f, "{x:?}"),
        }
    }
}

/// 1-based source position reported by the front-end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    #[default]
    Public,
    Private,
}

/// Which kind of variable the root of a [`Place`](crate::Place) names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarScope {
    #[default]
    Unresolved,
    Field,
    Property,
    Parameter,
    Local,
    Result,
}

impl VarScope {
    /// Fields and properties live on the object; everything else on the call frame.
    pub fn is_member(self) -> bool {
        matches!(self, VarScope::Field | VarScope::Property)
    }
}

/// A named, typed parameter or local.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub ty: Type,
}

impl Variable {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}
