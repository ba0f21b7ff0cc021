#![forbid(unsafe_code)]

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::stmt::Stmt;
use crate::types::{Access, Literal, Location, Type, VarScope, Variable};

/// A field or property declaration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub ty: Type,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<Literal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Location>,
}

impl Member {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            init: None,
            loc: None,
        }
    }

    /// Literal initializer, or the type's default for scalar members.
    pub fn initial_value(&self) -> Option<Literal> {
        self.init
            .map(|lit| lit.coerce_to(&self.ty))
            .or_else(|| Literal::default_for(&self.ty))
    }
}

/// A `require`, `ensure` or class invariant clause.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub expr: Expr,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Location>,
}

impl Contract {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            text: String::new(),
            loc: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn at(mut self, loc: Location) -> Self {
        self.loc = Some(loc);
        self
    }

    /// The clause as written, or its pretty-printed expression.
    pub fn text(&self) -> Cow<'_, str> {
        if self.text.is_empty() {
            Cow::Owned(self.expr.to_string())
        } else {
            Cow::Borrowed(&self.text)
        }
    }
}

fn void() -> Type {
    Type::Void
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    #[serde(default)]
    pub access: Access,
    /// Helper supplied by the host: may be inlined, never an entry point.
    #[serde(default)]
    pub preloaded: bool,
    #[serde(default)]
    pub params: Vec<Variable>,
    #[serde(default)]
    pub locals: Vec<Variable>,
    #[serde(default)]
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub requires: Vec<Contract>,
    #[serde(default)]
    pub ensures: Vec<Contract>,
    #[serde(default = "void")]
    pub return_type: Type,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Location>,
}

impl Method {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            access: Access::Public,
            preloaded: false,
            params: Vec::new(),
            locals: Vec::new(),
            body: Vec::new(),
            requires: Vec::new(),
            ensures: Vec::new(),
            return_type: Type::Void,
            loc: None,
        }
    }

    pub fn is_void(&self) -> bool {
        self.return_type == Type::Void
    }

    /// Public, non-preloaded methods are the alphabet of call sequences.
    pub fn is_entry_point(&self) -> bool {
        self.access == Access::Public && !self.preloaded
    }

    pub fn param(&self, name: &str) -> Option<&Variable> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn local(&self, name: &str) -> Option<&Variable> {
        self.locals.iter().find(|l| l.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassModel {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Member>,
    #[serde(default)]
    pub properties: Vec<Member>,
    #[serde(default)]
    pub methods: Vec<Method>,
    #[serde(default)]
    pub invariants: Vec<Contract>,
}

impl ClassModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            invariants: Vec::new(),
        }
    }

    /// Looks a name up in the field table, then the property table.
    pub fn member(&self, name: &str) -> Option<(&Member, VarScope)> {
        self.fields
            .iter()
            .find(|m| m.name == name)
            .map(|m| (m, VarScope::Field))
            .or_else(|| {
                self.properties
                    .iter()
                    .find(|m| m.name == name)
                    .map(|m| (m, VarScope::Property))
            })
    }

    /// Fields followed by properties, in declaration order.
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.fields.iter().chain(&self.properties)
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn entry_points(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter().filter(|m| m.is_entry_point())
    }
}

/// Every class a verification run may reach through object-typed members.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub classes: Vec<ClassModel>,
}

impl Program {
    pub fn new(classes: Vec<ClassModel>) -> Self {
        Self { classes }
    }

    pub fn class(&self, name: &str) -> Option<&ClassModel> {
        self.classes.iter().find(|c| c.name == name)
    }
}

impl From<ClassModel> for Program {
    fn from(class: ClassModel) -> Self {
        Self {
            classes: vec![class],
        }
    }
}
