#![forbid(unsafe_code)]

//! Fluent construction of class models, used by tests and by hosts that
//! lower their own front-end into this representation.

use crate::class::{ClassModel, Contract, Member, Method};
use crate::expr::Expr;
use crate::stmt::Stmt;
use crate::types::{Access, Literal, Type, Variable};

#[derive(Clone, Debug)]
pub struct ClassBuilder {
    class: ClassModel,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            class: ClassModel::new(name),
        }
    }

    pub fn field(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.class.fields.push(Member::new(name, ty));
        self
    }

    pub fn field_init(mut self, name: impl Into<String>, ty: Type, init: Literal) -> Self {
        let mut member = Member::new(name, ty);
        member.init = Some(init);
        self.class.fields.push(member);
        self
    }

    pub fn property(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.class.properties.push(Member::new(name, ty));
        self
    }

    pub fn property_init(mut self, name: impl Into<String>, ty: Type, init: Literal) -> Self {
        let mut member = Member::new(name, ty);
        member.init = Some(init);
        self.class.properties.push(member);
        self
    }

    pub fn invariant(mut self, expr: Expr) -> Self {
        self.class.invariants.push(Contract::new(expr));
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.class.methods.push(method);
        self
    }

    pub fn build(self) -> ClassModel {
        self.class
    }
}

#[derive(Clone, Debug)]
pub struct MethodBuilder {
    method: Method,
}

impl MethodBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            method: Method::new(name),
        }
    }

    pub fn private(mut self) -> Self {
        self.method.access = Access::Private;
        self
    }

    pub fn preloaded(mut self) -> Self {
        self.method.preloaded = true;
        self
    }

    pub fn param(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.method.params.push(Variable::new(name, ty));
        self
    }

    pub fn local(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.method.locals.push(Variable::new(name, ty));
        self
    }

    pub fn returns(mut self, ty: Type) -> Self {
        self.method.return_type = ty;
        self
    }

    pub fn requires(mut self, expr: Expr) -> Self {
        self.method.requires.push(Contract::new(expr));
        self
    }

    pub fn ensures(mut self, expr: Expr) -> Self {
        self.method.ensures.push(Contract::new(expr));
        self
    }

    pub fn stmt(mut self, stmt: Stmt) -> Self {
        self.method.body.push(stmt);
        self
    }

    pub fn body(mut self, stmts: impl IntoIterator<Item = Stmt>) -> Self {
        self.method.body.extend(stmts);
        self
    }

    pub fn build(self) -> Method {
        self.method
    }
}
