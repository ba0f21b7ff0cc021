#![forbid(unsafe_code)]

//! Class models with contracts: the input of the bounded verifier.
//!
//! A [`Program`] is produced by a host front-end (or deserialized from JSON),
//! then [`Program::resolve`] binds names and types before verification.

mod builder;
mod callgraph;
mod class;
mod error;
mod expr;
mod resolve;
mod stmt;
mod types;

pub use builder::{ClassBuilder, MethodBuilder};
pub use callgraph::CallGraph;
pub use class::{ClassModel, Contract, Member, Method, Program};
pub use error::ModelError;
pub use expr::{
    ArithOp, CallExpr, CompareOp, EqualityOp, Expr, ExprKind, LogicalOp, Place, RESULT,
    UnaryArithOp,
};
pub use stmt::Stmt;
pub use types::{Access, Literal, Location, Type, VarScope, Variable};
