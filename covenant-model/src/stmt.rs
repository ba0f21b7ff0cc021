#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expr::{CallExpr, Expr, Place};
use crate::types::Location;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    Assign {
        target: Place,
        value: Expr,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        loc: Option<Location>,
    },
    If {
        cond: Expr,
        #[serde(default)]
        then_branch: Vec<Stmt>,
        #[serde(default)]
        else_branch: Vec<Stmt>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        loc: Option<Location>,
    },
    Call {
        call: CallExpr,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        loc: Option<Location>,
    },
    Return {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Expr>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        loc: Option<Location>,
    },
}

impl Stmt {
    pub fn assign(target: &str, value: Expr) -> Self {
        Stmt::Assign {
            target: Place::parse(target),
            value,
            loc: None,
        }
    }

    pub fn if_then(cond: Expr, then_branch: Vec<Stmt>) -> Self {
        Stmt::If {
            cond,
            then_branch,
            else_branch: Vec::new(),
            loc: None,
        }
    }

    pub fn if_else(cond: Expr, then_branch: Vec<Stmt>, else_branch: Vec<Stmt>) -> Self {
        Stmt::If {
            cond,
            then_branch,
            else_branch,
            loc: None,
        }
    }

    pub fn call(call: CallExpr) -> Self {
        Stmt::Call { call, loc: None }
    }

    pub fn ret(value: Expr) -> Self {
        Stmt::Return {
            value: Some(value),
            loc: None,
        }
    }

    pub fn ret_void() -> Self {
        Stmt::Return {
            value: None,
            loc: None,
        }
    }

    pub fn at(mut self, at: Location) -> Self {
        match &mut self {
            Stmt::Assign { loc, .. }
            | Stmt::If { loc, .. }
            | Stmt::Call { loc, .. }
            | Stmt::Return { loc, .. } => *loc = Some(at),
        }
        self
    }

    pub fn loc(&self) -> Option<Location> {
        match self {
            Stmt::Assign { loc, .. }
            | Stmt::If { loc, .. }
            | Stmt::Call { loc, .. }
            | Stmt::Return { loc, .. } => *loc,
        }
    }

    /// Whether a `return` occurs anywhere in this statement.
    pub fn contains_return(&self) -> bool {
        match self {
            Stmt::Return { .. } => true,
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => then_branch
                .iter()
                .chain(else_branch)
                .any(Stmt::contains_return),
            Stmt::Assign { .. } | Stmt::Call { .. } => false,
        }
    }

    /// Calls made by this statement, including those nested in expressions and arms.
    pub fn calls(&self) -> Vec<&CallExpr> {
        match self {
            Stmt::Assign { value, .. } => value.calls(),
            Stmt::Return { value, .. } => value.iter().flat_map(Expr::calls).collect(),
            Stmt::Call { call, .. } => {
                let mut out = vec![call];
                out.extend(call.args.iter().flat_map(Expr::calls));
                out
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                let mut out = cond.calls();
                out.extend(then_branch.iter().chain(else_branch).flat_map(Stmt::calls));
                out
            }
        }
    }
}

fn fmt_block(f: &mut fmt::Formatter<'_>, stmts: &[Stmt]) -> fmt::Result {
    f.write_str("{")?;
    for s in stmts {
        write!(f, " {s}")?;
    }
    f.write_str(" }")
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Assign { target, value, .. } => write!(f, "{target} = {value};"),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                write!(f, "if ({cond}) ")?;
                fmt_block(f, then_branch)?;
                if !else_branch.is_empty() {
                    f.write_str(" else ")?;
                    fmt_block(f, else_branch)?;
                }
                Ok(())
            }
            Stmt::Call { call, .. } => write!(f, "{call};"),
            Stmt::Return { value: Some(v), .. } => write!(f, "return {v};"),
            Stmt::Return { value: None, .. } => f.write_str("return;"),
        }
    }
}
