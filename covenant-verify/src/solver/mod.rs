#![forbid(unsafe_code)]
#![allow(unused_assignments)]

//! The solver capability: sessions that accept assertions, nest scopes,
//! decide satisfiability and hand back a printable model.

mod smtlib;
#[cfg(feature = "z3")]
mod z3_backend;

use std::fmt;

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::term::Term;

pub use smtlib::SmtLibBackend;
#[cfg(feature = "z3")]
pub use z3_backend::Z3Backend;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SatResult {
    Sat,
    Unsat,
    /// The solver gave up; carries its reason when it reported one.
    Unknown(String),
}

/// A satisfying assignment, one `name = value` per declared symbol.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Model {
    pub assignments: Vec<(String, String)>,
}

impl Model {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.assignments
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.assignments.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{name} = {value}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum SolverError {
    #[error("failed to run solver `{path}`: {source}")]
    #[diagnostic(
        code(covenant::solver),
        help("install z3 or point `[solver] path` / `--solver` at an SMT-LIB2 solver")
    )]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("solver reported an error: {0}")]
    #[diagnostic(code(covenant::solver))]
    Solver(String),
    #[error("unexpected solver output: {0}")]
    #[diagnostic(code(covenant::solver))]
    Protocol(String),
    #[error("pop without a matching push")]
    #[diagnostic(code(covenant::solver))]
    Unbalanced,
}

/// One solver session. Dropping it releases every resource it holds.
pub trait Solver {
    fn assert(&mut self, term: &Term) -> Result<(), SolverError>;
    fn push(&mut self) -> Result<(), SolverError>;
    fn pop(&mut self) -> Result<(), SolverError>;
    fn check(&mut self) -> Result<SatResult, SolverError>;
    /// Model of the last `Sat` answer.
    fn model(&mut self) -> Result<Option<Model>, SolverError>;
}

pub trait Backend {
    fn name(&self) -> &str;
    fn session(&self) -> Result<Box<dyn Solver + '_>, SolverError>;
}

impl<B: Backend + ?Sized> Backend for &B {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn session(&self) -> Result<Box<dyn Solver + '_>, SolverError> {
        (**self).session()
    }
}
