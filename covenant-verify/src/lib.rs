#![forbid(unsafe_code)]

//! Bounded model checking of contract-annotated classes.
//!
//! Every sequence of public method calls up to a configured length is
//! executed symbolically from the class's initial state; requires, ensures,
//! invariants and divisions are discharged by an SMT solver.

mod alias;
mod config;
mod contract;
mod error;
mod exec;
mod explorer;
mod logging;
mod normalize;
mod objects;
mod operators;
mod result;
pub mod solver;
mod term;

pub use alias::{Alias, AliasError, AliasTable};
pub use config::{SolverConfig, VerifyConfig};
pub use contract::{Proof, check_consistent, prove_always_true};
pub use error::VerifyError;
pub use explorer::{Verifier, verify_class, verify_program};
pub use logging::{FacadeLog, NoopLog, VerifyLog};
pub use normalize::normalize;
pub use result::{VerificationResult, Violation};
pub use solver::{Backend, Model, SatResult, SmtLibBackend, Solver, SolverError};
#[cfg(feature = "z3")]
pub use solver::Z3Backend;
pub use term::{Op, Sort, Term};
