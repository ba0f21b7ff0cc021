#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

use crate::alias::AliasError;
use crate::solver::SolverError;

/// A run that could not produce a [`VerificationResult`](crate::VerificationResult).
#[derive(Debug, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum VerifyError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Alias(#[from] AliasError),
    #[error("`{0}` is not resolved; run `Program::resolve` before verifying")]
    #[diagnostic(code(covenant::verify))]
    Unresolved(String),
    #[error("unknown class `{0}`")]
    #[diagnostic(code(covenant::verify))]
    UnknownClass(String),
    #[error("class `{class}` has no method `{method}`")]
    #[diagnostic(code(covenant::verify))]
    UnknownMethod { class: String, method: String },
    #[error("unsupported construct: {0}")]
    #[diagnostic(code(covenant::verify))]
    Unsupported(String),
}
