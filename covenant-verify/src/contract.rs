#![forbid(unsafe_code)]

//! The two solver obligations every contract check reduces to.

use crate::logging::VerifyLog;
use crate::solver::{Model, SatResult, Solver, SolverError};
use crate::term::Term;

#[derive(Clone, Debug, PartialEq)]
pub enum Proof {
    Holds,
    /// `¬formula` is satisfiable; carries the counterexample when one was requested.
    Violated(Option<Model>),
    Unknown(String),
}

/// Refutes `¬formula` in a scope of its own. The scope is popped on every
/// path; with `keep`, `formula` is asserted afterwards.
pub fn prove_always_true(
    solver: &mut dyn Solver,
    log: &dyn VerifyLog,
    purpose: &str,
    formula: &Term,
    keep: bool,
    collect_model: bool,
) -> Result<Proof, SolverError> {
    solver.push()?;
    let outcome = refute(solver, log, purpose, formula, collect_model);
    let popped = solver.pop();
    let proof = outcome?;
    popped?;
    if keep {
        solver.assert(formula)?;
    }
    Ok(proof)
}

fn refute(
    solver: &mut dyn Solver,
    log: &dyn VerifyLog,
    purpose: &str,
    formula: &Term,
    collect_model: bool,
) -> Result<Proof, SolverError> {
    solver.assert(&Term::not(formula.clone()))?;
    let answer = solver.check()?;
    log.solver_check(purpose, &answer);
    Ok(match answer {
        SatResult::Unsat => Proof::Holds,
        SatResult::Sat if collect_model => Proof::Violated(solver.model()?),
        SatResult::Sat => Proof::Violated(None),
        SatResult::Unknown(reason) => Proof::Unknown(reason),
    })
}

/// Whether `formulas` can hold together, checked in a scope of its own.
pub fn check_consistent(
    solver: &mut dyn Solver,
    log: &dyn VerifyLog,
    purpose: &str,
    formulas: &[Term],
) -> Result<SatResult, SolverError> {
    solver.push()?;
    let outcome = (|| {
        for f in formulas {
            solver.assert(f)?;
        }
        solver.check()
    })();
    let popped = solver.pop();
    let answer = outcome?;
    popped?;
    log.solver_check(purpose, &answer);
    Ok(answer)
}
