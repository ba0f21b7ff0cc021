#![forbid(unsafe_code)]

//! Logging capability handed to each run. The engine never touches a global
//! logger; hosts choose [`NoopLog`] or [`FacadeLog`].

use crate::result::VerificationResult;
use crate::solver::SatResult;

pub trait VerifyLog: Send + Sync {
    fn depth_started(&self, _class: &str, _depth: usize) {}

    fn sequence(&self, _class: &str, _methods: &[&str]) {}

    /// A call was replaced by the callee's contract.
    fn abstracted(&self, _class: &str, _method: &str, _inline_depth: usize) {}

    fn solver_check(&self, _purpose: &str, _answer: &SatResult) {}

    fn finished(&self, _result: &VerificationResult) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLog;

impl VerifyLog for NoopLog {}

/// Forwards to the `log` crate facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct FacadeLog;

impl VerifyLog for FacadeLog {
    fn depth_started(&self, class: &str, depth: usize) {
        log::info!("{class}: exploring call sequences of length {depth}");
    }

    fn sequence(&self, class: &str, methods: &[&str]) {
        log::debug!("{class}: [{}]", methods.join(", "));
    }

    fn abstracted(&self, class: &str, method: &str, inline_depth: usize) {
        log::warn!(
            "{class}.{method}: inlining depth {inline_depth} reached, using its contract instead of its body"
        );
    }

    fn solver_check(&self, purpose: &str, answer: &SatResult) {
        log::trace!("{purpose}: {answer:?}");
    }

    fn finished(&self, result: &VerificationResult) {
        log::info!("{}: {}", result.class(), result.summary());
    }
}
