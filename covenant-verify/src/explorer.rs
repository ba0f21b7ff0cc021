#![forbid(unsafe_code)]

//! Bounded enumeration of public call sequences.
//!
//! For every depth up to `max_depth`, each sequence of entry points of that
//! length is replayed from the initial state in a fresh solver session and
//! the invariants are proved afterwards. The first outcome other than
//! success ends the run.

use std::collections::BTreeSet;
use std::time::Instant;

use covenant_model::{ClassModel, Method, Program};
use rayon::prelude::*;

use crate::config::VerifyConfig;
use crate::error::VerifyError;
use crate::exec::{Bodies, Executor, Flow, Halt};
use crate::logging::{NoopLog, VerifyLog};
use crate::result::VerificationResult;
use crate::solver::Backend;

pub struct Verifier<'a> {
    program: &'a Program,
    backend: &'a dyn Backend,
    config: VerifyConfig,
    log: &'a dyn VerifyLog,
    bodies: Bodies,
}

impl<'a> Verifier<'a> {
    /// `program` must have been through [`Program::resolve`].
    pub fn new(program: &'a Program, backend: &'a dyn Backend) -> Self {
        Self {
            program,
            backend,
            config: VerifyConfig::default(),
            log: &NoopLog,
            bodies: Bodies::of(program),
        }
    }

    pub fn with_config(mut self, config: VerifyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_log(mut self, log: &'a dyn VerifyLog) -> Self {
        self.log = log;
        self
    }

    pub fn config(&self) -> &VerifyConfig {
        &self.config
    }

    pub fn verify(&self, class: &str) -> Result<VerificationResult, VerifyError> {
        let model = self
            .program
            .class(class)
            .ok_or_else(|| VerifyError::UnknownClass(class.to_string()))?;
        let entries: Vec<&Method> = model.entry_points().collect();
        let mut run = Run {
            verifier: self,
            class: model,
            entries,
            started: Instant::now(),
            sequences: 0,
            warned: BTreeSet::new(),
        };

        let result = match run.search() {
            Ok(()) => VerificationResult::Success {
                class: model.name.clone(),
                max_depth: self.config.max_depth,
                sequences: run.sequences,
            },
            Err(Halt::Found(VerificationResult::Timeout { class, reason, .. })) => {
                VerificationResult::Timeout {
                    class,
                    reason,
                    sequences: run.sequences,
                }
            }
            Err(Halt::Found(result)) => result,
            Err(Halt::Failed(e)) => return Err(e),
        };
        self.log.finished(&result);
        Ok(result)
    }
}

struct Run<'v, 'a> {
    verifier: &'v Verifier<'a>,
    class: &'a ClassModel,
    entries: Vec<&'a Method>,
    started: Instant,
    sequences: usize,
    warned: BTreeSet<String>,
}

impl Run<'_, '_> {
    fn search(&mut self) -> Flow {
        for depth in 0..=self.verifier.config.max_depth {
            self.verifier.log.depth_started(&self.class.name, depth);
            let mut seq = Vec::with_capacity(depth);
            self.explore(&mut seq, depth)?;
        }
        Ok(())
    }

    fn check_budget(&self) -> Flow {
        let budget = self.verifier.config.max_duration;
        if self.started.elapsed() >= budget {
            return Err(Halt::Found(VerificationResult::Timeout {
                class: self.class.name.clone(),
                reason: format!("time budget of {} ms exhausted", budget.as_millis()),
                sequences: self.sequences,
            }));
        }
        Ok(())
    }

    fn explore(&mut self, seq: &mut Vec<usize>, depth: usize) -> Flow {
        self.check_budget()?;
        if seq.len() == depth {
            return self.evaluate(seq);
        }
        for i in 0..self.entries.len() {
            seq.push(i);
            let out = self.explore(seq, depth);
            seq.pop();
            out?;
        }
        Ok(())
    }

    fn evaluate(&mut self, seq: &[usize]) -> Flow {
        let methods: Vec<&Method> = seq.iter().map(|&i| self.entries[i]).collect();
        let names: Vec<&str> = methods.iter().map(|m| m.name.as_str()).collect();
        self.verifier.log.sequence(&self.class.name, &names);
        self.sequences += 1;

        let v = self.verifier;
        let mut session = v.backend.session()?;
        let mut exec = Executor::new(
            v.program,
            self.class,
            &v.bodies,
            &v.config,
            v.log,
            session.as_mut(),
            &mut self.warned,
        );
        replay(&mut exec, &methods).map_err(|halt| with_sequence(halt, &names))
    }
}

fn replay<'r>(exec: &mut Executor<'r>, methods: &[&'r Method]) -> Flow {
    exec.initial_state()?;
    for &method in methods {
        exec.run_entry(method)?;
    }
    exec.check_invariants()
}

fn with_sequence(halt: Halt, names: &[&str]) -> Halt {
    match halt {
        Halt::Found(result) => Halt::Found(result.with_sequence(names)),
        failed => failed,
    }
}

/// Verifies one class of a resolved program.
pub fn verify_class(
    program: &Program,
    class: &str,
    backend: &dyn Backend,
    config: &VerifyConfig,
    log: &dyn VerifyLog,
) -> Result<VerificationResult, VerifyError> {
    Verifier::new(program, backend)
        .with_config(config.clone())
        .with_log(log)
        .verify(class)
}

/// Verifies every class of a resolved program, one independent run per
/// class, in parallel. Results keep declaration order.
pub fn verify_program<B: Backend + Sync>(
    program: &Program,
    backend: &B,
    config: &VerifyConfig,
    log: &dyn VerifyLog,
) -> Vec<(String, Result<VerificationResult, VerifyError>)> {
    program
        .classes
        .par_iter()
        .map(|class| {
            let result = verify_class(program, &class.name, backend, config, log);
            (class.name.clone(), result)
        })
        .collect()
}
