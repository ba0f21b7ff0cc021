#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use z3::ast::{Ast, Bool, Dynamic, Int, Real};
use z3::{Config, Context, Params, SatResult as Z3SatResult, Solver as Z3Solver};

use super::{Backend, Model, SatResult, Solver, SolverError};
use crate::config::SolverConfig;
use crate::term::{Op, Sort, Term, real_literal};

/// In-process Z3 through the `z3` crate.
pub struct Z3Backend {
    ctx: &'static Context,
    timeout_ms: Option<u64>,
}

impl Z3Backend {
    pub fn new(config: &SolverConfig) -> Self {
        let mut cfg = Config::new();
        cfg.set_model_generation(true);
        // Leaked so sessions can hold `Solver<'static>` without self-references.
        let ctx: &'static Context = Box::leak(Box::new(Context::new(&cfg)));
        Self {
            ctx,
            timeout_ms: config.timeout_ms,
        }
    }
}

impl Backend for Z3Backend {
    fn name(&self) -> &str {
        "z3 (in-process)"
    }

    fn session(&self) -> Result<Box<dyn Solver + '_>, SolverError> {
        let solver = Z3Solver::new(self.ctx);
        let mut params = Params::new(self.ctx);
        if let Some(ms) = self.timeout_ms {
            params.set_u32("timeout", u32::try_from(ms).unwrap_or(u32::MAX));
        }
        params.set_u32("smt.random_seed", 0);
        params.set_u32("sat.random_seed", 0);
        solver.set_params(&params);
        Ok(Box::new(Z3Session {
            ctx: self.ctx,
            solver,
            symbols: BTreeMap::new(),
            scopes: 0,
        }))
    }
}

struct Z3Session {
    ctx: &'static Context,
    solver: Z3Solver<'static>,
    symbols: BTreeMap<String, Dynamic<'static>>,
    scopes: u32,
}

fn mismatch(term: &Term, want: &str) -> SolverError {
    SolverError::Protocol(format!("`{term}` is not a {want} term"))
}

impl Z3Session {
    fn symbol(&mut self, name: &str, sort: Sort) -> Dynamic<'static> {
        let ctx = self.ctx;
        self.symbols
            .entry(name.to_string())
            .or_insert_with(|| match sort {
                Sort::Bool => Dynamic::from_ast(&Bool::new_const(ctx, name)),
                Sort::Int => Dynamic::from_ast(&Int::new_const(ctx, name)),
                Sort::Real => Dynamic::from_ast(&Real::new_const(ctx, name)),
            })
            .clone()
    }

    fn lower_bool(&mut self, term: &Term) -> Result<Bool<'static>, SolverError> {
        self.lower(term)?.as_bool().ok_or_else(|| mismatch(term, "Bool"))
    }

    fn lower_int(&mut self, term: &Term) -> Result<Int<'static>, SolverError> {
        self.lower(term)?.as_int().ok_or_else(|| mismatch(term, "Int"))
    }

    fn lower_real(&mut self, term: &Term) -> Result<Real<'static>, SolverError> {
        self.lower(term)?.as_real().ok_or_else(|| mismatch(term, "Real"))
    }

    fn real_const(&self, x: f64) -> Result<Real<'static>, SolverError> {
        let digits = real_literal(x);
        let (whole, frac) = digits.split_once('.').unwrap_or((digits.as_str(), ""));
        let num = format!("{}{whole}{frac}", if x < 0.0 { "-" } else { "" });
        let den = format!("1{}", "0".repeat(frac.len()));
        Real::from_real_str(self.ctx, &num, &den)
            .ok_or_else(|| SolverError::Protocol(format!("cannot encode real {x}")))
    }

    fn lower(&mut self, term: &Term) -> Result<Dynamic<'static>, SolverError> {
        let ctx = self.ctx;
        Ok(match term {
            Term::Bool(b) => Dynamic::from_ast(&Bool::from_bool(ctx, *b)),
            Term::Int(n) => Dynamic::from_ast(&Int::from_i64(ctx, *n)),
            Term::Real(x) => Dynamic::from_ast(&self.real_const(*x)?),
            Term::Var(name, sort) => self.symbol(name, *sort),
            Term::Not(t) => Dynamic::from_ast(&self.lower_bool(t)?.not()),
            Term::Neg(t) => match t.sort() {
                Sort::Int => Dynamic::from_ast(&self.lower_int(t)?.unary_minus()),
                Sort::Real => Dynamic::from_ast(&self.lower_real(t)?.unary_minus()),
                Sort::Bool => return Err(mismatch(t, "numeric")),
            },
            Term::ToReal(t) => Dynamic::from_ast(&self.lower_int(t)?.to_real()),
            Term::And(ts) | Term::Or(ts) => {
                let parts = ts
                    .iter()
                    .map(|t| self.lower_bool(t))
                    .collect::<Result<Vec<_>, _>>()?;
                let refs: Vec<&Bool<'static>> = parts.iter().collect();
                if matches!(term, Term::And(_)) {
                    Dynamic::from_ast(&Bool::and(ctx, &refs))
                } else {
                    Dynamic::from_ast(&Bool::or(ctx, &refs))
                }
            }
            Term::Binary(op, l, r) => self.lower_binary(*op, l, r)?,
            Term::Ite(c, t, e) => {
                let c = self.lower_bool(c)?;
                let t = self.lower(t)?;
                let e = self.lower(e)?;
                c.ite(&t, &e)
            }
        })
    }

    fn lower_binary(&mut self, op: Op, l: &Term, r: &Term) -> Result<Dynamic<'static>, SolverError> {
        let ctx = self.ctx;
        match op {
            Op::Eq => {
                let a = self.lower(l)?;
                let b = self.lower(r)?;
                Ok(Dynamic::from_ast(&a._eq(&b)))
            }
            Op::Implies | Op::Xor => {
                let a = self.lower_bool(l)?;
                let b = self.lower_bool(r)?;
                let out = if op == Op::Implies { a.implies(&b) } else { a.xor(&b) };
                Ok(Dynamic::from_ast(&out))
            }
            Op::IntDiv => Ok(Dynamic::from_ast(&self.lower_int(l)?.div(&self.lower_int(r)?))),
            Op::RealDiv => Ok(Dynamic::from_ast(&self.lower_real(l)?.div(&self.lower_real(r)?))),
            _ if l.sort() == Sort::Int => {
                let a = self.lower_int(l)?;
                let b = self.lower_int(r)?;
                Ok(match op {
                    Op::Add => Dynamic::from_ast(&Int::add(ctx, &[&a, &b])),
                    Op::Sub => Dynamic::from_ast(&Int::sub(ctx, &[&a, &b])),
                    Op::Mul => Dynamic::from_ast(&Int::mul(ctx, &[&a, &b])),
                    Op::Lt => Dynamic::from_ast(&a.lt(&b)),
                    Op::Le => Dynamic::from_ast(&a.le(&b)),
                    Op::Gt => Dynamic::from_ast(&a.gt(&b)),
                    _ => Dynamic::from_ast(&a.ge(&b)),
                })
            }
            _ => {
                let a = self.lower_real(l)?;
                let b = self.lower_real(r)?;
                Ok(match op {
                    Op::Add => Dynamic::from_ast(&Real::add(ctx, &[&a, &b])),
                    Op::Sub => Dynamic::from_ast(&Real::sub(ctx, &[&a, &b])),
                    Op::Mul => Dynamic::from_ast(&Real::mul(ctx, &[&a, &b])),
                    Op::Lt => Dynamic::from_ast(&a.lt(&b)),
                    Op::Le => Dynamic::from_ast(&a.le(&b)),
                    Op::Gt => Dynamic::from_ast(&a.gt(&b)),
                    _ => Dynamic::from_ast(&a.ge(&b)),
                })
            }
        }
    }
}

impl Solver for Z3Session {
    fn assert(&mut self, term: &Term) -> Result<(), SolverError> {
        let b = self.lower_bool(term)?;
        self.solver.assert(&b);
        Ok(())
    }

    fn push(&mut self) -> Result<(), SolverError> {
        self.solver.push();
        self.scopes += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<(), SolverError> {
        if self.scopes == 0 {
            return Err(SolverError::Unbalanced);
        }
        self.solver.pop(1);
        self.scopes -= 1;
        Ok(())
    }

    fn check(&mut self) -> Result<SatResult, SolverError> {
        Ok(match self.solver.check() {
            Z3SatResult::Sat => SatResult::Sat,
            Z3SatResult::Unsat => SatResult::Unsat,
            Z3SatResult::Unknown => SatResult::Unknown(
                self.solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "z3 returned unknown".to_string()),
            ),
        })
    }

    fn model(&mut self) -> Result<Option<Model>, SolverError> {
        let Some(model) = self.solver.get_model() else {
            return Ok(None);
        };
        let assignments = self
            .symbols
            .iter()
            .filter_map(|(name, sym)| {
                model
                    .eval(sym, true)
                    .map(|value| (name.clone(), value.to_string()))
            })
            .collect();
        Ok(Some(Model { assignments }))
    }
}
