#![forbid(unsafe_code)]

//! Symbolic execution of method bodies into guarded solver assertions.
//!
//! Every write `x = e` under branch predicate `g` becomes `g => x_n = e` on a
//! fresh alias `x_n`; conditionals snapshot the alias table, run both arms and
//! merge the two tables with phi aliases.

use std::collections::{BTreeSet, HashMap};

use covenant_model::{CallExpr, ClassModel, Expr, ExprKind, Literal, Method, Program, Stmt, Type};

mod expr;

use crate::alias::{AliasError, AliasTable};
use crate::config::VerifyConfig;
use crate::contract::{self, Proof};
use crate::error::VerifyError;
use crate::logging::VerifyLog;
use crate::normalize::normalize;
use crate::objects::{Frame, leaves, sort_of, written_members};
use crate::result::{VerificationResult, Violation};
use crate::solver::{SatResult, Solver, SolverError};
use crate::term::{Sort, Term};

/// Why execution of a call sequence stopped early.
#[derive(Debug)]
pub(crate) enum Halt {
    /// A violation or an inconclusive solver answer: the run's outcome.
    Found(VerificationResult),
    Failed(VerifyError),
}

impl From<VerifyError> for Halt {
    fn from(e: VerifyError) -> Self {
        Halt::Failed(e)
    }
}

impl From<SolverError> for Halt {
    fn from(e: SolverError) -> Self {
        Halt::Failed(e.into())
    }
}

impl From<AliasError> for Halt {
    fn from(e: AliasError) -> Self {
        Halt::Failed(e.into())
    }
}

pub(crate) type Flow<T = ()> = Result<T, Halt>;

/// Method bodies with early returns lowered, per class.
#[derive(Debug, Default)]
pub(crate) struct Bodies {
    classes: HashMap<String, HashMap<String, Vec<Stmt>>>,
}

impl Bodies {
    pub(crate) fn of(program: &Program) -> Self {
        let classes = program
            .classes
            .iter()
            .map(|class| {
                let methods = class
                    .methods
                    .iter()
                    .map(|m| (m.name.clone(), normalize(&m.body)))
                    .collect();
                (class.name.clone(), methods)
            })
            .collect();
        Self { classes }
    }

    fn get(&self, class: &str, method: &str) -> &[Stmt] {
        self.classes
            .get(class)
            .and_then(|methods| methods.get(method))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

enum Arg {
    Scalar(Term, Sort),
    Object(Vec<(String, Term)>),
}

fn literal_term(lit: Literal, sort: Option<Sort>) -> Term {
    match (lit, sort) {
        (Literal::Bool(b), _) => Term::Bool(b),
        (Literal::Int(n), Some(Sort::Real)) => Term::to_real(Term::Int(n)),
        (Literal::Int(n), _) => Term::Int(n),
        (Literal::Float(x), _) => Term::Real(x),
    }
}

fn default_term(sort: Sort) -> Term {
    match sort {
        Sort::Bool => Term::Bool(false),
        Sort::Int => Term::Int(0),
        Sort::Real => Term::Real(0.0),
    }
}

fn coerce(term: Term, sort: Sort) -> Term {
    if sort == Sort::Real { Term::to_real(term) } else { term }
}

fn scalar_sort(ty: &Type, what: &dyn std::fmt::Display) -> Result<Sort, VerifyError> {
    sort_of(ty).ok_or_else(|| VerifyError::Unsupported(format!("`{what}` has type {ty}")))
}

pub(crate) struct Executor<'r> {
    program: &'r Program,
    class: &'r ClassModel,
    bodies: &'r Bodies,
    config: &'r VerifyConfig,
    log: &'r dyn VerifyLog,
    solver: &'r mut dyn Solver,
    warned: &'r mut BTreeSet<String>,
    table: AliasTable,
    /// Active activations: (receiver prefix, class, method).
    stack: Vec<(String, String, String)>,
}

impl<'r> Executor<'r> {
    pub(crate) fn new(
        program: &'r Program,
        class: &'r ClassModel,
        bodies: &'r Bodies,
        config: &'r VerifyConfig,
        log: &'r dyn VerifyLog,
        solver: &'r mut dyn Solver,
        warned: &'r mut BTreeSet<String>,
    ) -> Self {
        Self {
            program,
            class,
            bodies,
            config,
            log,
            solver,
            warned,
            table: AliasTable::new(),
            stack: Vec::new(),
        }
    }

    fn assert(&mut self, term: Term) -> Flow {
        self.solver.assert(&term)?;
        Ok(())
    }

    fn inconclusive(&self, reason: String) -> Halt {
        Halt::Found(VerificationResult::Timeout {
            class: self.class.name.clone(),
            reason,
            sequences: 0,
        })
    }

    fn violation(&self, frame: &Frame<'_>, loc: Option<covenant_model::Location>, text: String) -> Violation {
        let method = frame.method_name().map(|m| {
            if frame.class.name == self.class.name {
                m.to_string()
            } else {
                format!("{}.{m}", frame.class.name)
            }
        });
        Violation::new(&self.class.name, method.as_deref(), loc, text)
    }

    fn prove(
        &mut self,
        formula: Term,
        keep: bool,
        purpose: &str,
        violation: Violation,
        kind: fn(Violation) -> VerificationResult,
    ) -> Flow {
        let proof = contract::prove_always_true(
            &mut *self.solver,
            self.log,
            purpose,
            &formula,
            keep,
            self.config.collect_models,
        )?;
        match proof {
            Proof::Holds => Ok(()),
            Proof::Violated(model) => Err(Halt::Found(kind(violation.with_model(model)))),
            Proof::Unknown(reason) => Err(self.inconclusive(reason)),
        }
    }

    /// Binds every scalar leaf of the class under verification to its initializer.
    pub(crate) fn initial_state(&mut self) -> Flow {
        for (key, ty, init) in leaves(self.program, &self.class.name)? {
            let sort = scalar_sort(&ty, &key)?;
            let alias = self.table.add_variable(&key, sort)?;
            self.assert(Term::eq(alias.term(), literal_term(init, Some(sort))))?;
        }
        Ok(())
    }

    /// Runs one public method as called from outside the class: requires must
    /// be consistent with the state so far and are then assumed, ensures are
    /// proved.
    pub(crate) fn run_entry(&mut self, method: &'r Method) -> Flow {
        let class = self.class;
        let frame = Frame::activation(class, method, String::new(), 0);
        let always = Term::Bool(true);

        for param in &method.params {
            self.bind_fresh(&frame.param_key(&param.name), &param.ty)?;
        }

        self.refresh_locals(&frame, method)?;

        self.stack.push((String::new(), class.name.clone(), method.name.clone()));
        let mut requires = Vec::with_capacity(method.requires.len());
        for req in &method.requires {
            requires.push(self.build(&req.expr, &frame, &always)?);
        }
        self.require_consistency(&frame, method, &requires)?;
        for t in requires {
            self.assert(t)?;
        }
        let bodies = self.bodies;
        self.exec_block(bodies.get(&class.name, &method.name), &frame, &always)?;
        for ens in &method.ensures {
            let t = self.build(&ens.expr, &frame, &always)?;
            let v = self.violation(&frame, ens.loc.or(ens.expr.loc), ens.text().into_owned());
            self.prove(t, true, "ensure", v, VerificationResult::EnsureError)?;
        }
        self.stack.pop();
        Ok(())
    }

    /// Proves every class invariant in the current state.
    pub(crate) fn check_invariants(&mut self) -> Flow {
        let class = self.class;
        let frame = Frame::object(class);
        let always = Term::Bool(true);
        for inv in &class.invariants {
            let t = self.build(&inv.expr, &frame, &always)?;
            let v = self.violation(&frame, inv.loc.or(inv.expr.loc), inv.text().into_owned());
            self.prove(t, false, "invariant", v, VerificationResult::InvariantError)?;
        }
        Ok(())
    }

    /// Entry requires must be satisfiable together with everything the
    /// sequence has asserted so far; otherwise the method cannot legally be
    /// called in this state.
    fn require_consistency(&mut self, frame: &Frame<'r>, method: &'r Method, requires: &[Term]) -> Flow {
        if requires.is_empty() {
            return Ok(());
        }
        let answer = contract::check_consistent(&mut *self.solver, self.log, "require consistency", requires)?;
        match answer {
            SatResult::Sat => Ok(()),
            SatResult::Unsat => {
                let text = method
                    .requires
                    .iter()
                    .map(|r| r.text().into_owned())
                    .collect::<Vec<_>>()
                    .join(" && ");
                let loc = method.requires.first().and_then(|r| r.loc).or(method.loc);
                Err(Halt::Found(VerificationResult::RequireError(
                    self.violation(frame, loc, text),
                )))
            }
            SatResult::Unknown(reason) => Err(self.inconclusive(reason)),
        }
    }

    /// Registers a fresh, unconstrained value for a parameter.
    fn bind_fresh(&mut self, key: &str, ty: &Type) -> Flow {
        match ty {
            Type::Class(class) => {
                for (suffix, leaf_ty, _) in leaves(self.program, class)? {
                    let sort = scalar_sort(&leaf_ty, &suffix)?;
                    self.table.add_or_increment(&format!("{key}.{suffix}"), sort);
                }
            }
            ty => {
                let sort = scalar_sort(ty, &key)?;
                self.table.add_or_increment(key, sort);
            }
        }
        Ok(())
    }

    /// Gives the locals and `Result` of a repeated activation fresh versions,
    /// so a read before the first write does not see the previous call.
    fn refresh_locals(&mut self, frame: &Frame<'r>, method: &Method) -> Flow {
        let mut keys = Vec::new();
        for local in &method.locals {
            let key = frame.param_key(&local.name);
            match &local.ty {
                Type::Class(class) => {
                    for (suffix, _, _) in leaves(self.program, class)? {
                        keys.push(format!("{key}.{suffix}"));
                    }
                }
                _ => keys.push(key),
            }
        }
        if !method.is_void() {
            keys.push(frame.result_key());
        }
        for key in keys {
            if self.table.contains(&key) {
                self.table.increment_alias(&key)?;
            }
        }
        Ok(())
    }

    fn exec_block(&mut self, stmts: &[Stmt], frame: &Frame<'r>, guard: &Term) -> Flow {
        for stmt in stmts {
            self.exec_stmt(stmt, frame, guard)?;
        }
        Ok(())
    }

    fn exec_stmt(&mut self, stmt: &Stmt, frame: &Frame<'r>, guard: &Term) -> Flow {
        match stmt {
            Stmt::Assign { target, value, .. } => {
                let ty = frame.place_type(self.program, target)?;
                let key = frame.key(target)?;
                if let Some(class) = ty.class_name() {
                    return self.assign_object(&key, class, value, frame, guard);
                }
                let sort = scalar_sort(&ty, target)?;
                let value = coerce(self.build(value, frame, guard)?, sort);
                let alias = self.table.add_or_increment(&key, sort);
                self.assert(Term::implies(guard.clone(), Term::eq(alias.term(), value)))
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => self.exec_if(cond, then_branch, else_branch, frame, guard),
            Stmt::Call { call, .. } => self.call(call, frame, guard).map(|_| ()),
            Stmt::Return { value: Some(value), .. } => {
                let method = frame
                    .method
                    .ok_or_else(|| VerifyError::Unsupported("`return` outside a method".into()))?;
                let sort = scalar_sort(&method.return_type, &method.name)?;
                let value = coerce(self.build(value, frame, guard)?, sort);
                let alias = self.table.add_or_increment(&frame.result_key(), sort);
                self.assert(Term::implies(guard.clone(), Term::eq(alias.term(), value)))
            }
            Stmt::Return { value: None, .. } => Ok(()),
        }
    }

    fn assign_object(&mut self, key: &str, class: &str, value: &Expr, frame: &Frame<'r>, guard: &Term) -> Flow {
        let leaves = leaves(self.program, class)?;
        let mut values = Vec::with_capacity(leaves.len());
        match &value.kind {
            ExprKind::New { .. } => {
                for (suffix, ty, init) in &leaves {
                    values.push((suffix.clone(), literal_term(*init, sort_of(ty))));
                }
            }
            ExprKind::Place(source) => {
                let source = frame.key(source)?;
                for (suffix, ty, _) in &leaves {
                    let sort = scalar_sort(ty, suffix)?;
                    values.push((suffix.clone(), self.table.read(&format!("{source}.{suffix}"), sort).term()));
                }
            }
            _ => return Err(VerifyError::Unsupported(format!("object value `{value}`")).into()),
        }
        for (suffix, v) in values {
            let alias = self.table.add_or_increment(&format!("{key}.{suffix}"), v.sort());
            self.assert(Term::implies(guard.clone(), Term::eq(alias.term(), v)))?;
        }
        Ok(())
    }

    fn exec_if(
        &mut self,
        cond: &Expr,
        then_branch: &[Stmt],
        else_branch: &[Stmt],
        frame: &Frame<'r>,
        guard: &Term,
    ) -> Flow {
        let c = self.build(cond, frame, guard)?;
        let on_true = Term::and([guard.clone(), c.clone()]);
        let on_false = Term::and([guard.clone(), Term::not(c)]);

        let before = self.table.clone();
        self.exec_block(then_branch, frame, &on_true)?;
        let true_table = std::mem::replace(&mut self.table, before);
        self.exec_block(else_branch, frame, &on_false)?;
        let false_table = std::mem::take(&mut self.table);

        let only_true = true_table.alias_difference(&false_table);
        let only_false = false_table.alias_difference(&true_table);
        let mut merged = true_table.clone();
        let updated = merged.merge(&false_table);

        for alias in &only_false {
            self.assert(Term::implies(
                on_true.clone(),
                Term::eq(alias.term(), default_term(alias.sort)),
            ))?;
            merged.insert(alias);
        }
        for alias in &only_true {
            self.assert(Term::implies(
                on_false.clone(),
                Term::eq(alias.term(), default_term(alias.sort)),
            ))?;
        }
        for phi in &updated {
            let t = true_table.get_alias(&phi.key)?;
            let f = false_table.get_alias(&phi.key)?;
            self.assert(Term::implies(on_true.clone(), Term::eq(phi.term(), t.term())))?;
            self.assert(Term::implies(on_false.clone(), Term::eq(phi.term(), f.term())))?;
        }
        self.table = merged;
        Ok(())
    }

    /// Inlines (or abstracts) a call; returns the callee's `Result` term for
    /// non-void methods.
    fn call(&mut self, call: &CallExpr, frame: &Frame<'r>, guard: &Term) -> Flow<Option<Term>> {
        let program = self.program;
        let (class, receiver) = match &call.receiver {
            None => (frame.class, frame.receiver.clone()),
            Some(place) => {
                let ty = frame.place_type(program, place)?;
                let name = ty
                    .class_name()
                    .ok_or_else(|| VerifyError::Unsupported(format!("call on non-object `{place}`")))?;
                let class = program
                    .class(name)
                    .ok_or_else(|| VerifyError::UnknownClass(name.to_string()))?;
                (class, format!("{}.", frame.key(place)?))
            }
        };
        let callee = class.method(&call.method).ok_or_else(|| VerifyError::UnknownMethod {
            class: class.name.clone(),
            method: call.method.clone(),
        })?;

        let mut args = Vec::with_capacity(call.args.len());
        for (arg, param) in call.args.iter().zip(&callee.params) {
            match &param.ty {
                Type::Class(param_class) => {
                    let ExprKind::Place(source) = &arg.kind else {
                        return Err(VerifyError::Unsupported(format!("object argument `{arg}`")).into());
                    };
                    let source = frame.key(source)?;
                    let mut values = Vec::new();
                    for (suffix, ty, _) in leaves(program, param_class)? {
                        let sort = scalar_sort(&ty, &suffix)?;
                        values.push((suffix.clone(), self.table.read(&format!("{source}.{suffix}"), sort).term()));
                    }
                    args.push(Arg::Object(values));
                }
                ty => {
                    let sort = scalar_sort(ty, &param.name)?;
                    args.push(Arg::Scalar(coerce(self.build(arg, frame, guard)?, sort), sort));
                }
            }
        }

        let nth = self
            .stack
            .iter()
            .filter(|(r, c, m)| *r == receiver && *c == class.name && *m == callee.name)
            .count();
        let inner = Frame::activation(class, callee, receiver.clone(), nth);
        for (param, arg) in callee.params.iter().zip(args) {
            let key = inner.param_key(&param.name);
            match arg {
                Arg::Scalar(t, sort) => {
                    let alias = self.table.add_or_increment(&key, sort);
                    self.assert(Term::implies(guard.clone(), Term::eq(alias.term(), t)))?;
                }
                Arg::Object(values) => {
                    for (suffix, t) in values {
                        let alias = self.table.add_or_increment(&format!("{key}.{suffix}"), t.sort());
                        self.assert(Term::implies(guard.clone(), Term::eq(alias.term(), t)))?;
                    }
                }
            }
        }

        self.refresh_locals(&inner, callee)?;

        let inline = self.stack.len() <= self.config.inline_depth;
        self.stack.push((receiver, class.name.clone(), callee.name.clone()));
        let out = self.enter(&inner, guard, inline);
        self.stack.pop();
        out
    }

    fn enter(&mut self, frame: &Frame<'r>, guard: &Term, inline: bool) -> Flow<Option<Term>> {
        let (class, method) = match frame.method {
            Some(method) => (frame.class, method),
            None => return Ok(None),
        };

        for req in &method.requires {
            let t = self.build(&req.expr, frame, guard)?;
            let v = self.violation(frame, req.loc.or(req.expr.loc), req.text().into_owned());
            self.prove(
                Term::implies(guard.clone(), t),
                true,
                "require",
                v,
                VerificationResult::RequireError,
            )?;
        }

        if inline {
            let bodies = self.bodies;
            self.exec_block(bodies.get(&class.name, &method.name), frame, guard)?;
        } else {
            self.abstract_call(frame, class, method)?;
        }

        let check_ensures = inline && class.name == self.class.name;
        for ens in &method.ensures {
            let t = Term::implies(guard.clone(), self.build(&ens.expr, frame, guard)?);
            if check_ensures {
                let v = self.violation(frame, ens.loc.or(ens.expr.loc), ens.text().into_owned());
                self.prove(t, true, "ensure", v, VerificationResult::EnsureError)?;
            } else {
                self.assert(t)?;
            }
        }

        if method.is_void() {
            return Ok(None);
        }
        let sort = scalar_sort(&method.return_type, &method.name)?;
        Ok(Some(self.table.read(&frame.result_key(), sort).term()))
    }

    /// Replaces a call by its contract: every member it may write and its
    /// result get fresh, unconstrained versions.
    fn abstract_call(&mut self, frame: &Frame<'r>, class: &'r ClassModel, method: &'r Method) -> Flow {
        let qualified = format!("{}.{}", class.name, method.name);
        if self.warned.insert(qualified) {
            self.log.abstracted(&class.name, &method.name, self.config.inline_depth);
        }
        for suffix in written_members(self.program, class, method)? {
            let key = format!("{}{suffix}", frame.receiver);
            if let Ok(current) = self.table.get_alias(&key) {
                self.table.add_or_increment(&key, current.sort);
            }
        }
        if !method.is_void() {
            let sort = scalar_sort(&method.return_type, &method.name)?;
            self.table.add_or_increment(&frame.result_key(), sort);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::Model;
    use covenant_model::{ClassBuilder, MethodBuilder};

    /// Records assertions, and the live ones at every check. Everything is
    /// unsatisfiable unless `sat_when` says otherwise.
    #[derive(Default)]
    struct Script {
        lines: Vec<String>,
        live: Vec<String>,
        scopes: Vec<usize>,
        checks: Vec<Vec<String>>,
        sat_when: Option<fn(&[String]) -> bool>,
    }

    impl Solver for Script {
        fn assert(&mut self, term: &Term) -> Result<(), SolverError> {
            self.lines.push(format!("{}{term}", "  ".repeat(self.scopes.len())));
            self.live.push(term.to_string());
            Ok(())
        }
        fn push(&mut self) -> Result<(), SolverError> {
            self.scopes.push(self.live.len());
            Ok(())
        }
        fn pop(&mut self) -> Result<(), SolverError> {
            let mark = self.scopes.pop().ok_or(SolverError::Unbalanced)?;
            self.live.truncate(mark);
            Ok(())
        }
        fn check(&mut self) -> Result<SatResult, SolverError> {
            self.checks.push(self.live.clone());
            match self.sat_when {
                Some(sat) if sat(&self.live) => Ok(SatResult::Sat),
                _ => Ok(SatResult::Unsat),
            }
        }
        fn model(&mut self) -> Result<Option<Model>, SolverError> {
            Ok(None)
        }
    }

    fn program(class: covenant_model::ClassModel) -> Program {
        let mut program = Program::from(class);
        program.resolve().unwrap();
        program
    }

    /// Runs `methods` as one sequence, then the invariants.
    fn replay(program: &Program, methods: &[&str], solver: &mut Script) -> Result<(), VerificationResult> {
        let class = &program.classes[0];
        let bodies = Bodies::of(program);
        let config = VerifyConfig::default();
        let mut warned = BTreeSet::new();
        let outcome = {
            let mut exec = Executor::new(program, class, &bodies, &config, &crate::NoopLog, solver, &mut warned);
            let mut flow = exec.initial_state();
            for m in methods {
                let method = class.method(m).expect("method");
                flow = flow.and_then(|()| exec.run_entry(method));
            }
            flow.and_then(|()| exec.check_invariants())
        };
        assert!(solver.scopes.is_empty());
        match outcome {
            Ok(()) => Ok(()),
            Err(Halt::Found(result)) => Err(result),
            Err(Halt::Failed(e)) => panic!("execution failed: {e}"),
        }
    }

    fn run(program: &Program, methods: &[&str]) -> Vec<String> {
        let mut solver = Script::default();
        replay(program, methods, &mut solver).expect("run");
        solver.lines
    }

    #[test]
    fn one_armed_if_merges_with_phi() {
        let p = program(
            ClassBuilder::new("Counter")
                .field("X", Type::Int)
                .method(
                    MethodBuilder::new("Step")
                        .stmt(Stmt::if_then(
                            Expr::place("X").eq(Expr::int(0)),
                            vec![Stmt::assign("X", Expr::int(1))],
                        ))
                        .build(),
                )
                .build(),
        );
        assert_eq!(
            run(&p, &["Step"]),
            [
                "(= |X_0| 0)",
                "(=> (= |X_0| 0) (= |X_1| 1))",
                "(=> (= |X_0| 0) (= |X_2| |X_1|))",
                "(=> (not (= |X_0| 0)) (= |X_2| |X_0|))",
            ]
        );
    }

    #[test]
    fn branch_local_defaults_under_the_other_arm() {
        let p = program(
            ClassBuilder::new("C")
                .field("X", Type::Int)
                .method(
                    MethodBuilder::new("M")
                        .param("b", Type::Bool)
                        .local("t", Type::Int)
                        .stmt(Stmt::if_then(Expr::place("b"), vec![Stmt::assign("t", Expr::int(5))]))
                        .build(),
                )
                .build(),
        );
        let lines = run(&p, &["M"]);
        assert!(lines.contains(&"(=> |M::b_0| (= |M::t_0| 5))".to_string()), "{lines:#?}");
        assert!(lines.contains(&"(=> (not |M::b_0|) (= |M::t_0| 0))".to_string()), "{lines:#?}");
    }

    #[test]
    fn division_check_is_scoped() {
        let p = program(
            ClassBuilder::new("R")
                .field("Last", Type::Int)
                .method(
                    MethodBuilder::new("Div")
                        .param("x", Type::Int)
                        .param("y", Type::Int)
                        .stmt(Stmt::assign("Last", Expr::place("x").div(Expr::place("y"))))
                        .build(),
                )
                .build(),
        );
        let lines = run(&p, &["Div"]);
        assert_eq!(lines[1], "  (= |Div::y_0| 0)");
        assert!(lines[2].starts_with("(= |Last_1| (ite (>= |Div::x_0| 0)"));
    }

    #[test]
    fn calls_bind_parameters_and_reroot_receivers() {
        let account = ClassBuilder::new("Account")
            .field("Balance", Type::Int)
            .method(
                MethodBuilder::new("Deposit")
                    .param("n", Type::Int)
                    .stmt(Stmt::assign("Balance", Expr::place("Balance").add(Expr::place("n"))))
                    .build(),
            )
            .build();
        let bank = ClassBuilder::new("Bank")
            .field("acc", Type::Class("Account".into()))
            .method(
                MethodBuilder::new("Save")
                    .stmt(Stmt::call(CallExpr::on("acc", "Deposit", vec![Expr::int(3)])))
                    .build(),
            )
            .build();
        let mut p = Program::new(vec![bank, account]);
        p.resolve().unwrap();
        assert_eq!(
            run(&p, &["Save"]),
            [
                "(= |acc.Balance_0| 0)",
                "(= |acc.Deposit::n_0| 3)",
                "(= |acc.Balance_1| (+ |acc.Balance_0| |acc.Deposit::n_0|))",
            ]
        );
    }

    #[test]
    fn entry_requires_are_checked_against_the_built_state() {
        let p = program(
            ClassBuilder::new("C")
                .field("X", Type::Int)
                .invariant(Expr::place("X").eq(Expr::int(0)))
                .method(
                    MethodBuilder::new("M")
                        .requires(Expr::place("X").eq(Expr::int(1)))
                        .stmt(Stmt::assign("X", Expr::int(5)))
                        .build(),
                )
                .build(),
        );
        let mut solver = Script::default();
        let Err(VerificationResult::RequireError(v)) = replay(&p, &["M"], &mut solver) else {
            panic!("expected a require error");
        };
        assert_eq!(v.text, "X == 1");
        assert_eq!(v.method.as_deref(), Some("M"));
        assert_eq!(solver.checks, [vec!["(= |X_0| 0)", "(= |X_0| 1)"]]);
        // Nothing after the require was executed.
        assert_eq!(solver.lines, ["(= |X_0| 0)", "  (= |X_0| 1)"]);
    }

    #[test]
    fn requires_are_checked_together_then_assumed() {
        let p = program(
            ClassBuilder::new("C")
                .field("X", Type::Int)
                .method(
                    MethodBuilder::new("M")
                        .param("x", Type::Int)
                        .requires(Expr::place("x").eq(Expr::int(0)))
                        .requires(Expr::place("x").ne(Expr::int(0)))
                        .stmt(Stmt::assign("X", Expr::place("x")))
                        .build(),
                )
                .build(),
        );
        let mut solver = Script::default();
        let Err(VerificationResult::RequireError(v)) = replay(&p, &["M"], &mut solver) else {
            panic!("expected a require error");
        };
        assert_eq!(v.text, "x == 0 && x != 0");

        let mut solver = Script {
            sat_when: Some(|_| true),
            ..Script::default()
        };
        replay(&p, &["M"], &mut solver).expect("run");
        assert_eq!(
            solver.lines,
            [
                "(= |X_0| 0)",
                "  (= |M::x_0| 0)",
                "  (not (= |M::x_0| 0))",
                "(= |M::x_0| 0)",
                "(not (= |M::x_0| 0))",
                "(= |X_1| |M::x_0|)",
            ]
        );
    }

    #[test]
    fn violated_ensures_are_reported() {
        let p = program(
            ClassBuilder::new("Id")
                .method(
                    MethodBuilder::new("Get")
                        .param("x", Type::Int)
                        .returns(Type::Int)
                        .ensures(Expr::result().eq(Expr::int(0)))
                        .stmt(Stmt::ret(Expr::place("x")))
                        .build(),
                )
                .build(),
        );
        let mut solver = Script {
            sat_when: Some(|live| live.last().is_some_and(|l| l.starts_with("(not "))),
            ..Script::default()
        };
        let Err(VerificationResult::EnsureError(v)) = replay(&p, &["Get"], &mut solver) else {
            panic!("expected an ensure error");
        };
        assert_eq!(v.text, "Result == 0");
        assert_eq!(
            solver.checks,
            [vec!["(= |Get::Result_0| |Get::x_0|)", "(not (= |Get::Result_0| 0))"]]
        );
    }

    #[test]
    fn short_circuit_guards_the_right_operand() {
        for cond in [
            Expr::place("y").ne(Expr::int(0)).and(Expr::place("x").div(Expr::place("y")).gt(Expr::int(1))),
            Expr::place("y").eq(Expr::int(0)).or(Expr::place("x").div(Expr::place("y")).gt(Expr::int(1))),
        ] {
            let p = program(
                ClassBuilder::new("G")
                    .field("Z", Type::Int)
                    .method(
                        MethodBuilder::new("F")
                            .param("x", Type::Int)
                            .param("y", Type::Int)
                            .stmt(Stmt::if_then(cond, vec![Stmt::assign("Z", Expr::int(1))]))
                            .build(),
                    )
                    .build(),
            );
            let lines = run(&p, &["F"]);
            assert_eq!(lines[1], "  (not (=> (not (= |F::y_0| 0)) (not (= |F::y_0| 0))))");
        }
    }

    #[test]
    fn repeated_calls_get_fresh_locals() {
        let p = program(
            ClassBuilder::new("C")
                .field("X", Type::Int)
                .method(
                    MethodBuilder::new("M")
                        .local("t", Type::Int)
                        .stmt(Stmt::assign("X", Expr::place("t")))
                        .build(),
                )
                .build(),
        );
        assert_eq!(
            run(&p, &["M", "M"]),
            ["(= |X_0| 0)", "(= |X_1| |M::t_0|)", "(= |X_2| |M::t_1|)"]
        );
    }
}
