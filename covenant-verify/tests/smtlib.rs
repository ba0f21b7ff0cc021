//! End-to-end runs through an external SMT-LIB2 solver. Each test returns
//! early when no `z3` executable is on the PATH.

use covenant_model::{
    CallExpr, ClassBuilder, ClassModel, Contract, Expr, Literal, MethodBuilder, Program, Stmt, Type,
};
use covenant_verify::{SmtLibBackend, VerificationResult, Verifier, VerifyConfig};

fn solver() -> Option<SmtLibBackend> {
    let backend = SmtLibBackend::default();
    if backend.is_available() {
        Some(backend)
    } else {
        eprintln!("warning: no `z3` executable on PATH; solver-backed test skipped, not run");
        None
    }
}

fn parse(src: &str) -> Program {
    serde_json::from_str(src).expect("json")
}

fn resolved(mut program: Program) -> Program {
    program.resolve().expect("resolve");
    program
}

fn verify(program: &Program, class: &str, depth: usize) -> VerificationResult {
    let backend = SmtLibBackend::default();
    Verifier::new(program, &backend)
        .with_config(VerifyConfig::default().with_max_depth(depth))
        .verify(class)
        .expect("verify")
}

#[test]
fn counter_with_two_valued_invariant_verifies() {
    let Some(_) = solver() else { return };
    let program = resolved(parse(include_str!("../../demos/counter.json")));
    for depth in 0..=3 {
        let result = verify(&program, "Counter", depth);
        assert!(result.is_success(), "depth {depth}: {result}");
    }
}

#[test]
fn counter_with_zero_invariant_fails_after_one_step() {
    let Some(_) = solver() else { return };
    let mut program = parse(include_str!("../../demos/counter.json"));
    program.classes[0].invariants = vec![Contract::new(Expr::place("X").eq(Expr::int(0)))];
    let program = resolved(program);

    assert!(verify(&program, "Counter", 0).is_success());
    for depth in 1..=2 {
        let result = verify(&program, "Counter", depth);
        let VerificationResult::InvariantError(v) = &result else {
            panic!("depth {depth}: expected invariant error, got {result}");
        };
        assert_eq!(v.sequence, ["Step"]);
        assert_eq!(v.text, "X == 0");
        let model = v.model.as_ref().expect("counterexample");
        assert!(!model.is_empty());
    }
}

#[test]
fn verdicts_are_deterministic() {
    let Some(_) = solver() else { return };
    let program = resolved(parse(include_str!("../../demos/bank.json")));
    let first = verify(&program, "Bank", 2);
    let second = verify(&program, "Bank", 2);
    assert_eq!(first.kind(), second.kind());
    assert_eq!(first.violation().map(|v| &v.sequence), second.violation().map(|v| &v.sequence));
}

#[test]
fn contradictory_requires_are_a_require_error() {
    let Some(_) = solver() else { return };
    let class = ClassBuilder::new("C")
        .field("X", Type::Int)
        .method(
            MethodBuilder::new("M")
                .param("x", Type::Int)
                .requires(Expr::place("x").eq(Expr::int(0)))
                .requires(Expr::place("x").ne(Expr::int(0)))
                .stmt(Stmt::assign("X", Expr::place("x")))
                .build(),
        )
        .build();
    let program = resolved(Program::from(class));

    let result = verify(&program, "C", 1);
    let VerificationResult::RequireError(v) = &result else {
        panic!("expected require error, got {result}");
    };
    assert_eq!(v.text, "x == 0 && x != 0");
    assert_eq!(v.method.as_deref(), Some("M"));
}

fn identity(guarded: bool) -> ClassModel {
    let mut get = MethodBuilder::new("Get")
        .param("x", Type::Int)
        .returns(Type::Int)
        .ensures(Expr::result().eq(Expr::int(0)))
        .stmt(Stmt::ret(Expr::place("x")));
    if guarded {
        get = get.requires(Expr::place("x").eq(Expr::int(0)));
    }
    ClassBuilder::new("Id").method(get.build()).build()
}

#[test]
fn ensures_are_enforced_on_unconstrained_inputs() {
    let Some(_) = solver() else { return };
    let program = resolved(Program::from(identity(false)));
    let result = verify(&program, "Id", 1);
    let VerificationResult::EnsureError(v) = &result else {
        panic!("expected ensure error, got {result}");
    };
    assert_eq!(v.text, "Result == 0");
    assert_eq!(v.sequence, ["Get"]);

    let program = resolved(Program::from(identity(true)));
    assert!(verify(&program, "Id", 2).is_success());
}

#[test]
fn unguarded_division_is_an_assume_error() {
    let Some(_) = solver() else { return };
    let program = resolved(parse(include_str!("../../demos/ratio.json")));
    let result = verify(&program, "Ratio", 1);
    let VerificationResult::AssumeError(v) = &result else {
        panic!("expected assume error, got {result}");
    };
    assert_eq!(v.text, "x / y");
    assert_eq!(v.method.as_deref(), Some("Divide"));
    let y = v.model.as_ref().and_then(|m| m.get("Divide::y_0"));
    assert_eq!(y, Some("0"));

    let program = resolved(parse(include_str!("../../demos/ratio_guarded.json")));
    assert!(verify(&program, "Ratio", 2).is_success());
}

#[test]
fn integer_division_truncates_toward_zero() {
    let Some(_) = solver() else { return };
    let class = ClassBuilder::new("Q")
        .field("Q", Type::Int)
        .field("R", Type::Int)
        .invariant(Expr::place("Q").ge(Expr::int(-3)).and(Expr::place("R").ge(Expr::int(-1))))
        .method(
            MethodBuilder::new("Run")
                .stmt(Stmt::assign("Q", Expr::int(-7).div(Expr::int(2))))
                .stmt(Stmt::assign("R", Expr::int(-7).rem(Expr::int(2))))
                .build(),
        )
        .build();
    let program = resolved(Program::from(class));
    // Euclidean division would give -4 and 1; truncation gives -3 and -1.
    assert!(verify(&program, "Q", 1).is_success());
}

#[test]
fn bank_verifies_through_nested_calls() {
    let Some(_) = solver() else { return };
    let program = resolved(parse(include_str!("../../demos/bank.json")));
    let result = verify(&program, "Bank", 2);
    assert!(result.is_success(), "{result}");
}

#[test]
fn withdrawing_from_a_fresh_account_is_a_require_error() {
    let Some(_) = solver() else { return };
    let program = resolved(parse(include_str!("../../demos/bank.json")));
    let result = verify(&program, "Account", 2);
    let VerificationResult::RequireError(v) = &result else {
        panic!("expected require error, got {result}");
    };
    assert_eq!(v.method.as_deref(), Some("Withdraw"));
    assert_eq!(v.sequence, ["Withdraw"]);
    assert_eq!(v.text, "amount > 0 && Balance >= amount");
}

#[test]
fn callee_requires_are_checked_at_the_call_site() {
    let Some(_) = solver() else { return };
    let mut program = parse(include_str!("../../demos/bank.json"));
    let bank = program
        .classes
        .iter_mut()
        .find(|c| c.name == "Bank")
        .expect("Bank");
    let charge = bank.methods.iter_mut().find(|m| m.name == "Charge").expect("Charge");
    let Stmt::If { then_branch, .. } = charge.body.remove(0) else {
        panic!("expected if");
    };
    charge.body = then_branch;
    let program = resolved(program);

    let result = verify(&program, "Bank", 1);
    let VerificationResult::RequireError(v) = &result else {
        panic!("expected require error, got {result}");
    };
    assert_eq!(v.class, "Bank");
    assert_eq!(v.method.as_deref(), Some("Account.Withdraw"));
    assert_eq!(v.sequence, ["Charge"]);
}

#[test]
fn private_helper_requires_bind_callers() {
    let Some(_) = solver() else { return };
    let class = ClassBuilder::new("H")
        .field("X", Type::Int)
        .method(
            MethodBuilder::new("Half")
                .private()
                .param("v", Type::Int)
                .requires(Expr::place("v").ge(Expr::int(0)))
                .stmt(Stmt::assign("X", Expr::place("v").div(Expr::int(2))))
                .build(),
        )
        .method(
            MethodBuilder::new("Use")
                .param("y", Type::Int)
                .stmt(Stmt::call(CallExpr::new("Half", vec![Expr::place("y")])))
                .build(),
        )
        .build();
    let program = resolved(Program::from(class));

    let result = verify(&program, "H", 1);
    let VerificationResult::RequireError(v) = &result else {
        panic!("expected require error, got {result}");
    };
    assert_eq!(v.method.as_deref(), Some("Half"));
    assert_eq!(v.text, "v >= 0");
}

#[test]
fn early_returns_reach_the_ensures() {
    let Some(_) = solver() else { return };
    let class = ClassBuilder::new("Clamp")
        .method(
            MethodBuilder::new("Of")
                .param("x", Type::Int)
                .returns(Type::Int)
                .ensures(Expr::result().ge(Expr::int(0)))
                .stmt(Stmt::if_then(
                    Expr::place("x").lt(Expr::int(0)),
                    vec![Stmt::ret(Expr::int(0))],
                ))
                .stmt(Stmt::ret(Expr::place("x")))
                .build(),
        )
        .build();
    let program = resolved(Program::from(class));
    assert!(verify(&program, "Clamp", 1).is_success());
}

#[test]
fn object_members_start_from_their_class_initializers() {
    let Some(_) = solver() else { return };
    let account = ClassBuilder::new("Account")
        .field_init("Balance", Type::Int, Literal::Int(5))
        .build();
    let holder = ClassBuilder::new("Holder")
        .field("Acc", Type::Class("Account".into()))
        .field("Spare", Type::Class("Account".into()))
        .invariant(Expr::place("Acc.Balance").eq(Expr::int(5)))
        .method(
            MethodBuilder::new("Renew")
                .stmt(Stmt::assign("Acc", Expr::new_object("Account")))
                .build(),
        )
        .method(
            MethodBuilder::new("Swap")
                .stmt(Stmt::assign("Acc", Expr::place("Spare")))
                .build(),
        )
        .build();
    let program = resolved(Program::new(vec![account, holder]));
    assert!(verify(&program, "Holder", 2).is_success());
}

#[test]
fn mixed_int_and_double_arithmetic_is_promoted() {
    let Some(_) = solver() else { return };
    let class = ClassBuilder::new("Rate")
        .field("R", Type::Float)
        .invariant(Expr::place("R").ge(Expr::float(0.0)))
        .method(
            MethodBuilder::new("Set")
                .param("r", Type::Float)
                .requires(Expr::place("r").ge(Expr::float(0.5)))
                .stmt(Stmt::assign("R", Expr::place("r").div(Expr::int(2))))
                .build(),
        )
        .build();
    let program = resolved(Program::from(class));
    assert!(verify(&program, "Rate", 2).is_success());
}

#[test]
fn solver_timeouts_are_inconclusive() {
    let Some(backend) = solver() else { return };
    let backend = backend.with_timeout_ms(1);
    let program = resolved(parse(include_str!("../../demos/bank.json")));
    let result = Verifier::new(&program, &backend)
        .with_config(VerifyConfig::default().with_max_depth(2))
        .verify("Bank")
        .expect("verify");
    // A 1 ms limit may or may not be hit; it must never turn into a violation.
    assert!(result.is_success() || result.is_timeout(), "{result}");
}
