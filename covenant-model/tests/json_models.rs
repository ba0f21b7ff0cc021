use covenant_model::{CallGraph, ExprKind, Program, Stmt, Type, VarScope};

fn load(src: &str) -> Program {
    let mut program: Program = serde_json::from_str(src).expect("json");
    program.resolve().expect("resolve");
    program
}

#[test]
fn counter_demo_resolves() {
    let program = load(include_str!("../../demos/counter.json"));
    let counter = program.class("Counter").expect("class");
    assert_eq!(counter.entry_points().count(), 2);
    assert_eq!(counter.invariants[0].text(), "X == 0 || X == 1");
    assert_eq!(counter.invariants[0].expr.ty, Type::Bool);

    let Stmt::If { cond, then_branch, .. } = &counter.method("Step").expect("Step").body[0] else {
        panic!("expected if");
    };
    assert_eq!(cond.to_string(), "X == 0");
    let Stmt::Assign { target, .. } = &then_branch[0] else {
        panic!("expected assignment");
    };
    assert_eq!(target.scope, VarScope::Field);
}

#[test]
fn bank_demo_resolves_member_chains() {
    let program = load(include_str!("../../demos/bank.json"));
    let bank = program.class("Bank").expect("class");
    let ExprKind::Compare { lhs, .. } = &bank.invariants[0].expr.kind else {
        panic!("expected comparison");
    };
    assert_eq!(lhs.ty, Type::Int);
    assert_eq!(lhs.to_string(), "acc.Balance");
    assert!(CallGraph::of(bank).recursive_methods().is_empty());
}

#[test]
fn division_demos_resolve() {
    for src in [
        include_str!("../../demos/ratio.json"),
        include_str!("../../demos/ratio_guarded.json"),
    ] {
        let program = load(src);
        let divide = program.class("Ratio").and_then(|c| c.method("Divide")).expect("Divide");
        assert_eq!(divide.return_type, Type::Int);
    }
}

#[test]
fn unknown_name_reports_method_context() {
    let src = r#"{"classes":[{"name":"C","methods":[{"name":"M","body":[
        {"assign":{"target":{"path":["Missing"]},"value":{"kind":{"literal":{"int":1}}},
                   "loc":{"line":4,"column":9}}}]}]}]}"#;
    let mut program: Program = serde_json::from_str(src).expect("json");
    let err = program.resolve().expect_err("unknown name");
    assert_eq!(err.context, "C.M");
    assert_eq!(err.loc.map(|l| l.line), Some(4));
    assert!(err.to_string().contains("unknown name `Missing`"));
}
