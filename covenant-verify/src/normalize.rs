#![forbid(unsafe_code)]

//! Early-return lowering. After [`normalize`], a `return` is always the last
//! statement of its path: code following a conditional that may return is
//! moved into both arms, and code after a `return` is dropped.

use covenant_model::Stmt;

pub fn normalize(body: &[Stmt]) -> Vec<Stmt> {
    lower(body.to_vec())
}

fn lower(stmts: Vec<Stmt>) -> Vec<Stmt> {
    let mut out = Vec::with_capacity(stmts.len());
    let mut iter = stmts.into_iter();
    while let Some(stmt) = iter.next() {
        match stmt {
            Stmt::Return { .. } => {
                out.push(stmt);
                break;
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                loc,
            } if then_branch.iter().chain(&else_branch).any(Stmt::contains_return) => {
                let rest: Vec<Stmt> = iter.collect();
                let then_branch = lower(then_branch.into_iter().chain(rest.iter().cloned()).collect());
                let else_branch = lower(else_branch.into_iter().chain(rest).collect());
                out.push(Stmt::If {
                    cond,
                    then_branch,
                    else_branch,
                    loc,
                });
                break;
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_model::Expr;

    fn render(stmts: &[Stmt]) -> Vec<String> {
        stmts.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn tail_moves_into_both_arms() {
        let body = vec![
            Stmt::if_then(Expr::place("c"), vec![Stmt::ret(Expr::int(1))]),
            Stmt::assign("X", Expr::int(2)),
            Stmt::ret(Expr::int(3)),
        ];
        assert_eq!(
            render(&normalize(&body)),
            ["if (c) { return 1; } else { X = 2; return 3; }"]
        );
    }

    #[test]
    fn code_after_return_is_dropped() {
        let body = vec![
            Stmt::assign("X", Expr::int(1)),
            Stmt::ret_void(),
            Stmt::assign("X", Expr::int(2)),
        ];
        assert_eq!(render(&normalize(&body)), ["X = 1;", "return;"]);
    }

    #[test]
    fn bodies_without_return_are_unchanged() {
        let body = vec![
            Stmt::if_then(Expr::place("c"), vec![Stmt::assign("X", Expr::int(1))]),
            Stmt::assign("Y", Expr::int(2)),
        ];
        assert_eq!(normalize(&body), body);
    }

    #[test]
    fn nested_returns() {
        let body = vec![
            Stmt::if_then(
                Expr::place("a"),
                vec![Stmt::if_then(Expr::place("b"), vec![Stmt::ret_void()])],
            ),
            Stmt::assign("X", Expr::int(1)),
        ];
        assert_eq!(
            render(&normalize(&body)),
            ["if (a) { if (b) { return; } else { X = 1; } } else { X = 1; }"]
        );
    }
}
