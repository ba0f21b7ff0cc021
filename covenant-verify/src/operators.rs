#![forbid(unsafe_code)]

//! Operator tag to formula constructor. Operands arrive already promoted to a
//! common sort.

use covenant_model::{ArithOp, CompareOp, EqualityOp, LogicalOp, UnaryArithOp};

use crate::term::{Op, Sort, Term};

pub fn arith(op: ArithOp, lhs: Term, rhs: Term, sort: Sort) -> Term {
    match op {
        ArithOp::Add => Term::binary(Op::Add, lhs, rhs),
        ArithOp::Sub => Term::binary(Op::Sub, lhs, rhs),
        ArithOp::Mul => Term::binary(Op::Mul, lhs, rhs),
        ArithOp::Div if sort == Sort::Real => Term::binary(Op::RealDiv, lhs, rhs),
        ArithOp::Div => truncating_div(lhs, rhs),
        ArithOp::Mod => {
            let q = truncating_div(lhs.clone(), rhs.clone());
            Term::binary(Op::Sub, lhs, Term::binary(Op::Mul, rhs, q))
        }
    }
}

/// Integer division rounding toward zero. SMT `div` is Euclidean, which
/// agrees with truncation whenever the dividend is non-negative.
fn truncating_div(lhs: Term, rhs: Term) -> Term {
    Term::ite(
        Term::binary(Op::Ge, lhs.clone(), Term::Int(0)),
        Term::binary(Op::IntDiv, lhs.clone(), rhs.clone()),
        Term::neg(Term::binary(Op::IntDiv, Term::neg(lhs), rhs)),
    )
}

pub fn unary(op: UnaryArithOp, operand: Term) -> Term {
    match op {
        UnaryArithOp::Neg => Term::neg(operand),
        UnaryArithOp::Plus => operand,
    }
}

pub fn compare(op: CompareOp, lhs: Term, rhs: Term) -> Term {
    let op = match op {
        CompareOp::Lt => Op::Lt,
        CompareOp::Le => Op::Le,
        CompareOp::Gt => Op::Gt,
        CompareOp::Ge => Op::Ge,
    };
    Term::binary(op, lhs, rhs)
}

pub fn equality(op: EqualityOp, lhs: Term, rhs: Term) -> Term {
    match op {
        EqualityOp::Eq => Term::eq(lhs, rhs),
        EqualityOp::Ne => Term::not(Term::eq(lhs, rhs)),
    }
}

/// Short-circuiting only narrows the guard of the right operand's side
/// conditions; as values, `&&`/`||` lower like `&`/`|`.
pub fn logical(op: LogicalOp, lhs: Term, rhs: Term) -> Term {
    match op {
        LogicalOp::And | LogicalOp::ConditionalAnd => Term::and([lhs, rhs]),
        LogicalOp::Or | LogicalOp::ConditionalOr => Term::or([lhs, rhs]),
        LogicalOp::Xor => Term::binary(Op::Xor, lhs, rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_division_truncates() {
        let t = arith(ArithOp::Div, Term::var("a", Sort::Int), Term::var("b", Sort::Int), Sort::Int);
        assert_eq!(
            t.to_string(),
            "(ite (>= |a| 0) (div |a| |b|) (- (div (- |a|) |b|)))"
        );
        let r = arith(ArithOp::Div, Term::var("x", Sort::Real), Term::Real(2.0), Sort::Real);
        assert_eq!(r.to_string(), "(/ |x| 2.0)");
    }

    #[test]
    fn remainder_uses_truncated_quotient() {
        let t = arith(ArithOp::Mod, Term::var("a", Sort::Int), Term::Int(3), Sort::Int);
        assert!(t.to_string().starts_with("(- |a| (* 3 (ite"));
    }

    #[test]
    fn inequality_and_logic() {
        let x = Term::var("x", Sort::Int);
        assert_eq!(equality(EqualityOp::Ne, x.clone(), Term::Int(0)).to_string(), "(not (= |x| 0))");
        let p = Term::var("p", Sort::Bool);
        let q = Term::var("q", Sort::Bool);
        assert_eq!(logical(LogicalOp::ConditionalOr, p.clone(), q.clone()).to_string(), "(or |p| |q|)");
        assert_eq!(logical(LogicalOp::Xor, p, q).to_string(), "(xor |p| |q|)");
    }
}
