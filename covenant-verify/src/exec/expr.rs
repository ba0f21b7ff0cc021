#![forbid(unsafe_code)]

//! Lowering of model expressions to solver terms under the current alias
//! table. Mixed Int/Float operands are promoted to reals; every division
//! first proves its divisor nonzero on the current path.

use covenant_model::{Expr, ExprKind, LogicalOp};

use super::{Executor, Flow, default_term, literal_term, scalar_sort};
use crate::error::VerifyError;
use crate::objects::{Frame, sort_of};
use crate::operators;
use crate::result::VerificationResult;
use crate::term::{Sort, Term};

impl<'r> Executor<'r> {
    /// A division whose divisor can be zero on this path is an `AssumeError`.
    fn check_divisor(&mut self, divisor: &Term, sort: Sort, expr: &Expr, frame: &Frame<'r>, guard: &Term) -> Flow {
        let zero = default_term(sort);
        let safe = Term::implies(guard.clone(), Term::not(Term::eq(divisor.clone(), zero)));
        let v = self.violation(frame, expr.loc, expr.to_string());
        self.prove(safe, false, "divisor", v, VerificationResult::AssumeError)
    }

    fn build_pair(&mut self, lhs: &Expr, rhs: &Expr, frame: &Frame<'r>, guard: &Term) -> Flow<(Term, Term)> {
        let l = self.build(lhs, frame, guard)?;
        let r = self.build(rhs, frame, guard)?;
        if l.sort() != r.sort() {
            return Ok((Term::to_real(l), Term::to_real(r)));
        }
        Ok((l, r))
    }

    /// Lowers an expression under the current alias table.
    pub(super) fn build(&mut self, expr: &Expr, frame: &Frame<'r>, guard: &Term) -> Flow<Term> {
        Ok(match &expr.kind {
            ExprKind::Literal(lit) => literal_term(*lit, sort_of(&expr.ty)),
            ExprKind::Place(place) => {
                let ty = frame.place_type(self.program, place)?;
                let sort = scalar_sort(&ty, place)?;
                self.table.read(&frame.key(place)?, sort).term()
            }
            ExprKind::Arith { op, lhs, rhs } => {
                let (l, r) = self.build_pair(lhs, rhs, frame, guard)?;
                let sort = l.sort();
                if op.is_division() {
                    self.check_divisor(&r, sort, expr, frame, guard)?;
                }
                operators::arith(*op, l, r, sort)
            }
            ExprKind::UnaryArith { op, operand } => operators::unary(*op, self.build(operand, frame, guard)?),
            ExprKind::Compare { op, lhs, rhs } => {
                let (l, r) = self.build_pair(lhs, rhs, frame, guard)?;
                operators::compare(*op, l, r)
            }
            ExprKind::Equality { op, lhs, rhs } => {
                let (l, r) = self.build_pair(lhs, rhs, frame, guard)?;
                operators::equality(*op, l, r)
            }
            ExprKind::Logical { op, lhs, rhs } => {
                let l = self.build(lhs, frame, guard)?;
                // `&&` and `||` only reach their right operand when the left
                // one did not decide the result.
                let rhs_guard = match op {
                    LogicalOp::ConditionalAnd => Term::and([guard.clone(), l.clone()]),
                    LogicalOp::ConditionalOr => Term::and([guard.clone(), Term::not(l.clone())]),
                    _ => guard.clone(),
                };
                let r = self.build(rhs, frame, &rhs_guard)?;
                operators::logical(*op, l, r)
            }
            ExprKind::Not(inner) => Term::not(self.build(inner, frame, guard)?),
            ExprKind::Paren(inner) => self.build(inner, frame, guard)?,
            ExprKind::Call(call) => self.call(call, frame, guard)?.ok_or_else(|| {
                VerifyError::Unsupported(format!("void call `{call}` used as a value"))
            })?,
            ExprKind::New { class } => {
                return Err(VerifyError::Unsupported(format!("`new {class}()` inside an expression")).into());
            }
        })
    }
}
