#![forbid(unsafe_code)]

//! Solver-independent formulas. Every backend consumes [`Term`]; the
//! SMT-LIB2 rendering is its `Display` impl.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sort {
    Bool,
    Int,
    Real,
}

impl Sort {
    pub fn smt_name(self) -> &'static str {
        match self {
            Sort::Bool => "Bool",
            Sort::Int => "Int",
            Sort::Real => "Real",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Add,
    Sub,
    Mul,
    /// SMT `div`: floor division for positive divisors.
    IntDiv,
    RealDiv,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Implies,
    Xor,
}

impl Op {
    pub fn smt_name(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::IntDiv => "div",
            Op::RealDiv => "/",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Eq => "=",
            Op::Implies => "=>",
            Op::Xor => "xor",
        }
    }

    fn is_predicate(self) -> bool {
        matches!(
            self,
            Op::Lt | Op::Le | Op::Gt | Op::Ge | Op::Eq | Op::Implies | Op::Xor
        )
    }
}

/// Largest magnitude below which every integer is exactly an `f64`.
const EXACT_F64_INT: u64 = 1 << 53;

#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    Bool(bool),
    Int(i64),
    Real(f64),
    Var(String, Sort),
    Not(Box<Term>),
    Neg(Box<Term>),
    ToReal(Box<Term>),
    And(Vec<Term>),
    Or(Vec<Term>),
    Binary(Op, Box<Term>, Box<Term>),
    Ite(Box<Term>, Box<Term>, Box<Term>),
}

impl Term {
    pub fn var(name: impl Into<String>, sort: Sort) -> Self {
        Term::Var(name.into(), sort)
    }

    pub fn binary(op: Op, lhs: Term, rhs: Term) -> Self {
        Term::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn eq(lhs: Term, rhs: Term) -> Self {
        Term::binary(Op::Eq, lhs, rhs)
    }

    pub fn implies(lhs: Term, rhs: Term) -> Self {
        match lhs {
            Term::Bool(true) => rhs,
            lhs => Term::binary(Op::Implies, lhs, rhs),
        }
    }

    pub fn not(term: Term) -> Self {
        match term {
            Term::Bool(b) => Term::Bool(!b),
            Term::Not(inner) => *inner,
            term => Term::Not(Box::new(term)),
        }
    }

    /// Conjunction; `true` operands are dropped and nested conjunctions flattened.
    pub fn and(terms: impl IntoIterator<Item = Term>) -> Self {
        let mut out = Vec::new();
        for t in terms {
            match t {
                Term::Bool(true) => {}
                Term::And(inner) => out.extend(inner),
                t => out.push(t),
            }
        }
        match out.len() {
            0 => Term::Bool(true),
            1 => out.pop().unwrap_or(Term::Bool(true)),
            _ => Term::And(out),
        }
    }

    pub fn or(terms: impl IntoIterator<Item = Term>) -> Self {
        let mut out = Vec::new();
        for t in terms {
            match t {
                Term::Bool(false) => {}
                Term::Or(inner) => out.extend(inner),
                t => out.push(t),
            }
        }
        match out.len() {
            0 => Term::Bool(false),
            1 => out.pop().unwrap_or(Term::Bool(false)),
            _ => Term::Or(out),
        }
    }

    pub fn ite(cond: Term, then: Term, otherwise: Term) -> Self {
        Term::Ite(Box::new(cond), Box::new(then), Box::new(otherwise))
    }

    pub fn neg(term: Term) -> Self {
        Term::Neg(Box::new(term))
    }

    /// Promotes an `Int` term to `Real`; other sorts are returned unchanged.
    pub fn to_real(term: Term) -> Self {
        match term {
            Term::Int(n) if n.unsigned_abs() <= EXACT_F64_INT => Term::Real(n as f64),
            Term::Int(n) => Term::ToReal(Box::new(Term::Int(n))),
            term if term.sort() == Sort::Int => Term::ToReal(Box::new(term)),
            term => term,
        }
    }

    pub fn sort(&self) -> Sort {
        match self {
            Term::Bool(_) | Term::Not(_) | Term::And(_) | Term::Or(_) => Sort::Bool,
            Term::Int(_) => Sort::Int,
            Term::Real(_) | Term::ToReal(_) => Sort::Real,
            Term::Var(_, sort) => *sort,
            Term::Neg(inner) => inner.sort(),
            Term::Binary(op, lhs, _) => match op {
                op if op.is_predicate() => Sort::Bool,
                Op::IntDiv => Sort::Int,
                Op::RealDiv => Sort::Real,
                _ => lhs.sort(),
            },
            Term::Ite(_, then, _) => then.sort(),
        }
    }

    /// Free symbols with their sorts, sorted by name.
    pub fn symbols(&self) -> BTreeMap<String, Sort> {
        let mut out = BTreeMap::new();
        self.collect_symbols(&mut out);
        out
    }

    pub(crate) fn collect_symbols(&self, out: &mut BTreeMap<String, Sort>) {
        match self {
            Term::Bool(_) | Term::Int(_) | Term::Real(_) => {}
            Term::Var(name, sort) => {
                out.entry(name.clone()).or_insert(*sort);
            }
            Term::Not(t) | Term::Neg(t) | Term::ToReal(t) => t.collect_symbols(out),
            Term::And(ts) | Term::Or(ts) => ts.iter().for_each(|t| t.collect_symbols(out)),
            Term::Binary(_, l, r) => {
                l.collect_symbols(out);
                r.collect_symbols(out);
            }
            Term::Ite(c, t, e) => {
                c.collect_symbols(out);
                t.collect_symbols(out);
                e.collect_symbols(out);
            }
        }
    }
}

/// Exact decimal for a finite float: `Display` for `f64` never uses exponents.
pub(crate) fn real_literal(x: f64) -> String {
    let s = format!("{}", x.abs());
    if s.contains('.') { s } else { format!("{s}.0") }
}

/// `|name|` quoting, so alias names may carry `.`, `:` and similar.
pub(crate) fn quote_symbol(name: &str) -> String {
    format!("|{name}|")
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Bool(b) => write!(f, "{b}"),
            Term::Int(n) if *n < 0 => write!(f, "(- {})", n.unsigned_abs()),
            Term::Int(n) => write!(f, "{n}"),
            Term::Real(x) if x.is_sign_negative() && *x != 0.0 => {
                write!(f, "(- {})", real_literal(*x))
            }
            Term::Real(x) => f.write_str(&real_literal(*x)),
            Term::Var(name, _) => f.write_str(&quote_symbol(name)),
            Term::Not(t) => write!(f, "(not {t})"),
            Term::Neg(t) => write!(f, "(- {t})"),
            Term::ToReal(t) => write!(f, "(to_real {t})"),
            Term::And(ts) | Term::Or(ts) => {
                let head = if matches!(self, Term::And(_)) { "and" } else { "or" };
                write!(f, "({head}")?;
                for t in ts {
                    write!(f, " {t}")?;
                }
                f.write_str(")")
            }
            Term::Binary(op, l, r) => write!(f, "({} {l} {r})", op.smt_name()),
            Term::Ite(c, t, e) => write!(f, "(ite {c} {t} {e})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_smtlib() {
        let x = Term::var("Counter::X_0", Sort::Int);
        let t = Term::implies(
            Term::var("g", Sort::Bool),
            Term::eq(x.clone(), Term::binary(Op::Add, x, Term::Int(-1))),
        );
        assert_eq!(
            t.to_string(),
            "(=> |g| (= |Counter::X_0| (+ |Counter::X_0| (- 1))))"
        );
    }

    #[test]
    fn reals_never_use_exponents() {
        assert_eq!(Term::Real(1e20).to_string(), "100000000000000000000.0");
        assert_eq!(Term::Real(-0.5).to_string(), "(- 0.5)");
        assert_eq!(Term::Real(2.0).to_string(), "2.0");
    }

    #[test]
    fn and_or_simplify_units() {
        assert_eq!(Term::and([Term::Bool(true), Term::Bool(true)]), Term::Bool(true));
        let g = Term::var("g", Sort::Bool);
        assert_eq!(Term::and([Term::Bool(true), g.clone()]), g);
        assert_eq!(Term::or(Vec::new()), Term::Bool(false));
        assert_eq!(Term::implies(Term::Bool(true), g.clone()), g);
        assert_eq!(Term::not(Term::not(g.clone())), g);
    }

    #[test]
    fn large_integers_promote_without_rounding() {
        assert_eq!(Term::to_real(Term::Int(3)), Term::Real(3.0));
        assert_eq!(Term::to_real(Term::Int(-(1 << 53))).to_string(), "(- 9007199254740992.0)");
        let big = Term::to_real(Term::Int(9_007_199_254_740_993));
        assert_eq!(big.sort(), Sort::Real);
        assert_eq!(big.to_string(), "(to_real 9007199254740993)");
        assert_eq!(Term::to_real(Term::Int(i64::MIN)).to_string(), "(to_real (- 9223372036854775808))");
    }

    #[test]
    fn sorts_and_symbols() {
        let a = Term::var("a", Sort::Int);
        let q = Term::binary(Op::RealDiv, Term::to_real(a.clone()), Term::Real(2.0));
        assert_eq!(q.sort(), Sort::Real);
        assert_eq!(Term::binary(Op::Lt, a.clone(), Term::Int(0)).sort(), Sort::Bool);
        let syms = Term::eq(a, Term::var("b", Sort::Int)).symbols();
        assert_eq!(syms.keys().cloned().collect::<Vec<_>>(), ["a", "b"]);
    }
}
