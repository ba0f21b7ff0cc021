#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Literal, Location, Type, VarScope};

/// A variable reference or a property/field chain such as `acc.Balance`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub path: Vec<String>,
    #[serde(default)]
    pub scope: VarScope,
}

impl Place {
    /// Parses a dotted path; a leading `this.` is dropped.
    pub fn parse(dotted: &str) -> Self {
        let mut path: Vec<String> = dotted.split('.').map(str::to_string).collect();
        if path.len() > 1 && path[0] == "this" {
            path.remove(0);
        }
        Self {
            path,
            scope: VarScope::Unresolved,
        }
    }

    pub fn result() -> Self {
        Self {
            path: vec![RESULT.to_string()],
            scope: VarScope::Result,
        }
    }

    pub fn root(&self) -> &str {
        self.path.first().map(String::as_str).unwrap_or_default()
    }

    pub fn members(&self) -> &[String] {
        self.path.get(1..).unwrap_or_default()
    }

    pub fn is_chain(&self) -> bool {
        self.path.len() > 1
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path.join("."))
    }
}

/// Name of the pseudo-variable holding a method's return value in `ensures`.
pub const RESULT: &str = "Result";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryArithOp {
    Neg,
    Plus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqualityOp {
    Eq,
    Ne,
}

/// `&`, `|`, `^` on booleans and the short-circuit `&&`, `||`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    And,
    Or,
    Xor,
    ConditionalAnd,
    ConditionalOr,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            ArithOp::Mul | ArithOp::Div | ArithOp::Mod => 13,
            ArithOp::Add | ArithOp::Sub => 12,
        }
    }

    pub fn is_division(self) -> bool {
        matches!(self, ArithOp::Div | ArithOp::Mod)
    }
}

impl UnaryArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryArithOp::Neg => "-",
            UnaryArithOp::Plus => "+",
        }
    }
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

impl EqualityOp {
    pub fn symbol(self) -> &'static str {
        match self {
            EqualityOp::Eq => "==",
            EqualityOp::Ne => "!=",
        }
    }
}

impl LogicalOp {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicalOp::And => "&",
            LogicalOp::Or => "|",
            LogicalOp::Xor => "^",
            LogicalOp::ConditionalAnd => "&&",
            LogicalOp::ConditionalOr => "||",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            LogicalOp::And => 8,
            LogicalOp::Xor => 7,
            LogicalOp::Or => 6,
            LogicalOp::ConditionalAnd => 5,
            LogicalOp::ConditionalOr => 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<Place>,
    pub method: String,
    #[serde(default)]
    pub args: Vec<Expr>,
}

impl CallExpr {
    pub fn new(method: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            receiver: None,
            method: method.into(),
            args,
        }
    }

    pub fn on(receiver: &str, method: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            receiver: Some(Place::parse(receiver)),
            method: method.into(),
            args,
        }
    }
}

impl fmt::Display for CallExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(receiver) = &self.receiver {
            write!(f, "{receiver}.")?;
        }
        write!(f, "{}(", self.method)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprKind {
    Literal(Literal),
    Place(Place),
    Arith {
        op: ArithOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    UnaryArith {
        op: UnaryArithOp,
        operand: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Equality {
        op: EqualityOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Not(Box<Expr>),
    Paren(Box<Expr>),
    Call(CallExpr),
    New {
        class: String,
    },
}

/// Typed expression node. `ty` is filled in by the resolver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    #[serde(default)]
    pub ty: Type,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Location>,
}

#[allow(clippy::should_implement_trait)]
impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            ty: Type::Unknown,
            loc: None,
        }
    }

    fn typed(kind: ExprKind, ty: Type) -> Self {
        Self { kind, ty, loc: None }
    }

    pub fn at(mut self, loc: Location) -> Self {
        self.loc = Some(loc);
        self
    }

    pub fn bool(value: bool) -> Self {
        Self::typed(ExprKind::Literal(Literal::Bool(value)), Type::Bool)
    }

    pub fn int(value: i64) -> Self {
        Self::typed(ExprKind::Literal(Literal::Int(value)), Type::Int)
    }

    pub fn float(value: f64) -> Self {
        Self::typed(ExprKind::Literal(Literal::Float(value)), Type::Float)
    }

    pub fn place(dotted: &str) -> Self {
        Self::new(ExprKind::Place(Place::parse(dotted)))
    }

    pub fn result() -> Self {
        Self::new(ExprKind::Place(Place::result()))
    }

    pub fn call(method: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call(CallExpr::new(method, args)))
    }

    pub fn call_on(receiver: &str, method: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call(CallExpr::on(receiver, method, args)))
    }

    pub fn new_object(class: impl Into<String>) -> Self {
        let class = class.into();
        Self::typed(
            ExprKind::New {
                class: class.clone(),
            },
            Type::Class(class),
        )
    }

    fn arith(self, op: ArithOp, rhs: Expr) -> Self {
        Self::new(ExprKind::Arith {
            op,
            lhs: Box::new(self),
            rhs: Box::new(rhs),
        })
    }

    pub fn add(self, rhs: Expr) -> Self {
        self.arith(ArithOp::Add, rhs)
    }

    pub fn sub(self, rhs: Expr) -> Self {
        self.arith(ArithOp::Sub, rhs)
    }

    pub fn mul(self, rhs: Expr) -> Self {
        self.arith(ArithOp::Mul, rhs)
    }

    pub fn div(self, rhs: Expr) -> Self {
        self.arith(ArithOp::Div, rhs)
    }

    pub fn rem(self, rhs: Expr) -> Self {
        self.arith(ArithOp::Mod, rhs)
    }

    pub fn neg(self) -> Self {
        Self::new(ExprKind::UnaryArith {
            op: UnaryArithOp::Neg,
            operand: Box::new(self),
        })
    }

    fn compare(self, op: CompareOp, rhs: Expr) -> Self {
        Self::typed(
            ExprKind::Compare {
                op,
                lhs: Box::new(self),
                rhs: Box::new(rhs),
            },
            Type::Bool,
        )
    }

    pub fn lt(self, rhs: Expr) -> Self {
        self.compare(CompareOp::Lt, rhs)
    }

    pub fn le(self, rhs: Expr) -> Self {
        self.compare(CompareOp::Le, rhs)
    }

    pub fn gt(self, rhs: Expr) -> Self {
        self.compare(CompareOp::Gt, rhs)
    }

    pub fn ge(self, rhs: Expr) -> Self {
        self.compare(CompareOp::Ge, rhs)
    }

    fn equality(self, op: EqualityOp, rhs: Expr) -> Self {
        Self::typed(
            ExprKind::Equality {
                op,
                lhs: Box::new(self),
                rhs: Box::new(rhs),
            },
            Type::Bool,
        )
    }

    pub fn eq(self, rhs: Expr) -> Self {
        self.equality(EqualityOp::Eq, rhs)
    }

    pub fn ne(self, rhs: Expr) -> Self {
        self.equality(EqualityOp::Ne, rhs)
    }

    pub fn logical(self, op: LogicalOp, rhs: Expr) -> Self {
        Self::typed(
            ExprKind::Logical {
                op,
                lhs: Box::new(self),
                rhs: Box::new(rhs),
            },
            Type::Bool,
        )
    }

    pub fn and(self, rhs: Expr) -> Self {
        self.logical(LogicalOp::ConditionalAnd, rhs)
    }

    pub fn or(self, rhs: Expr) -> Self {
        self.logical(LogicalOp::ConditionalOr, rhs)
    }

    pub fn not(self) -> Self {
        Self::typed(ExprKind::Not(Box::new(self)), Type::Bool)
    }

    pub fn paren(self) -> Self {
        let ty = self.ty.clone();
        Self::typed(ExprKind::Paren(Box::new(self)), ty)
    }

    /// Calls made anywhere inside this expression, outermost first.
    pub fn calls(&self) -> Vec<&CallExpr> {
        let mut out = Vec::new();
        self.collect_calls(&mut out);
        out
    }

    fn collect_calls<'a>(&'a self, out: &mut Vec<&'a CallExpr>) {
        match &self.kind {
            ExprKind::Literal(_) | ExprKind::Place(_) | ExprKind::New { .. } => {}
            ExprKind::Arith { lhs, rhs, .. }
            | ExprKind::Compare { lhs, rhs, .. }
            | ExprKind::Equality { lhs, rhs, .. }
            | ExprKind::Logical { lhs, rhs, .. } => {
                lhs.collect_calls(out);
                rhs.collect_calls(out);
            }
            ExprKind::UnaryArith { operand, .. } => operand.collect_calls(out),
            ExprKind::Not(inner) | ExprKind::Paren(inner) => inner.collect_calls(out),
            ExprKind::Call(call) => {
                out.push(call);
                for arg in &call.args {
                    arg.collect_calls(out);
                }
            }
        }
    }

    fn precedence(&self) -> u8 {
        match &self.kind {
            ExprKind::Arith { op, .. } => op.precedence(),
            ExprKind::Compare { .. } => 10,
            ExprKind::Equality { .. } => 9,
            ExprKind::Logical { op, .. } => op.precedence(),
            ExprKind::UnaryArith { .. } | ExprKind::Not(_) => 14,
            _ => 15,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parent: u8, right: bool) -> fmt::Result {
        let prec = self.precedence();
        if prec < parent || (right && prec == parent) {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }

    fn fmt_binary(
        &self,
        f: &mut fmt::Formatter<'_>,
        lhs: &Expr,
        symbol: &str,
        rhs: &Expr,
    ) -> fmt::Result {
        let prec = self.precedence();
        lhs.fmt_operand(f, prec, false)?;
        write!(f, " {symbol} ")?;
        rhs.fmt_operand(f, prec, true)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(lit) => write!(f, "{lit}"),
            ExprKind::Place(place) => write!(f, "{place}"),
            ExprKind::Arith { op, lhs, rhs } => self.fmt_binary(f, lhs, op.symbol(), rhs),
            ExprKind::Compare { op, lhs, rhs } => self.fmt_binary(f, lhs, op.symbol(), rhs),
            ExprKind::Equality { op, lhs, rhs } => self.fmt_binary(f, lhs, op.symbol(), rhs),
            ExprKind::Logical { op, lhs, rhs } => self.fmt_binary(f, lhs, op.symbol(), rhs),
            ExprKind::UnaryArith { op, operand } => {
                f.write_str(op.symbol())?;
                operand.fmt_operand(f, 14, false)
            }
            ExprKind::Not(inner) => {
                f.write_str("!")?;
                inner.fmt_operand(f, 14, false)
            }
            ExprKind::Paren(inner) => write!(f, "({inner})"),
            ExprKind::Call(call) => write!(f, "{call}"),
            ExprKind::New { class } => write!(f, "new {class}()"),
        }
    }
}
