#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};

use crate::class::{ClassModel, Contract, Member, Method, Program};
use crate::error::ModelError;
use crate::expr::{ArithOp, CallExpr, Expr, ExprKind, Place, RESULT};
use crate::stmt::Stmt;
use crate::types::{Access, Literal, Location, Type, VarScope, Variable};

/// Per-class view used while the method bodies themselves are being rewritten.
struct ClassSig {
    members: Vec<(String, Type, VarScope)>,
    methods: Vec<MethodSig>,
}

struct MethodSig {
    name: String,
    access: Access,
    params: Vec<Type>,
    ret: Type,
}

impl ClassSig {
    fn member(&self, name: &str) -> Option<(&Type, VarScope)> {
        self.members
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, ty, scope)| (ty, *scope))
    }

    fn method(&self, name: &str) -> Option<&MethodSig> {
        self.methods.iter().find(|m| m.name == name)
    }
}

type Signatures = HashMap<String, ClassSig>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Body,
    Require,
    Ensure,
    Invariant,
}

struct Frame<'a> {
    name: &'a str,
    params: &'a [Variable],
    locals: &'a [Variable],
    ret: &'a Type,
}

struct Scope<'a> {
    sigs: &'a Signatures,
    class: &'a str,
    frame: Option<Frame<'a>>,
    mode: Mode,
}

impl Scope<'_> {
    fn error(&self, message: impl Into<String>, loc: Option<Location>) -> ModelError {
        let context = match &self.frame {
            Some(frame) => format!("{}.{}", self.class, frame.name),
            None => self.class.to_string(),
        };
        ModelError::new(context, message).at(loc)
    }

    fn sig(&self, class: &str) -> Option<&ClassSig> {
        self.sigs.get(class)
    }
}

impl Program {
    /// Binds every name to its variable kind, fills in expression types and
    /// rejects models the verifier cannot encode.
    pub fn resolve(&mut self) -> Result<(), ModelError> {
        let sigs = collect_signatures(self)?;
        check_containment(self)?;
        for class in &mut self.classes {
            resolve_class(class, &sigs)?;
        }
        Ok(())
    }
}

fn collect_signatures(program: &Program) -> Result<Signatures, ModelError> {
    let known: HashSet<&str> = program.classes.iter().map(|c| c.name.as_str()).collect();
    let mut sigs = Signatures::new();

    for class in &program.classes {
        if sigs.contains_key(&class.name) {
            return Err(ModelError::new(&class.name, "class is declared twice"));
        }

        let mut members = Vec::new();
        let mut seen = HashSet::new();
        for (member, scope) in class
            .fields
            .iter()
            .map(|m| (m, VarScope::Field))
            .chain(class.properties.iter().map(|m| (m, VarScope::Property)))
        {
            if !seen.insert(member.name.as_str()) {
                return Err(ModelError::new(
                    &class.name,
                    format!("member `{}` is declared twice", member.name),
                )
                .at(member.loc));
            }
            check_storage_type(&class.name, &member.name, &member.ty, &known, member.loc)?;
            check_initializer(&class.name, member)?;
            members.push((member.name.clone(), member.ty.clone(), scope));
        }

        let mut methods: Vec<MethodSig> = Vec::new();
        for method in &class.methods {
            let context = format!("{}.{}", class.name, method.name);
            if methods.iter().any(|m| m.name == method.name) {
                return Err(ModelError::new(&class.name, format!("method `{}` is declared twice", method.name))
                    .at(method.loc)
                    .with_help("overloads are not supported"));
            }
            let mut names = HashSet::new();
            for var in method.params.iter().chain(&method.locals) {
                if !names.insert(var.name.as_str()) || var.name == RESULT {
                    return Err(ModelError::new(
                        &context,
                        format!("`{}` is declared twice or shadows `{RESULT}`", var.name),
                    )
                    .at(method.loc));
                }
                check_storage_type(&context, &var.name, &var.ty, &known, method.loc)?;
            }
            match &method.return_type {
                Type::Void | Type::Bool | Type::Int | Type::Float => {}
                Type::Class(_) => {
                    return Err(ModelError::new(&context, "methods returning objects are not supported")
                        .at(method.loc));
                }
                Type::Unknown => {
                    return Err(ModelError::new(&context, "return type is missing").at(method.loc));
                }
            }
            methods.push(MethodSig {
                name: method.name.clone(),
                access: method.access,
                params: method.params.iter().map(|p| p.ty.clone()).collect(),
                ret: method.return_type.clone(),
            });
        }

        sigs.insert(class.name.clone(), ClassSig { members, methods });
    }
    Ok(sigs)
}

fn check_storage_type(
    context: &str,
    name: &str,
    ty: &Type,
    known: &HashSet<&str>,
    loc: Option<Location>,
) -> Result<(), ModelError> {
    match ty {
        Type::Bool | Type::Int | Type::Float => Ok(()),
        Type::Class(class) if known.contains(class.as_str()) => Ok(()),
        Type::Class(class) => Err(ModelError::new(
            context,
            format!("`{name}` has unknown class type `{class}`"),
        )
        .at(loc)),
        Type::Unknown | Type::Void => Err(ModelError::new(
            context,
            format!("`{name}` must have type bool, int, double or a class"),
        )
        .at(loc)),
    }
}

fn check_initializer(class: &str, member: &Member) -> Result<(), ModelError> {
    let Some(init) = member.init else {
        return Ok(());
    };
    if let Literal::Float(x) = init {
        if !x.is_finite() {
            return Err(ModelError::new(class, format!("initializer of `{}` is not finite", member.name))
                .at(member.loc));
        }
    }
    if !member.ty.is_scalar() || !member.ty.accepts(&init.ty()) {
        return Err(ModelError::new(
            class,
            format!(
                "initializer `{init}` does not fit `{}` of type {}",
                member.name, member.ty
            ),
        )
        .at(member.loc));
    }
    Ok(())
}

/// Object-typed members are owned values, so containment must be acyclic.
fn check_containment(program: &Program) -> Result<(), ModelError> {
    fn visit<'a>(
        program: &'a Program,
        class: &'a ClassModel,
        path: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Result<(), ModelError> {
        if done.contains(class.name.as_str()) {
            return Ok(());
        }
        if path.contains(&class.name.as_str()) {
            path.push(&class.name);
            return Err(ModelError::new(
                &class.name,
                format!("class contains itself through `{}`", path.join(" -> ")),
            ));
        }
        path.push(&class.name);
        for member in class.members() {
            if let Some(inner) = member.ty.class_name().and_then(|n| program.class(n)) {
                visit(program, inner, path, done)?;
            }
        }
        path.pop();
        done.insert(&class.name);
        Ok(())
    }

    let mut done = HashSet::new();
    for class in &program.classes {
        visit(program, class, &mut Vec::new(), &mut done)?;
    }
    Ok(())
}

fn resolve_class(class: &mut ClassModel, sigs: &Signatures) -> Result<(), ModelError> {
    let ClassModel {
        name,
        methods,
        invariants,
        ..
    } = class;

    let scope = Scope {
        sigs,
        class: name,
        frame: None,
        mode: Mode::Invariant,
    };
    for inv in invariants.iter_mut() {
        resolve_contract(inv, &scope)?;
    }

    for method in methods.iter_mut() {
        resolve_method(method, name, sigs)?;
    }
    Ok(())
}

fn resolve_method(method: &mut Method, class: &str, sigs: &Signatures) -> Result<(), ModelError> {
    let Method {
        name,
        params,
        locals,
        body,
        requires,
        ensures,
        return_type,
        ..
    } = method;

    let mut scope = Scope {
        sigs,
        class,
        frame: Some(Frame {
            name,
            params,
            locals,
            ret: return_type,
        }),
        mode: Mode::Require,
    };
    for req in requires.iter_mut() {
        resolve_contract(req, &scope)?;
    }
    scope.mode = Mode::Ensure;
    for ens in ensures.iter_mut() {
        resolve_contract(ens, &scope)?;
    }
    scope.mode = Mode::Body;
    for stmt in body.iter_mut() {
        resolve_stmt(stmt, &scope)?;
    }
    Ok(())
}

fn resolve_contract(contract: &mut Contract, scope: &Scope<'_>) -> Result<(), ModelError> {
    let loc = contract.loc.or(contract.expr.loc);
    let ty = resolve_expr(&mut contract.expr, scope)?;
    if ty != Type::Bool {
        return Err(scope.error(format!("contract `{}` is {ty}, expected bool", contract.text()), loc));
    }
    Ok(())
}

fn resolve_stmt(stmt: &mut Stmt, scope: &Scope<'_>) -> Result<(), ModelError> {
    let ret = scope.frame.as_ref().map(|f| f.ret).unwrap_or(&Type::Void);
    match stmt {
        Stmt::Assign { target, value, loc } => {
            let target_ty = resolve_place(target, scope, *loc)?;
            if target.scope == VarScope::Result {
                return Err(scope.error(format!("`{RESULT}` cannot be assigned"), *loc));
            }
            if let Some(class) = target_ty.class_name() {
                let source = resolve_object_source(value, scope)?;
                if source.class_name() != Some(class) {
                    return Err(scope.error(
                        format!("cannot assign {source} to `{target}` of type {class}"),
                        *loc,
                    ));
                }
            } else {
                let value_ty = resolve_expr(value, scope)?;
                if !target_ty.accepts(&value_ty) {
                    return Err(scope.error(
                        format!("cannot assign {value_ty} to `{target}` of type {target_ty}"),
                        *loc,
                    ));
                }
            }
        }
        Stmt::If {
            cond,
            then_branch,
            else_branch,
            loc,
        } => {
            let ty = resolve_expr(cond, scope)?;
            if ty != Type::Bool {
                return Err(scope.error(format!("condition `{cond}` is {ty}, expected bool"), *loc));
            }
            for s in then_branch.iter_mut().chain(else_branch.iter_mut()) {
                resolve_stmt(s, scope)?;
            }
        }
        Stmt::Call { call, loc } => {
            resolve_call(call, scope, true, *loc)?;
        }
        Stmt::Return { value, loc } => match (value, ret) {
            (None, Type::Void) => {}
            (Some(_), Type::Void) => {
                return Err(scope.error("void method returns a value", *loc));
            }
            (None, ret) => {
                return Err(scope.error(format!("missing return value of type {ret}"), *loc));
            }
            (Some(value), ret) => {
                let ty = resolve_expr(value, scope)?;
                if !ret.accepts(&ty) {
                    return Err(scope.error(format!("returns {ty}, expected {ret}"), *loc));
                }
            }
        },
    }
    Ok(())
}

/// `new C()` or another object place; the only forms an object slot accepts.
fn resolve_object_source(value: &mut Expr, scope: &Scope<'_>) -> Result<Type, ModelError> {
    let loc = value.loc;
    let ty = match &mut value.kind {
        ExprKind::New { class } => {
            if scope.sig(class).is_none() {
                return Err(scope.error(format!("unknown class `{class}`"), loc));
            }
            Type::Class(class.clone())
        }
        ExprKind::Place(place) => resolve_place(place, scope, loc)?,
        _ => {
            return Err(scope.error(
                format!("`{value}` is not an object; expected `new` or an object reference"),
                loc,
            ));
        }
    };
    value.ty = ty.clone();
    Ok(ty)
}

fn resolve_place(place: &mut Place, scope: &Scope<'_>, loc: Option<Location>) -> Result<Type, ModelError> {
    if place.path.is_empty() || place.path.iter().any(String::is_empty) {
        return Err(scope.error(format!("malformed name `{place}`"), loc));
    }
    let root = place.root().to_string();

    let frame = scope.frame.as_ref().filter(|_| scope.mode != Mode::Invariant);

    let (mut ty, kind) = if root == RESULT
        && scope.mode == Mode::Ensure
        && frame.is_some_and(|f| *f.ret != Type::Void)
    {
        (frame.map(|f| f.ret.clone()).unwrap_or_default(), VarScope::Result)
    } else if let Some(found) = frame.and_then(|f| f.lookup(&root)) {
        found
    } else if let Some((ty, kind)) = scope.sig(scope.class).and_then(|s| s.member(&root)) {
        (ty.clone(), kind)
    } else if root == RESULT {
        return Err(scope.error(
            format!("`{RESULT}` is only available in `ensure` of a non-void method"),
            loc,
        ));
    } else {
        return Err(scope.error(format!("unknown name `{root}`"), loc));
    };

    for segment in place.members() {
        let Some(class) = ty.class_name() else {
            return Err(scope.error(format!("`{place}`: {ty} has no member `{segment}`"), loc));
        };
        let Some((member_ty, _)) = scope.sig(class).and_then(|s| s.member(segment)) else {
            return Err(scope.error(format!("`{place}`: class {class} has no member `{segment}`"), loc));
        };
        ty = member_ty.clone();
    }

    place.scope = kind;
    Ok(ty)
}

impl Frame<'_> {
    fn lookup(&self, name: &str) -> Option<(Type, VarScope)> {
        self.params
            .iter()
            .find(|v| v.name == name)
            .map(|v| (v.ty.clone(), VarScope::Parameter))
            .or_else(|| {
                self.locals
                    .iter()
                    .find(|v| v.name == name)
                    .map(|v| (v.ty.clone(), VarScope::Local))
            })
    }
}

fn resolve_expr(expr: &mut Expr, scope: &Scope<'_>) -> Result<Type, ModelError> {
    let loc = expr.loc;
    let ty = match &mut expr.kind {
        ExprKind::Literal(lit) => {
            if let Literal::Float(x) = lit {
                if !x.is_finite() {
                    return Err(scope.error("floating-point literal is not finite", loc));
                }
            }
            lit.ty()
        }
        ExprKind::Place(place) => {
            let ty = resolve_place(place, scope, loc)?;
            if !ty.is_scalar() {
                return Err(scope.error(format!("object `{place}` used as a value"), loc));
            }
            ty
        }
        ExprKind::Arith { op, lhs, rhs } => {
            let l = resolve_expr(lhs, scope)?;
            let r = resolve_expr(rhs, scope)?;
            if !l.is_numeric() || !r.is_numeric() {
                return Err(scope.error(format!("`{}` needs numeric operands, got {l} and {r}", op.symbol()), loc));
            }
            let ty = if l == Type::Float || r == Type::Float {
                Type::Float
            } else {
                Type::Int
            };
            if *op == ArithOp::Mod && ty == Type::Float {
                return Err(scope.error("`%` on double operands is not supported", loc));
            }
            ty
        }
        ExprKind::UnaryArith { op, operand } => {
            let ty = resolve_expr(operand, scope)?;
            if !ty.is_numeric() {
                return Err(scope.error(format!("`{}` needs a numeric operand, got {ty}", op.symbol()), loc));
            }
            ty
        }
        ExprKind::Compare { op, lhs, rhs } => {
            let l = resolve_expr(lhs, scope)?;
            let r = resolve_expr(rhs, scope)?;
            if !l.is_numeric() || !r.is_numeric() {
                return Err(scope.error(format!("`{}` needs numeric operands, got {l} and {r}", op.symbol()), loc));
            }
            Type::Bool
        }
        ExprKind::Equality { op, lhs, rhs } => {
            let l = resolve_expr(lhs, scope)?;
            let r = resolve_expr(rhs, scope)?;
            if !((l.is_numeric() && r.is_numeric()) || (l == Type::Bool && r == Type::Bool)) {
                return Err(scope.error(format!("`{}` cannot compare {l} with {r}", op.symbol()), loc));
            }
            Type::Bool
        }
        ExprKind::Logical { op, lhs, rhs } => {
            let l = resolve_expr(lhs, scope)?;
            let r = resolve_expr(rhs, scope)?;
            if l != Type::Bool || r != Type::Bool {
                return Err(scope.error(format!("`{}` needs bool operands, got {l} and {r}", op.symbol()), loc));
            }
            Type::Bool
        }
        ExprKind::Not(inner) => {
            let ty = resolve_expr(inner, scope)?;
            if ty != Type::Bool {
                return Err(scope.error(format!("`!` needs a bool operand, got {ty}"), loc));
            }
            Type::Bool
        }
        ExprKind::Paren(inner) => resolve_expr(inner, scope)?,
        ExprKind::Call(call) => resolve_call(call, scope, false, loc)?,
        ExprKind::New { class } => {
            return Err(scope.error(
                format!("`new {class}()` is only allowed as the whole right-hand side of an assignment"),
                loc,
            ));
        }
    };
    expr.ty = ty.clone();
    Ok(ty)
}

fn resolve_call(
    call: &mut CallExpr,
    scope: &Scope<'_>,
    allow_void: bool,
    loc: Option<Location>,
) -> Result<Type, ModelError> {
    if scope.mode == Mode::Invariant {
        return Err(scope.error(format!("invariants cannot call `{}`", call.method), loc));
    }
    let class = match &mut call.receiver {
        Some(receiver) => {
            let ty = resolve_place(receiver, scope, loc)?;
            match ty {
                Type::Class(class) => class,
                other => {
                    return Err(scope.error(format!("`{receiver}` is {other}, not an object"), loc));
                }
            }
        }
        None => scope.class.to_string(),
    };
    let Some(sig) = scope.sig(&class).and_then(|s| s.method(&call.method)) else {
        return Err(scope.error(format!("class {class} has no method `{}`", call.method), loc));
    };
    if call.receiver.is_some() && sig.access == Access::Private && class != scope.class {
        return Err(scope.error(format!("`{class}.{}` is private", call.method), loc));
    }
    if sig.params.len() != call.args.len() {
        return Err(scope.error(
            format!(
                "`{}` takes {} argument(s), {} given",
                call.method,
                sig.params.len(),
                call.args.len()
            ),
            loc,
        ));
    }
    for (arg, param_ty) in call.args.iter_mut().zip(&sig.params) {
        let arg_ty = if param_ty.class_name().is_some() {
            if !matches!(arg.kind, ExprKind::Place(_)) {
                return Err(scope.error(
                    format!("argument `{arg}` must be an object reference of type {param_ty}"),
                    loc,
                ));
            }
            resolve_object_source(arg, scope)?
        } else {
            resolve_expr(arg, scope)?
        };
        if !param_ty.accepts(&arg_ty) {
            return Err(scope.error(
                format!("argument `{arg}` of `{}` is {arg_ty}, expected {param_ty}", call.method),
                loc,
            ));
        }
    }
    if sig.ret == Type::Void && !allow_void {
        return Err(scope.error(format!("void method `{}` used as a value", call.method), loc));
    }
    Ok(sig.ret.clone())
}
