#![forbid(unsafe_code)]

//! Lookup scopes. A [`Frame`] turns a resolved [`Place`] into the alias-table
//! key of the variable it denotes, and re-roots lookups when a method is
//! called on another object.

use std::collections::BTreeSet;

use covenant_model::{ClassModel, Literal, Method, Place, Program, RESULT, Stmt, Type, VarScope};

use crate::error::VerifyError;
use crate::term::Sort;

pub fn sort_of(ty: &Type) -> Option<Sort> {
    match ty {
        Type::Bool => Some(Sort::Bool),
        Type::Int => Some(Sort::Int),
        Type::Float => Some(Sort::Real),
        _ => None,
    }
}

#[derive(Clone, Debug)]
pub struct Frame<'p> {
    pub class: &'p ClassModel,
    pub method: Option<&'p Method>,
    /// Key prefix of the receiver object: empty for the class under verification.
    pub receiver: String,
    /// `Method::`, or `Method#n::` for the n-th nested activation of the same method.
    pub locals: String,
}

impl<'p> Frame<'p> {
    /// Scope of the class under verification, outside any method (invariants).
    pub fn object(class: &'p ClassModel) -> Self {
        Self {
            class,
            method: None,
            receiver: String::new(),
            locals: String::new(),
        }
    }

    pub fn activation(class: &'p ClassModel, method: &'p Method, receiver: String, nth: usize) -> Self {
        let locals = if nth == 0 {
            format!("{}::", method.name)
        } else {
            format!("{}#{nth}::", method.name)
        };
        Self {
            class,
            method: Some(method),
            receiver,
            locals,
        }
    }

    pub fn method_name(&self) -> Option<&'p str> {
        self.method.map(|m| m.name.as_str())
    }

    pub fn key(&self, place: &Place) -> Result<String, VerifyError> {
        let path = place.path.join(".");
        match place.scope {
            VarScope::Field | VarScope::Property => Ok(format!("{}{path}", self.receiver)),
            VarScope::Parameter | VarScope::Local => Ok(format!("{}{}{path}", self.receiver, self.locals)),
            VarScope::Result => Ok(self.result_key()),
            VarScope::Unresolved => Err(VerifyError::Unresolved(place.to_string())),
        }
    }

    pub fn result_key(&self) -> String {
        format!("{}{}{RESULT}", self.receiver, self.locals)
    }

    pub fn param_key(&self, name: &str) -> String {
        format!("{}{}{name}", self.receiver, self.locals)
    }

    /// Static type of a resolved place, walking member chains through `program`.
    pub fn place_type(&self, program: &Program, place: &Place) -> Result<Type, VerifyError> {
        let root = place.root();
        let method = self.method;
        let root_ty = match place.scope {
            VarScope::Field | VarScope::Property => self.class.member(root).map(|(m, _)| m.ty.clone()),
            VarScope::Parameter => method.and_then(|m| m.param(root)).map(|v| v.ty.clone()),
            VarScope::Local => method.and_then(|m| m.local(root)).map(|v| v.ty.clone()),
            VarScope::Result => method.map(|m| m.return_type.clone()),
            VarScope::Unresolved => None,
        };
        let mut ty = root_ty.ok_or_else(|| VerifyError::Unresolved(place.to_string()))?;
        for segment in place.members() {
            ty = ty
                .class_name()
                .and_then(|c| program.class(c))
                .and_then(|c| c.member(segment))
                .map(|(m, _)| m.ty.clone())
                .ok_or_else(|| VerifyError::Unresolved(place.to_string()))?;
        }
        Ok(ty)
    }
}

/// Scalar members reachable from an instance of `class`, as dotted suffixes
/// with their initial values, fields before properties.
pub fn leaves(program: &Program, class: &str) -> Result<Vec<(String, Type, Literal)>, VerifyError> {
    let model = program
        .class(class)
        .ok_or_else(|| VerifyError::UnknownClass(class.to_string()))?;
    let mut out = Vec::new();
    for member in model.members() {
        match &member.ty {
            Type::Class(inner) => {
                for (suffix, ty, init) in leaves(program, inner)? {
                    out.push((format!("{}.{suffix}", member.name), ty, init));
                }
            }
            ty => {
                let init = member
                    .initial_value()
                    .ok_or_else(|| VerifyError::Unresolved(format!("{class}.{}", member.name)))?;
                out.push((member.name.clone(), ty.clone(), init));
            }
        }
    }
    Ok(out)
}

/// Member suffixes (relative to the receiver) that `method` may assign,
/// including through calls on `this` and on object members.
pub fn written_members(program: &Program, class: &ClassModel, method: &Method) -> Result<BTreeSet<String>, VerifyError> {
    let mut out = BTreeSet::new();
    let mut seen = BTreeSet::new();
    collect_writes(program, class, method, "", &mut seen, &mut out)?;
    Ok(out)
}

fn collect_writes(
    program: &Program,
    class: &ClassModel,
    method: &Method,
    prefix: &str,
    seen: &mut BTreeSet<(String, String)>,
    out: &mut BTreeSet<String>,
) -> Result<(), VerifyError> {
    if !seen.insert((format!("{prefix}{}", class.name), method.name.clone())) {
        return Ok(());
    }
    let frame = Frame::activation(class, method, String::new(), 0);
    let mut stack: Vec<&Stmt> = method.body.iter().collect();
    while let Some(stmt) = stack.pop() {
        if let Stmt::Assign { target, .. } = stmt {
            if target.scope.is_member() {
                let path = target.path.join(".");
                match frame.place_type(program, target)? {
                    Type::Class(inner) => {
                        for (suffix, _, _) in leaves(program, &inner)? {
                            out.insert(format!("{prefix}{path}.{suffix}"));
                        }
                    }
                    _ => {
                        out.insert(format!("{prefix}{path}"));
                    }
                }
            }
        }
        let calls = match stmt {
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                stack.extend(then_branch.iter().chain(else_branch));
                cond.calls()
            }
            _ => stmt.calls(),
        };
        for call in calls {
            match &call.receiver {
                None => {
                    if let Some(callee) = class.method(&call.method) {
                        collect_writes(program, class, callee, prefix, seen, out)?;
                    }
                }
                Some(receiver) if receiver.scope.is_member() => {
                    let ty = frame.place_type(program, receiver)?;
                    let target = ty
                        .class_name()
                        .and_then(|c| program.class(c))
                        .ok_or_else(|| VerifyError::Unresolved(receiver.to_string()))?;
                    if let Some(callee) = target.method(&call.method) {
                        let nested = format!("{prefix}{}.", receiver.path.join("."));
                        collect_writes(program, target, callee, &nested, seen, out)?;
                    }
                }
                // Calls on parameters or locals mutate a copy.
                Some(_) => {}
            }
        }
    }
    Ok(())
}
