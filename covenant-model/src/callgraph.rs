#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use crate::class::{ClassModel, Method};

/// Intra-class call edges (calls without a receiver), in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallGraph {
    edges: Vec<(String, Vec<String>)>,
}

impl CallGraph {
    pub fn of(class: &ClassModel) -> Self {
        let edges = class
            .methods
            .iter()
            .map(|m| (m.name.clone(), direct_callees(m)))
            .collect();
        Self { edges }
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.edges.iter().map(|(m, _)| m.as_str())
    }

    pub fn callees(&self, method: &str) -> &[String] {
        self.edges
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, callees)| callees.as_slice())
            .unwrap_or_default()
    }

    /// Whether `method` can reach itself through intra-class calls.
    pub fn is_recursive(&self, method: &str) -> bool {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = self.callees(method).iter().map(String::as_str).collect();
        while let Some(next) = stack.pop() {
            if next == method {
                return true;
            }
            if seen.insert(next) {
                stack.extend(self.callees(next).iter().map(String::as_str));
            }
        }
        false
    }

    pub fn recursive_methods(&self) -> Vec<&str> {
        self.methods().filter(|m| self.is_recursive(m)).collect()
    }
}

fn direct_callees(method: &Method) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let calls = method
        .body
        .iter()
        .flat_map(|s| s.calls())
        .chain(method.requires.iter().flat_map(|c| c.expr.calls()))
        .chain(method.ensures.iter().flat_map(|c| c.expr.calls()));
    for call in calls {
        if call.receiver.is_none() && !out.contains(&call.method) {
            out.push(call.method.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ClassBuilder, MethodBuilder};
    use crate::{CallExpr, Expr, Stmt};

    #[test]
    fn detects_mutual_recursion_only_on_the_cycle() {
        let class = ClassBuilder::new("C")
            .method(
                MethodBuilder::new("Even")
                    .stmt(Stmt::call(CallExpr::new("Odd", vec![])))
                    .build(),
            )
            .method(
                MethodBuilder::new("Odd")
                    .stmt(Stmt::if_then(
                        Expr::bool(true),
                        vec![Stmt::call(CallExpr::new("Even", vec![]))],
                    ))
                    .build(),
            )
            .method(
                MethodBuilder::new("Entry")
                    .stmt(Stmt::call(CallExpr::new("Even", vec![])))
                    .build(),
            )
            .build();

        let graph = CallGraph::of(&class);
        assert_eq!(graph.callees("Entry"), ["Even".to_string()]);
        assert!(graph.is_recursive("Even"));
        assert!(graph.is_recursive("Odd"));
        assert!(!graph.is_recursive("Entry"));
        assert_eq!(graph.recursive_methods(), ["Even", "Odd"]);
    }

    #[test]
    fn calls_on_other_objects_are_not_edges() {
        let class = ClassBuilder::new("C")
            .method(
                MethodBuilder::new("M")
                    .stmt(Stmt::call(CallExpr::on("acc", "M", vec![])))
                    .build(),
            )
            .build();
        assert!(!CallGraph::of(&class).is_recursive("M"));
    }
}
