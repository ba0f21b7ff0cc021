#![forbid(unsafe_code)]

use std::fmt;

use covenant_model::Location;
use serde::Serialize;

use crate::solver::Model;

/// Context of a contract that can fail, with the call sequence that fails it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Violation {
    pub class: String,
    /// Method owning the clause or the offending expression; `None` for invariants.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<Location>,
    pub text: String,
    pub sequence: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<Model>,
}

impl Violation {
    pub fn new(class: impl Into<String>, method: Option<&str>, loc: Option<Location>, text: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: method.map(str::to_string),
            loc,
            text: text.into(),
            sequence: Vec::new(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: Option<Model>) -> Self {
        self.model = model;
        self
    }
}

/// Outcome of one verification run.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationResult {
    Success {
        class: String,
        max_depth: usize,
        sequences: usize,
    },
    InvariantError(Violation),
    RequireError(Violation),
    EnsureError(Violation),
    AssumeError(Violation),
    /// Inconclusive: the time budget ran out or the solver gave up.
    Timeout {
        class: String,
        reason: String,
        sequences: usize,
    },
}

impl VerificationResult {
    pub fn class(&self) -> &str {
        match self {
            VerificationResult::Success { class, .. } | VerificationResult::Timeout { class, .. } => class,
            VerificationResult::InvariantError(v)
            | VerificationResult::RequireError(v)
            | VerificationResult::EnsureError(v)
            | VerificationResult::AssumeError(v) => &v.class,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, VerificationResult::Success { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, VerificationResult::Timeout { .. })
    }

    pub fn violation(&self) -> Option<&Violation> {
        match self {
            VerificationResult::InvariantError(v)
            | VerificationResult::RequireError(v)
            | VerificationResult::EnsureError(v)
            | VerificationResult::AssumeError(v) => Some(v),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            VerificationResult::Success { .. } => "Success",
            VerificationResult::InvariantError(_) => "InvariantError",
            VerificationResult::RequireError(_) => "RequireError",
            VerificationResult::EnsureError(_) => "EnsureError",
            VerificationResult::AssumeError(_) => "AssumeError",
            VerificationResult::Timeout { .. } => "Timeout",
        }
    }

    pub fn summary(&self) -> String {
        match self {
            VerificationResult::Success {
                max_depth,
                sequences,
                ..
            } => format!("verified every call sequence up to length {max_depth} ({sequences} sequences)"),
            VerificationResult::Timeout { reason, .. } => format!("inconclusive: {reason}"),
            VerificationResult::InvariantError(v) => format!("invariant `{}` can be violated", v.text),
            VerificationResult::RequireError(v) => match &v.method {
                Some(m) => format!("precondition `{}` of {m} can be violated", v.text),
                None => format!("precondition `{}` can be violated", v.text),
            },
            VerificationResult::EnsureError(v) => match &v.method {
                Some(m) => format!("postcondition `{}` of {m} can be violated", v.text),
                None => format!("postcondition `{}` can be violated", v.text),
            },
            VerificationResult::AssumeError(v) => format!("`{}` may divide by zero", v.text),
        }
    }

    pub(crate) fn with_sequence(mut self, methods: &[&str]) -> Self {
        match &mut self {
            VerificationResult::InvariantError(v)
            | VerificationResult::RequireError(v)
            | VerificationResult::EnsureError(v)
            | VerificationResult::AssumeError(v) => {
                v.sequence = methods.iter().map(|m| m.to_string()).collect();
            }
            VerificationResult::Success { .. } | VerificationResult::Timeout { .. } => {}
        }
        self
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.class(), self.kind(), self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_outcome_tag() {
        let mut v = Violation::new("Counter", None, Some(Location::new(2, 5)), "X == 0");
        v.sequence = vec!["Step".into()];
        let json = serde_json::to_value(VerificationResult::InvariantError(v)).unwrap();
        assert_eq!(json["outcome"], "invariant_error");
        assert_eq!(json["class"], "Counter");
        assert_eq!(json["sequence"][0], "Step");
        assert!(json.get("method").is_none());
    }
}
