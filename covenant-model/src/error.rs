#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

use crate::types::Location;

/// A model that violates the front-end contract: unresolved names, ill-typed
/// expressions or constructs the verifier does not support.
#[derive(Debug, Error, Diagnostic)]
#[error("model error in {context}: {message}")]
#[diagnostic(code(covenant::model))]
#[allow(unused_assignments)]
pub struct ModelError {
    /// `Class` or `Class.Method`.
    pub context: String,
    pub message: String,
    pub loc: Option<Location>,
    #[help]
    pub help: Option<String>,
}

impl ModelError {
    pub fn new(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            message: message.into(),
            loc: None,
            help: None,
        }
    }

    pub fn at(mut self, loc: Option<Location>) -> Self {
        self.loc = loc;
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}
