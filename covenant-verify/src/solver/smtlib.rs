#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write as _;
use std::process::{Command, Stdio};

use super::{Backend, Model, SatResult, Solver, SolverError};
use crate::config::SolverConfig;
use crate::term::{Sort, Term, quote_symbol};

/// Runs an SMT-LIB2 solver executable (`z3 -in -smt2` by default) once per
/// satisfiability check, replaying the session's live assertions.
#[derive(Clone, Debug, Default)]
pub struct SmtLibBackend {
    config: SolverConfig,
}

impl SmtLibBackend {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.config.path = path.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Whether the configured executable can be started.
    pub fn is_available(&self) -> bool {
        Command::new(&self.config.path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl Backend for SmtLibBackend {
    fn name(&self) -> &str {
        &self.config.path
    }

    fn session(&self) -> Result<Box<dyn Solver + '_>, SolverError> {
        Ok(Box::new(SmtLibSession::new(&self.config)))
    }
}

pub(crate) struct SmtLibSession<'a> {
    config: &'a SolverConfig,
    /// Declarations are global; pop never removes them.
    declarations: BTreeMap<String, Sort>,
    assertions: Vec<String>,
    frames: Vec<usize>,
    last: Option<SatResult>,
}

impl<'a> SmtLibSession<'a> {
    pub(crate) fn new(config: &'a SolverConfig) -> Self {
        Self {
            config,
            declarations: BTreeMap::new(),
            assertions: Vec::new(),
            frames: Vec::new(),
            last: None,
        }
    }

    pub(crate) fn script(&self, with_model: bool) -> String {
        let mut out = String::new();
        if with_model {
            out.push_str("(set-option :produce-models true)\n");
        }
        for (name, sort) in &self.declarations {
            let _ = writeln!(out, "(declare-const {} {})", quote_symbol(name), sort.smt_name());
        }
        for assertion in &self.assertions {
            let _ = writeln!(out, "(assert {assertion})");
        }
        out.push_str("(check-sat)\n");
        if with_model {
            out.push_str("(get-model)\n");
        }
        out
    }

    fn run(&self, script: &str) -> Result<String, SolverError> {
        let path = &self.config.path;
        let mut cmd = Command::new(path);
        cmd.args(["-in", "-smt2", "smt.random_seed=0"]);
        if let Some(ms) = self.config.timeout_ms {
            cmd.arg(format!("-t:{ms}"));
        }
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SolverError::Spawn {
                path: path.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(script.as_bytes())
                .map_err(|source| SolverError::Spawn {
                    path: path.clone(),
                    source,
                })?;
        }
        let output = child.wait_with_output().map_err(|source| SolverError::Spawn {
            path: path.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SolverError::Solver(format!(
                "no output (exit status {}): {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(stdout)
    }
}

fn parse_answer(stdout: &str) -> Result<SatResult, SolverError> {
    let first = stdout.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    match first {
        "sat" => Ok(SatResult::Sat),
        "unsat" => Ok(SatResult::Unsat),
        "unknown" => Ok(SatResult::Unknown("solver returned unknown".to_string())),
        "timeout" => Ok(SatResult::Unknown("solver timed out".to_string())),
        other if other.starts_with("(error") => Err(SolverError::Solver(other.to_string())),
        other => Err(SolverError::Protocol(other.to_string())),
    }
}

impl Solver for SmtLibSession<'_> {
    fn assert(&mut self, term: &Term) -> Result<(), SolverError> {
        term.collect_symbols(&mut self.declarations);
        self.assertions.push(term.to_string());
        self.last = None;
        Ok(())
    }

    fn push(&mut self) -> Result<(), SolverError> {
        self.frames.push(self.assertions.len());
        Ok(())
    }

    fn pop(&mut self) -> Result<(), SolverError> {
        let len = self.frames.pop().ok_or(SolverError::Unbalanced)?;
        self.assertions.truncate(len);
        self.last = None;
        Ok(())
    }

    fn check(&mut self) -> Result<SatResult, SolverError> {
        let answer = parse_answer(&self.run(&self.script(false))?)?;
        self.last = Some(answer.clone());
        Ok(answer)
    }

    fn model(&mut self) -> Result<Option<Model>, SolverError> {
        if self.last != Some(SatResult::Sat) {
            return Ok(None);
        }
        let stdout = self.run(&self.script(true))?;
        if parse_answer(&stdout)? != SatResult::Sat {
            return Ok(None);
        }
        let body = stdout.trim_start().strip_prefix("sat").unwrap_or(&stdout);
        Ok(Some(parse_model(body)?))
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Sexp {
    Atom(String),
    List(Vec<Sexp>),
}

impl Sexp {
    /// Solver values rendered the way a reader expects: `-3`, `1/2`.
    fn value_text(&self) -> String {
        match self {
            Sexp::Atom(a) => a.clone(),
            Sexp::List(items) => match items.as_slice() {
                [Sexp::Atom(op), x] if op == "-" => format!("-{}", x.value_text()),
                [Sexp::Atom(op), a, b] if op == "/" => {
                    format!("{}/{}", a.value_text(), b.value_text())
                }
                _ => self.to_smt(),
            },
        }
    }

    fn to_smt(&self) -> String {
        match self {
            Sexp::Atom(a) => a.clone(),
            Sexp::List(items) => {
                let inner: Vec<String> = items.iter().map(Sexp::to_smt).collect();
                format!("({})", inner.join(" "))
            }
        }
    }
}

fn tokenize(src: &str) -> Result<Vec<String>, SolverError> {
    let mut tokens = Vec::new();
    let mut chars = src.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '(' | ')' => {
                tokens.push(c.to_string());
                chars.next();
            }
            '|' => {
                chars.next();
                let mut sym = String::new();
                loop {
                    match chars.next() {
                        Some('|') => break,
                        Some(ch) => sym.push(ch),
                        None => return Err(SolverError::Protocol("unterminated |symbol|".into())),
                    }
                }
                tokens.push(sym);
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            _ => {
                let mut atom = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || ch == '(' || ch == ')' {
                        break;
                    }
                    atom.push(ch);
                    chars.next();
                }
                tokens.push(atom);
            }
        }
    }
    Ok(tokens)
}

fn parse_sexps(tokens: &[String]) -> Result<Vec<Sexp>, SolverError> {
    let mut stack: Vec<Vec<Sexp>> = vec![Vec::new()];
    for tok in tokens {
        match tok.as_str() {
            "(" => stack.push(Vec::new()),
            ")" => {
                let list = stack
                    .pop()
                    .filter(|_| !stack.is_empty())
                    .ok_or_else(|| SolverError::Protocol("unbalanced ')' in model".into()))?;
                if let Some(parent) = stack.last_mut() {
                    parent.push(Sexp::List(list));
                }
            }
            atom => {
                if let Some(top) = stack.last_mut() {
                    top.push(Sexp::Atom(atom.to_string()));
                }
            }
        }
    }
    match (stack.pop(), stack.is_empty()) {
        (Some(top), true) => Ok(top),
        _ => Err(SolverError::Protocol("unbalanced '(' in model".into())),
    }
}

/// Reads the constant definitions out of a `(get-model)` response:
/// `(define-fun x_0 () Int (- 3))`.
pub(crate) fn parse_model(src: &str) -> Result<Model, SolverError> {
    let mut assignments = Vec::new();
    for sexp in parse_sexps(&tokenize(src)?)? {
        let Sexp::List(items) = sexp else { continue };
        // Older z3 releases wrap the definitions in `(model ...)`.
        let defs = match items.first() {
            Some(Sexp::Atom(head)) if head == "model" => items[1..].to_vec(),
            _ => items,
        };
        for def in defs {
            if let Sexp::List(parts) = def {
                if let [Sexp::Atom(kw), Sexp::Atom(name), Sexp::List(args), _sort, value] =
                    parts.as_slice()
                {
                    if kw == "define-fun" && args.is_empty() {
                        assignments.push((name.clone(), value.value_text()));
                    }
                }
            }
        }
    }
    assignments.sort();
    Ok(Model { assignments })
}
