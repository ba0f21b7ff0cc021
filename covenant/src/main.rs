#![forbid(unsafe_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use covenant_model::{CallGraph, Program};
use covenant_verify::{
    FacadeLog, SmtLibBackend, SolverConfig, VerificationResult, VerifyConfig, VerifyError,
    verify_class, verify_program,
};

mod config;
mod report;

#[derive(Parser, Debug)]
#[command(name = "covenant", version, about = "Bounded model checker for contract-annotated classes")]
struct Cli {
    /// Log exploration progress (debug level). `RUST_LOG` overrides.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Load and resolve a model, reporting model errors
    Check {
        /// Input model (.json)
        path: PathBuf,
    },

    /// Explore call sequences and check every contract
    Verify {
        /// Input model (.json)
        path: PathBuf,

        /// Verify a single class (default: every class)
        #[arg(long)]
        class: Option<String>,

        /// Longest call sequence explored. Overrides `covenant.toml`.
        #[arg(long)]
        depth: Option<usize>,

        /// Wall-clock budget per class, in milliseconds
        #[arg(long = "timeout-ms")]
        timeout_ms: Option<u64>,

        /// Nested calls inlined before a callee is replaced by its contract
        #[arg(long = "inline-depth")]
        inline_depth: Option<usize>,

        /// SMT-LIB2 solver executable
        #[arg(long)]
        solver: Option<String>,

        /// Use the in-process Z3 (requires the `z3` feature)
        #[arg(long, default_value_t = false)]
        in_process: bool,

        /// Explicit config file instead of the nearest `covenant.toml`
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print a JSON report on stdout
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the intra-class call graph and flag recursive methods
    Graph {
        /// Input model (.json)
        path: PathBuf,

        #[arg(long)]
        class: String,
    },
}

#[derive(Debug, Error, miette::Diagnostic)]
#[error("invalid model: {message}")]
#[diagnostic(code(covenant::load))]
#[allow(unused_assignments)]
struct LoadError {
    message: String,
    #[source_code]
    src: NamedSource<String>,
    #[label("here")]
    span: Option<SourceSpan>,
}

type Outcomes = Vec<(String, Result<VerificationResult, VerifyError>)>;

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let json = matches!(cli.cmd, Cmd::Verify { json: true, .. });
    if !json {
        let level = if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        };
        env_logger::Builder::new()
            .filter_module("covenant", level)
            .filter_module("covenant_verify", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_target(false)
            .init();
    }

    match cli.cmd {
        Cmd::Check { path } => {
            let program = load_program(&path)?;
            for class in &program.classes {
                println!(
                    "{}: {} members, {} methods, {} invariants",
                    class.name,
                    class.members().count(),
                    class.methods.len(),
                    class.invariants.len()
                );
            }
            Ok(())
        }
        Cmd::Verify {
            path,
            class,
            depth,
            timeout_ms,
            inline_depth,
            solver,
            in_process,
            config: config_path,
            json,
        } => {
            let program = load_program(&path)?;
            let (file, origin) = config::load(config_path.as_deref(), &path).map_err(miette::Report::new)?;
            if let Some(origin) = &origin {
                log::debug!("using {}", display_path(origin));
            }

            let mut verify = file.verify;
            if let Some(d) = depth {
                verify.max_depth = d;
            }
            if let Some(ms) = timeout_ms {
                verify.max_duration = std::time::Duration::from_millis(ms);
            }
            if let Some(d) = inline_depth {
                verify.inline_depth = d;
            }
            let mut solver_cfg = file.solver;
            if let Some(s) = solver {
                solver_cfg.path = s;
            }

            let classes: Vec<String> = match class {
                Some(c) => vec![c],
                None => program.classes.iter().map(|c| c.name.clone()).collect(),
            };
            let outcomes = if in_process {
                run_in_process(&program, &classes, &verify, &solver_cfg)?
            } else {
                run_external(&program, &classes, &verify, solver_cfg)?
            };

            if json {
                let report = report::VerifyReport::new(display_path(&path), &outcomes);
                println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
            } else {
                print_outcomes(&outcomes);
            }

            let failed = outcomes
                .iter()
                .filter(|(_, r)| !r.as_ref().is_ok_and(VerificationResult::is_success))
                .count();
            if failed > 0 {
                return Err(miette::miette!(
                    "{failed} of {} classes did not verify",
                    outcomes.len()
                ));
            }
            Ok(())
        }
        Cmd::Graph { path, class } => {
            let program = load_program(&path)?;
            let model = program
                .class(&class)
                .ok_or_else(|| miette::miette!("unknown class `{class}`"))?;
            let graph = CallGraph::of(model);
            for method in graph.methods() {
                let callees = graph.callees(method);
                let targets = if callees.is_empty() {
                    "-".to_string()
                } else {
                    callees.join(", ")
                };
                let marker = if graph.is_recursive(method) { "  (recursive)" } else { "" };
                println!("{method} -> {targets}{marker}");
            }
            Ok(())
        }
    }
}

fn load_program(path: &Path) -> miette::Result<Program> {
    let src = fs::read_to_string(path).into_diagnostic()?;
    let mut program: Program = serde_json::from_str(&src).map_err(|e| {
        let span = offset_of(&src, e.line(), e.column()).map(|o| SourceSpan::from((o, 1)));
        LoadError {
            message: e.to_string(),
            src: NamedSource::new(display_path(path), src.clone()),
            span,
        }
    })?;
    program.resolve().map_err(miette::Report::new)?;
    Ok(program)
}

/// Byte offset of a 1-based line/column pair.
fn offset_of(src: &str, line: usize, column: usize) -> Option<usize> {
    if line == 0 {
        return None;
    }
    let start: usize = src.split_inclusive('\n').take(line - 1).map(str::len).sum();
    Some((start + column.saturating_sub(1)).min(src.len().saturating_sub(1)))
}

fn run_external(
    program: &Program,
    classes: &[String],
    verify: &VerifyConfig,
    solver_cfg: SolverConfig,
) -> miette::Result<Outcomes> {
    let backend = SmtLibBackend::new(solver_cfg);
    if !backend.is_available() {
        return Err(miette::miette!(
            help = "install z3 or point `[solver] path` / `--solver` at an SMT-LIB2 solver",
            "solver `{}` could not be started",
            backend.config().path
        ));
    }
    if classes.len() == program.classes.len() {
        return Ok(verify_program(program, &backend, verify, &FacadeLog));
    }
    Ok(classes
        .iter()
        .map(|c| (c.clone(), verify_class(program, c, &backend, verify, &FacadeLog)))
        .collect())
}

#[cfg(feature = "z3")]
fn run_in_process(
    program: &Program,
    classes: &[String],
    verify: &VerifyConfig,
    solver_cfg: &SolverConfig,
) -> miette::Result<Outcomes> {
    let backend = covenant_verify::Z3Backend::new(solver_cfg);
    Ok(classes
        .iter()
        .map(|c| (c.clone(), verify_class(program, c, &backend, verify, &FacadeLog)))
        .collect())
}

#[cfg(not(feature = "z3"))]
fn run_in_process(
    _program: &Program,
    _classes: &[String],
    _verify: &VerifyConfig,
    _solver_cfg: &SolverConfig,
) -> miette::Result<Outcomes> {
    Err(miette::miette!(
        help = "rebuild with `--features z3`",
        "`--in-process` needs the `z3` feature"
    ))
}

fn print_outcomes(outcomes: &Outcomes) {
    for (class, outcome) in outcomes {
        match outcome {
            Ok(result) => match report::diagnose(result) {
                None => println!("{class}: ok, {}", result.summary()),
                Some(diag) => eprintln!("{diag:?}"),
            },
            Err(e) => {
                let e = miette::Report::msg(format!("{class}: {e}"));
                eprintln!("{e:?}");
            }
        }
    }
}

fn display_path(p: &Path) -> String {
    p.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_follow_lines_and_columns() {
        let src = "{\n  \"classes\": [\n}\n";
        assert_eq!(offset_of(src, 1, 1), Some(0));
        assert_eq!(offset_of(src, 3, 1), Some(17));
        assert_eq!(offset_of(src, 0, 4), None);
        assert_eq!(offset_of(src, 9, 9), Some(src.len() - 1));
    }

    #[test]
    fn cli_parses_verify_overrides() {
        let cli = Cli::try_parse_from([
            "covenant", "-v", "verify", "bank.json", "--class", "Bank", "--depth", "2", "--timeout-ms", "500",
        ])
        .expect("parse");
        assert!(cli.verbose);
        match cli.cmd {
            Cmd::Verify {
                class, depth, timeout_ms, json, ..
            } => {
                assert_eq!(class.as_deref(), Some("Bank"));
                assert_eq!(depth, Some(2));
                assert_eq!(timeout_ms, Some(500));
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
