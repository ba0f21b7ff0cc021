#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use covenant_verify::{VerificationResult, VerifyError};
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

/// A contract a call sequence can violate.
#[derive(Debug, Error, Diagnostic)]
#[error("{class}: {summary}")]
#[diagnostic(code(covenant::contract))]
#[allow(unused_assignments)]
pub struct ContractViolation {
    pub class: String,
    pub summary: String,
    #[help]
    pub help: Option<String>,
}

/// A run that ended without a verdict.
#[derive(Debug, Error, Diagnostic)]
#[error("{class}: {summary}")]
#[diagnostic(
    code(covenant::inconclusive),
    severity(Warning),
    help("raise `--timeout-ms` or lower `--depth` to get a verdict")
)]
#[allow(unused_assignments)]
pub struct Inconclusive {
    pub class: String,
    pub summary: String,
}

/// Renders a non-successful result; `None` for success.
pub fn diagnose(result: &VerificationResult) -> Option<miette::Report> {
    if result.is_success() {
        return None;
    }
    let class = result.class().to_string();
    let mut summary = result.summary();
    let Some(v) = result.violation() else {
        return Some(miette::Report::new(Inconclusive { class, summary }));
    };
    if let Some(loc) = v.loc {
        summary.push_str(&format!(" (at {loc})"));
    }
    let mut help = Vec::new();
    if v.sequence.is_empty() {
        help.push("reached from the initial state".to_string());
    } else {
        help.push(format!("call sequence: {}", v.sequence.join(" -> ")));
    }
    if let Some(model) = v.model.as_ref().filter(|m| !m.is_empty()) {
        help.push(format!("counterexample:\n{model}"));
    }
    Some(miette::Report::new(ContractViolation {
        class,
        summary,
        help: Some(help.join("\n")),
    }))
}

#[derive(Debug, Serialize)]
pub struct ClassReport<'a> {
    pub class: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<&'a VerificationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `--json` output of `covenant verify`.
#[derive(Debug, Serialize)]
pub struct VerifyReport<'a> {
    pub schema: &'static str,
    pub input: String,
    pub ok: bool,
    pub classes: Vec<ClassReport<'a>>,
}

impl<'a> VerifyReport<'a> {
    pub fn new(input: String, results: &'a [(String, Result<VerificationResult, VerifyError>)]) -> Self {
        let classes: Vec<ClassReport<'a>> = results
            .iter()
            .map(|(class, outcome)| match outcome {
                Ok(result) => ClassReport {
                    class,
                    result: Some(result),
                    error: None,
                },
                Err(e) => ClassReport {
                    class,
                    result: None,
                    error: Some(e.to_string()),
                },
            })
            .collect();
        let ok = classes
            .iter()
            .all(|c| c.result.is_some_and(VerificationResult::is_success));
        Self {
            schema: "covenant.verify.v1",
            input,
            ok,
            classes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_model::Location;
    use covenant_verify::{Model, Violation};
    use miette::Severity;

    #[test]
    fn violations_carry_sequence_and_model() {
        let mut v = Violation::new("Counter", None, Some(Location::new(2, 5)), "X == 0").with_model(Some(Model {
            assignments: vec![("X_2".into(), "1".into())],
        }));
        v.sequence = vec!["Step".into(), "Step".into()];
        let report = diagnose(&VerificationResult::InvariantError(v)).expect("violation");
        assert_eq!(report.to_string(), "Counter: invariant `X == 0` can be violated (at 2:5)");
        assert_eq!(report.severity(), None);
        let help = report.help().expect("help").to_string();
        assert!(help.contains("Step -> Step"), "{help}");
        assert!(help.contains("X_2 = 1"), "{help}");
    }

    #[test]
    fn timeouts_are_warnings_and_success_is_silent() {
        let timeout = VerificationResult::Timeout {
            class: "Bank".into(),
            reason: "time budget of 10 ms exhausted".into(),
            sequences: 4,
        };
        let report = diagnose(&timeout).expect("diagnostic");
        assert_eq!(report.severity(), Some(Severity::Warning));
        assert_eq!(report.to_string(), "Bank: inconclusive: time budget of 10 ms exhausted");

        let success = VerificationResult::Success {
            class: "Bank".into(),
            max_depth: 3,
            sequences: 7,
        };
        assert!(diagnose(&success).is_none());
    }

    #[test]
    fn json_report_marks_failures() {
        let results = vec![
            (
                "A".to_string(),
                Ok(VerificationResult::Success {
                    class: "A".into(),
                    max_depth: 1,
                    sequences: 2,
                }),
            ),
            ("B".to_string(), Err(VerifyError::UnknownClass("B".into()))),
        ];
        let report = VerifyReport::new("model.json".into(), &results);
        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["ok"], false);
        assert_eq!(json["classes"][0]["result"]["outcome"], "success");
        assert_eq!(json["classes"][1]["error"], "unknown class `B`");
    }
}
