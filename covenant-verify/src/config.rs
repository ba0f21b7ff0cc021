#![forbid(unsafe_code)]

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounds of one verification run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Longest call sequence explored.
    pub max_depth: usize,
    #[serde(rename = "max_duration_ms", with = "duration_ms")]
    pub max_duration: Duration,
    /// Nested calls inlined before a callee is replaced by its contract.
    pub inline_depth: usize,
    /// Fetch a counterexample model when a violation is found.
    pub collect_models: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_duration: Duration::from_secs(30),
            inline_depth: 8,
            collect_models: true,
        }
    }
}

impl VerifyConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    pub fn with_inline_depth(mut self, inline_depth: usize) -> Self {
        self.inline_depth = inline_depth;
        self
    }
}

/// External SMT-LIB2 solver settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub path: String,
    /// Per-check limit handed to the solver; `None` lets a check run to completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            path: "z3".to_string(),
            timeout_ms: None,
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
