#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use std::fs;
use std::path::{Path, PathBuf};

use covenant_verify::{SolverConfig, VerifyConfig};
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

pub const FILE_NAME: &str = "covenant.toml";

#[derive(Debug, Error, Diagnostic)]
#[error("config error: {message}")]
#[diagnostic(code(covenant::config))]
#[allow(unused_assignments)]
pub struct ConfigError {
    pub message: String,
}

/// `covenant.toml`: a `[verify]` and a `[solver]` table, both optional.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub verify: VerifyConfig,
    pub solver: SolverConfig,
}

impl FileConfig {
    pub fn parse(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError {
            message: format!("failed to parse {}: {e}", origin.display()),
        })
    }
}

/// Nearest `covenant.toml` in `start` (or its directory, for a file) and its ancestors.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    let mut cur = if start.is_file() {
        start.parent()?.to_path_buf()
    } else {
        start.to_path_buf()
    };
    loop {
        let candidate = cur.join(FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        cur = cur.parent()?.to_path_buf();
    }
}

/// Loads `explicit` if given, otherwise the nearest config above `model`.
/// Without either, defaults apply.
pub fn load(explicit: Option<&Path>, model: &Path) -> Result<(FileConfig, Option<PathBuf>), ConfigError> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(model),
    };
    let Some(path) = path else {
        return Ok((FileConfig::default(), None));
    };
    let raw = fs::read_to_string(&path).map_err(|e| ConfigError {
        message: format!("failed to read {}: {e}", path.display()),
    })?;
    let parsed = FileConfig::parse(&raw, &path)?;
    Ok((parsed, Some(path)))
}
