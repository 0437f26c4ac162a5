//! Structured validation/lint findings.
//!
//! Unlike `engine::error::EngineError` (a closed enum of failure kinds),
//! findings here are homogeneous records carrying a stable `code` — the
//! catalog of codes is the contract, not the Rust type.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Which document shape is being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Template,
    Executable,
    Dag,
}

/// A blocking structural or catalog-integrity problem.
#[derive(Debug, Clone, Serialize, Error)]
#[error("{code}: {message} (at {path})")]
pub struct ValidationError {
    pub code: &'static str,
    pub path: String,
    pub stage: Stage,
    pub message: String,
    #[serde(default)]
    pub meta: Option<Value>,
}

impl ValidationError {
    pub fn new(code: &'static str, stage: Stage, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code, path: path.into(), stage, message: message.into(), meta: None }
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Severity of a [`LintFinding`]. Only `Error` severity can block a caller;
/// `Warning` and `Hint` are informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Hint,
}

/// One rule-catalog finding produced by `lint`.
#[derive(Debug, Clone, Serialize)]
pub struct LintFinding {
    pub code: &'static str,
    pub severity: Severity,
    pub path: String,
    pub message: String,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub auto_repairable: bool,
}

/// The outcome of `validate`.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn ok() -> Self {
        Self { ok: true, errors: Vec::new() }
    }

    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self { ok: errors.is_empty(), errors }
    }
}

/// The outcome of `lint`, findings partitioned by severity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LintReport {
    pub errors: Vec<LintFinding>,
    pub warnings: Vec<LintFinding>,
    pub hints: Vec<LintFinding>,
}

impl LintReport {
    pub fn push(&mut self, finding: LintFinding) {
        match finding.severity {
            Severity::Error => self.errors.push(finding),
            Severity::Warning => self.warnings.push(finding),
            Severity::Hint => self.hints.push(finding),
        }
    }

    pub fn merge(&mut self, other: LintReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.hints.extend(other.hints);
    }
}

/// One applied auto-repair.
#[derive(Debug, Clone, Serialize)]
pub struct Repair {
    pub code: &'static str,
    pub path: String,
    pub description: String,
}

/// The outcome of `attempt_repair`.
#[derive(Debug, Clone, Serialize)]
pub struct RepairOutcome {
    pub repairs: Vec<Repair>,
}

/// The outcome of `validate_and_compile`.
#[derive(Debug, Clone, Serialize)]
pub struct CompileReport {
    pub ok: bool,
    pub dag: Option<engine::models::Dag>,
    pub errors: Vec<ValidationError>,
    pub lint: LintReport,
}
