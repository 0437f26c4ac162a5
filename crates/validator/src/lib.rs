//! `validator` crate — schema/graph/catalog checks, linting, auto-repair,
//! and `executable → dag` compilation.
//!
//! Pure functions: no I/O beyond the `ToolCatalog` snapshot the caller
//! supplies. Kept as a separate crate from `engine` because compilation
//! happens once per workflow edit, not on the dispatch hot path.

pub mod compile;
pub mod error;
pub mod lint;
pub mod model;
pub mod repair;
pub mod validate;
#[cfg(test)]
mod tests;

pub use compile::compile;
pub use error::{
    CompileReport, LintFinding, LintReport, Repair, Severity, Stage, ValidationError, ValidationReport,
};
pub use model::{ExecStep, ExecTrigger, ExecutableWorkflow, TemplateDoc, TriggerKind};
pub use validate::ValidationContext;

use catalog::ToolCatalog;

/// Stage-dispatching `validate`. `Dag` documents are validated directly;
/// `Template`/`Executable` documents go through the JSON-typed entry points
/// in [`validate`] module when the caller already has a typed document.
pub fn validate_template(doc: &TemplateDoc) -> ValidationReport {
    validate::validate_template(doc)
}

pub fn validate_executable(
    doc: &ExecutableWorkflow,
    catalog: &dyn ToolCatalog,
    ctx: &ValidationContext,
) -> ValidationReport {
    validate::validate_executable(doc, catalog, ctx)
}

pub fn validate_dag(dag: &engine::models::Dag) -> ValidationReport {
    validate::validate_dag(dag)
}

pub fn lint_executable(doc: &ExecutableWorkflow) -> LintReport {
    lint::lint_executable(doc)
}

pub fn lint_dag(dag: &engine::models::Dag) -> LintReport {
    lint::lint_dag(dag)
}

pub fn attempt_repair(doc: &ExecutableWorkflow, report: &LintReport) -> (ExecutableWorkflow, Vec<Repair>) {
    repair::attempt_repair(doc, report)
}

/// Full pipeline: validate(executable) → lint+repair → lower → validate(dag)
/// → lint(dag). Stops and reports as soon as a stage leaves blocking errors.
pub fn validate_and_compile(
    doc: &ExecutableWorkflow,
    catalog: &dyn ToolCatalog,
    ctx: &ValidationContext,
) -> CompileReport {
    let exec_report = validate_executable(doc, catalog, ctx);
    if !exec_report.ok {
        return CompileReport { ok: false, dag: None, errors: exec_report.errors, lint: LintReport::default() };
    }

    let mut lint_report = lint_executable(doc);
    let (doc, repairs) = attempt_repair(doc, &lint_report);
    if !repairs.is_empty() {
        let exec_report = validate_executable(&doc, catalog, ctx);
        if !exec_report.ok {
            return CompileReport { ok: false, dag: None, errors: exec_report.errors, lint: lint_report };
        }
        lint_report = lint_executable(&doc);
    }

    let unresolved_errors: Vec<_> = lint_report
        .errors
        .iter()
        .filter(|f| !f.auto_repairable)
        .cloned()
        .collect();
    if !unresolved_errors.is_empty() {
        let errors = unresolved_errors
            .into_iter()
            .map(|f| ValidationError::new(f.code, Stage::Executable, f.path, f.message))
            .collect();
        return CompileReport { ok: false, dag: None, errors, lint: lint_report };
    }

    let dag = compile(&doc);
    let dag_report = validate_dag(&dag);
    if !dag_report.ok {
        return CompileReport { ok: false, dag: None, errors: dag_report.errors, lint: lint_report };
    }

    lint_report.merge(lint_dag(&dag));
    CompileReport { ok: true, dag: Some(dag), errors: Vec::new(), lint: lint_report }
}
