//! Stage validators: `validate_template`, `validate_executable`, `validate_dag`.

use std::collections::{HashMap, HashSet};

use catalog::ToolCatalog;
use engine::models::{Dag, NodeKind};
use nodes::expr::{parse, Expr, PathSegment};
use serde_json::Value;
use tracing::instrument;

use crate::error::{Stage, ValidationError, ValidationReport};
use crate::model::{ExecStep, ExecutableWorkflow, TemplateDoc, TriggerKind};

/// Connection-to-scope lookup the caller supplies for `E004 ScopeMissing`.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    pub connection_scopes: HashMap<String, Vec<String>>,
}

const ALLOWED_ROOTS: [&str; 4] = ["inputs", "vars", "globals", "node"];

/// The `cron` crate parses the 6-field (seconds-first) dialect; schedules
/// are authored in standard 5-field Unix cron. Prepend a `0` seconds field
/// when the caller's expression has exactly 5 whitespace-separated fields.
fn normalize_cron_expr(expr: &str) -> String {
    if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

/// Template stage: schema-lenient. Only a small set of shape errors block.
#[instrument(skip(doc))]
pub fn validate_template(doc: &TemplateDoc) -> ValidationReport {
    let mut errors = Vec::new();

    if !doc.body.is_object() {
        errors.push(ValidationError::new(
            "E001",
            Stage::Template,
            "$",
            "template body must be a JSON object",
        ));
    }

    ValidationReport::from_errors(errors)
}

/// Executable stage: every action must resolve against the catalog and every
/// expression must parse and stay within the legal scope roots.
#[instrument(skip(doc, catalog, ctx))]
pub fn validate_executable(
    doc: &ExecutableWorkflow,
    catalog: &dyn ToolCatalog,
    ctx: &ValidationContext,
) -> ValidationReport {
    let mut errors = Vec::new();

    if catalog.get_trigger(&doc.trigger.toolkit_slug, &doc.trigger.composio_trigger_slug).is_none() {
        errors.push(ValidationError::new(
            "E003",
            Stage::Executable,
            format!("trigger.{}", doc.trigger.node_id),
            format!(
                "unknown trigger '{}/{}'",
                doc.trigger.toolkit_slug, doc.trigger.composio_trigger_slug
            ),
        ));
    }

    if doc.trigger.kind == TriggerKind::ScheduleBased {
        match &doc.trigger.cron_expr {
            Some(expr) => {
                if normalize_cron_expr(expr).parse::<cron::Schedule>().is_err() {
                    errors.push(ValidationError::new(
                        "E010",
                        Stage::Executable,
                        format!("trigger.{}.cron_expr", doc.trigger.node_id),
                        format!("invalid cron expression '{expr}'"),
                    ));
                }
            }
            None => {
                errors.push(ValidationError::new(
                    "E010",
                    Stage::Executable,
                    format!("trigger.{}.cron_expr", doc.trigger.node_id),
                    "schedule-based trigger has no cron_expr",
                ));
            }
        }
    }

    for step in &doc.steps {
        validate_step(step, catalog, ctx, &mut errors);
    }

    ValidationReport::from_errors(errors)
}

fn validate_step(
    step: &ExecStep,
    catalog: &dyn ToolCatalog,
    ctx: &ValidationContext,
    errors: &mut Vec<ValidationError>,
) {
    match step {
        ExecStep::Action { id, tool, action, connection_id, input_template, .. } => {
            match catalog.get_action(tool, action) {
                None => errors.push(ValidationError::new(
                    "E001",
                    Stage::Executable,
                    format!("steps.{id}"),
                    format!("unknown tool action '{tool}/{action}'"),
                )),
                Some(spec) => {
                    let provided = template_keys(input_template);
                    let missing: Vec<&str> = spec
                        .required_params
                        .iter()
                        .map(String::as_str)
                        .filter(|p| !provided.contains(*p))
                        .collect();
                    if !missing.is_empty() {
                        errors.push(
                            ValidationError::new(
                                "E002",
                                Stage::Executable,
                                format!("steps.{id}.input_template"),
                                format!("missing required parameters: {}", missing.join(", ")),
                            )
                            .with_meta(serde_json::json!({ "missing": missing })),
                        );
                    }

                    if !spec.required_scopes.is_empty() {
                        let granted = ctx.connection_scopes.get(connection_id).cloned().unwrap_or_default();
                        let granted: HashSet<&str> = granted.iter().map(String::as_str).collect();
                        let lacking: Vec<&str> = spec
                            .required_scopes
                            .iter()
                            .map(String::as_str)
                            .filter(|s| !granted.contains(*s))
                            .collect();
                        if !lacking.is_empty() {
                            errors.push(
                                ValidationError::new(
                                    "E004",
                                    Stage::Executable,
                                    format!("steps.{id}.connection_id"),
                                    format!("connection '{connection_id}' missing scopes: {}", lacking.join(", ")),
                                )
                                .with_meta(serde_json::json!({ "missing_scopes": lacking })),
                            );
                        }
                    }
                }
            }
            check_template_exprs(id, input_template, errors);
        }
        ExecStep::If { id, branches, .. } => {
            for (expr, _) in branches {
                check_expr(id, expr, errors);
            }
        }
        ExecStep::Switch { id, selector, .. } => {
            check_expr(id, selector, errors);
        }
        ExecStep::LoopWhile { id, condition, .. } => {
            check_expr(id, condition, errors);
        }
        ExecStep::LoopForeach { id, source_array_expr, .. } => {
            check_expr(id, source_array_expr, errors);
        }
        ExecStep::Parallel { .. } | ExecStep::Join { .. } => {}
    }
}

fn template_keys(template: &Value) -> HashSet<&str> {
    match template.as_object() {
        Some(map) => map.keys().map(String::as_str).collect(),
        None => HashSet::new(),
    }
}

fn check_template_exprs(step_id: &str, template: &Value, errors: &mut Vec<ValidationError>) {
    match template {
        Value::String(s) => {
            for placeholder in extract_placeholders(s) {
                check_expr(step_id, &placeholder, errors);
            }
        }
        Value::Array(items) => items.iter().for_each(|v| check_template_exprs(step_id, v, errors)),
        Value::Object(map) => map.values().for_each(|v| check_template_exprs(step_id, v, errors)),
        _ => {}
    }
}

fn extract_placeholders(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = s;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else { break };
        out.push(after[..end].trim().to_string());
        rest = &after[end + 2..];
    }
    out
}

fn check_expr(step_id: &str, src: &str, errors: &mut Vec<ValidationError>) {
    match parse(src) {
        Err(e) => errors.push(ValidationError::new(
            "E008",
            Stage::Executable,
            format!("steps.{step_id}"),
            format!("expression '{src}' failed to parse: {e}"),
        )),
        Ok(expr) => {
            if let Some(bad_root) = first_illegal_root(&expr) {
                errors.push(ValidationError::new(
                    "E008",
                    Stage::Executable,
                    format!("steps.{step_id}"),
                    format!("expression '{src}' references unknown scope root '{bad_root}'"),
                ));
            }
        }
    }
}

fn first_illegal_root(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Path(segments) => match segments.first() {
            Some(PathSegment::Field(root)) if !ALLOWED_ROOTS.contains(&root.as_str()) => Some(root.clone()),
            _ => None,
        },
        Expr::Unary(_, inner) | Expr::Len(inner) | Expr::IsNull(inner) => first_illegal_root(inner),
        Expr::Binary(_, lhs, rhs) => first_illegal_root(lhs).or_else(|| first_illegal_root(rhs)),
        Expr::Null | Expr::Bool(_) | Expr::Number(_) | Expr::Str(_) => None,
    }
}

/// DAG stage: delegates structural soundness to `engine::validate_graph`,
/// then checks join quorum bounds that the graph validator doesn't cover.
#[instrument(skip(dag))]
pub fn validate_dag(dag: &Dag) -> ValidationReport {
    let mut errors = Vec::new();

    if let Err(e) = engine::validate_graph(dag) {
        let code = match &e {
            engine::EngineError::DuplicateNodeId(_) => "E005",
            engine::EngineError::UnknownNodeReference { .. } => "E005",
            engine::EngineError::NoTrigger => "E003",
            engine::EngineError::UnreachableNode(_) => "E007",
            engine::EngineError::CycleDetected => "E006",
            _ => "E005",
        };
        errors.push(ValidationError::new(code, Stage::Dag, "$", e.to_string()));
    }

    for node in &dag.nodes {
        if let NodeKind::Join(data) = &node.kind {
            let in_degree = dag.edges.iter().filter(|e| e.target == node.id).count() as u32;
            if let engine::models::JoinMode::Quorum(n) = data.mode {
                if n == 0 || n > in_degree.max(1) {
                    errors.push(ValidationError::new(
                        "E005",
                        Stage::Dag,
                        format!("nodes.{}.data.mode", node.id),
                        format!("quorum {n} is out of bounds for in_degree {in_degree}"),
                    ));
                }
            }
        }
    }

    ValidationReport::from_errors(errors)
}
