//! Rule-based linting: warnings and hints that never block, plus any
//! auto-repairable errors surfaced for `attempt_repair` to act on.

use engine::models::{Dag, NodeKind};
use serde_json::Value;
use tracing::instrument;

use crate::error::{LintFinding, LintReport, Severity};
use crate::model::{ExecStep, ExecutableWorkflow, TriggerKind};

const AGGRESSIVE_FANOUT_THRESHOLD: usize = 20;
const SECRET_LOOKING_KEYS: [&str; 4] = ["password", "api_key", "secret", "token"];

/// Lint an `Executable` document.
#[instrument(skip(doc))]
pub fn lint_executable(doc: &ExecutableWorkflow) -> LintReport {
    let mut report = LintReport::default();

    if doc.trigger.kind == TriggerKind::EventBased && doc.trigger.filter.is_none() {
        report.push(LintFinding {
            code: "E012",
            severity: Severity::Error,
            path: format!("trigger.{}.filter", doc.trigger.node_id),
            message: "webhook trigger has no verification filter configured".into(),
            hint: Some("enable delivery signature verification".into()),
            auto_repairable: true,
        });
    }

    if doc.trigger.composio_trigger_slug.contains("poll") {
        let has_cursor = doc
            .trigger
            .filter
            .as_ref()
            .and_then(Value::as_object)
            .map(|m| m.contains_key("cursor"))
            .unwrap_or(false);
        if !has_cursor {
            report.push(LintFinding {
                code: "E011",
                severity: Severity::Error,
                path: format!("trigger.{}.filter", doc.trigger.node_id),
                message: "polling trigger has no cursor field to bound re-delivery".into(),
                hint: Some("add a cursor field to filter".into()),
                auto_repairable: true,
            });
        }
    }

    for step in &doc.steps {
        match step {
            ExecStep::Action { id, output_vars, retry, input_template, .. } => {
                for (path, value) in find_plaintext_secrets(id, input_template) {
                    report.push(LintFinding {
                        code: "E013",
                        severity: Severity::Error,
                        path,
                        message: format!("literal value '{value}' looks like a secret"),
                        hint: Some("reference a connection secret instead of a literal value".into()),
                        auto_repairable: true,
                    });
                }
                if has_bare_object_placeholder(input_template) {
                    report.push(LintFinding {
                        code: "E009",
                        severity: Severity::Error,
                        path: format!("steps.{id}.input_template"),
                        message: "a whole-object node output is passed where a scalar is expected".into(),
                        hint: Some("insert a transform step to project the field you need".into()),
                        auto_repairable: true,
                    });
                }

                let effective_retry = retry.as_ref().or(doc.globals.retry.as_ref());
                if effective_retry.is_none() {
                    report.push(LintFinding {
                        code: "W502",
                        severity: Severity::Warning,
                        path: format!("steps.{id}.retry"),
                        message: "action has no retry policy and none is inherited from globals".into(),
                        hint: Some("set globals.retry or a step-level retry policy".into()),
                        auto_repairable: false,
                    });
                }
                if output_vars.is_empty() && effective_retry.map(|r| r.retries > 0).unwrap_or(false) {
                    report.push(LintFinding {
                        code: "W501",
                        severity: Severity::Warning,
                        path: format!("steps.{id}.output_vars"),
                        message: "action is retried but captures no output_vars to detect duplicate effects".into(),
                        hint: Some("capture a resource id in output_vars so retries can be reconciled".into()),
                        auto_repairable: false,
                    });
                }
            }
            ExecStep::If { id, else_to, .. } => {
                if else_to.is_none() {
                    report.push(LintFinding {
                        code: "W202",
                        severity: Severity::Warning,
                        path: format!("steps.{id}.else_to"),
                        message: "gateway_if has no else_to; unmatched inputs dead-end".into(),
                        hint: Some("add an else_to branch".into()),
                        auto_repairable: false,
                    });
                }
            }
            ExecStep::Switch { id, default_to, .. } => {
                if default_to.is_none() {
                    report.push(LintFinding {
                        code: "W202",
                        severity: Severity::Warning,
                        path: format!("steps.{id}.default_to"),
                        message: "gateway_switch has no default_to; unmatched values dead-end".into(),
                        hint: Some("add a default_to branch".into()),
                        auto_repairable: false,
                    });
                }
            }
            ExecStep::Parallel { id, branches } => {
                if branches.len() > AGGRESSIVE_FANOUT_THRESHOLD {
                    report.push(LintFinding {
                        code: "W201",
                        severity: Severity::Warning,
                        path: format!("steps.{id}.branches"),
                        message: format!("parallel fan-out of {} branches may overwhelm downstream connections", branches.len()),
                        hint: Some("consider batching or reducing branch count".into()),
                        auto_repairable: false,
                    });
                }
            }
            ExecStep::LoopForeach { id, max_concurrency, .. } => {
                if *max_concurrency as usize > AGGRESSIVE_FANOUT_THRESHOLD {
                    report.push(LintFinding {
                        code: "W201",
                        severity: Severity::Warning,
                        path: format!("steps.{id}.max_concurrency"),
                        message: format!("max_concurrency {max_concurrency} may overwhelm downstream connections"),
                        hint: Some("lower max_concurrency".into()),
                        auto_repairable: false,
                    });
                }
            }
            ExecStep::Join { .. } | ExecStep::LoopWhile { .. } => {}
        }
    }

    report
}

/// Lint a lowered `Dag`. Mirrors the gateway/fan-out checks against the
/// compiled node shapes.
#[instrument(skip(dag))]
pub fn lint_dag(dag: &Dag) -> LintReport {
    let mut report = LintReport::default();

    for node in &dag.nodes {
        match &node.kind {
            NodeKind::GatewayIf(data) if data.else_to.is_none() => {
                report.push(LintFinding {
                    code: "W202",
                    severity: Severity::Warning,
                    path: format!("nodes.{}.data.else_to", node.id),
                    message: "gateway_if has no else_to".into(),
                    hint: None,
                    auto_repairable: false,
                });
            }
            NodeKind::GatewaySwitch(data) if data.default_to.is_none() => {
                report.push(LintFinding {
                    code: "W202",
                    severity: Severity::Warning,
                    path: format!("nodes.{}.data.default_to", node.id),
                    message: "gateway_switch has no default_to".into(),
                    hint: None,
                    auto_repairable: false,
                });
            }
            _ => {}
        }
    }

    report
}

fn find_plaintext_secrets(step_id: &str, template: &Value) -> Vec<(String, String)> {
    let mut out = Vec::new();
    walk_secrets(step_id, "input_template", template, &mut out);
    out
}

fn walk_secrets(step_id: &str, path: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let child_path = format!("{path}.{k}");
                if let Value::String(s) = v {
                    let key_looks_secret = SECRET_LOOKING_KEYS.iter().any(|s| k.to_lowercase().contains(s));
                    let value_looks_secret = looks_like_literal_secret(s);
                    if (key_looks_secret || value_looks_secret) && !s.trim_start().starts_with("{{") {
                        out.push((format!("steps.{step_id}.{child_path}"), s.clone()));
                    }
                } else {
                    walk_secrets(step_id, &child_path, v, out);
                }
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                walk_secrets(step_id, &format!("{path}[{i}]"), v, out);
            }
        }
        _ => {}
    }
}

fn looks_like_literal_secret(s: &str) -> bool {
    s.starts_with("sk-") || s.starts_with("Bearer ") || s.starts_with("xox") || s.len() >= 32 && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// True if any string leaf is an exact `{{ node[...].outputs }}` placeholder
/// with no field suffix — a whole object handed to what should be a scalar.
fn has_bare_object_placeholder(template: &Value) -> bool {
    match template {
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .strip_prefix("{{")
                .and_then(|s| s.strip_suffix("}}"))
                .map(str::trim)
                .map(|inner| inner.ends_with(".outputs") || inner == "outputs")
                .unwrap_or(false)
        }
        Value::Object(map) => map.values().any(has_bare_object_placeholder),
        Value::Array(items) => items.iter().any(has_bare_object_placeholder),
        _ => false,
    }
}
