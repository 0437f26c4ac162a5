//! `attempt_repair`: apply the deterministic, idempotent subset of findings
//! marked `auto_repairable`, then hand the patched document back for
//! re-validation by the caller.

use serde_json::{json, Value};
use tracing::instrument;

use crate::error::{LintReport, Repair, Severity};
use crate::model::{ExecStep, ExecutableWorkflow};

/// Apply every `auto_repairable` error-severity finding in `report` to a
/// clone of `doc`. Non-repairable findings (warnings, hints, and errors not
/// flagged repairable) are left untouched for the caller to act on.
#[instrument(skip(doc, report))]
pub fn attempt_repair(doc: &ExecutableWorkflow, report: &LintReport) -> (ExecutableWorkflow, Vec<Repair>) {
    let mut patched = doc.clone();
    let mut repairs = Vec::new();

    for finding in &report.errors {
        if finding.severity != Severity::Error || !finding.auto_repairable {
            continue;
        }
        match finding.code {
            "E012" => {
                if patched.trigger.filter.is_none() {
                    patched.trigger.filter = Some(json!({ "verify_signature": true }));
                    repairs.push(Repair {
                        code: "E012",
                        path: finding.path.clone(),
                        description: "enabled webhook signature verification".into(),
                    });
                }
            }
            "E011" => {
                let filter = patched.trigger.filter.get_or_insert_with(|| json!({}));
                if let Some(map) = filter.as_object_mut() {
                    if !map.contains_key("cursor") {
                        map.insert("cursor".into(), Value::Null);
                        repairs.push(Repair {
                            code: "E011",
                            path: finding.path.clone(),
                            description: "added a cursor field to bound re-delivery".into(),
                        });
                    }
                }
            }
            "E013" => {
                if repair_plaintext_secret(&mut patched, &finding.path) {
                    repairs.push(Repair {
                        code: "E013",
                        path: finding.path.clone(),
                        description: "replaced literal secret with a connection reference".into(),
                    });
                }
            }
            "E009" => {
                if let Some(step_id) = finding.path.strip_prefix("steps.").and_then(|p| p.split('.').next()) {
                    if insert_transform_before(&mut patched, step_id) {
                        repairs.push(Repair {
                            code: "E009",
                            path: finding.path.clone(),
                            description: format!("inserted a transform step before '{step_id}'"),
                        });
                    }
                }
            }
            _ => {}
        }
    }

    (patched, repairs)
}

/// `path` looks like `steps.<id>.input_template.<field...>`; walk to the
/// named field and replace its literal value with a `{{ secrets.KEY }}`
/// placeholder.
fn repair_plaintext_secret(doc: &mut ExecutableWorkflow, path: &str) -> bool {
    let Some(rest) = path.strip_prefix("steps.") else { return false };
    let Some((step_id, field_path)) = rest.split_once(".input_template.") else { return false };

    for step in &mut doc.steps {
        if let ExecStep::Action { id, input_template, .. } = step {
            if id == step_id {
                let key = field_path.to_uppercase().replace('.', "_");
                return set_field(input_template, field_path, json!(format!("{{{{ secrets.{key} }}}}")));
            }
        }
    }
    false
}

fn set_field(root: &mut Value, dotted_path: &str, new_value: Value) -> bool {
    let mut cursor = root;
    let segments: Vec<&str> = dotted_path.split('.').collect();
    for seg in &segments[..segments.len().saturating_sub(1)] {
        match cursor.get_mut(*seg) {
            Some(next) => cursor = next,
            None => return false,
        }
    }
    match segments.last() {
        Some(last) => match cursor.as_object_mut() {
            Some(map) => {
                map.insert((*last).to_string(), new_value);
                true
            }
            None => false,
        },
        None => false,
    }
}

/// Insert a `core/transform` action step immediately before `target_id` in
/// whatever chain currently points `next` at it, rewiring that predecessor
/// to point at the new step instead.
fn insert_transform_before(doc: &mut ExecutableWorkflow, target_id: &str) -> bool {
    if doc.steps.iter().any(|s| s.id() == format!("{target_id}__bridge")) {
        return false; // idempotent: already inserted
    }

    let bridge_id = format!("{target_id}__bridge");

    let mut rewired = false;
    if doc.trigger.next == target_id {
        doc.trigger.next = bridge_id.clone();
        rewired = true;
    }
    for step in &mut doc.steps {
        if let ExecStep::Action { next, .. } = step {
            if next.as_deref() == Some(target_id) {
                *next = Some(bridge_id.clone());
                rewired = true;
            }
        }
    }
    if !rewired {
        return false;
    }

    doc.steps.push(ExecStep::Action {
        id: bridge_id,
        tool: "core".into(),
        action: "transform".into(),
        connection_id: "internal".into(),
        input_template: json!({ "passthrough": true }),
        output_vars: Vec::new(),
        retry: None,
        timeout_ms: None,
        next: Some(target_id.to_string()),
    });
    true
}
