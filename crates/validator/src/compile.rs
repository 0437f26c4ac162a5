//! Deterministic `executable → dag` lowering.

use engine::models::{
    Dag, Edge, EdgeWhen, GatewayIfData, GatewaySwitchData, IfBranch, JoinData, LoopForeachData,
    LoopWhileData, Node, NodeKind, SwitchCase, TriggerData,
};
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::model::{ExecStep, ExecutableWorkflow, TriggerKind as ExecTriggerKind};

fn trigger_instance_id(user_id: &str, workflow_id: &str, version: u32, node_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(workflow_id.as_bytes());
    hasher.update(version.to_le_bytes());
    hasher.update(node_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Lower a fully resolved workflow into its `Dag` wire form. Assumes the
/// caller already ran `validate_executable` — this function does not
/// re-check catalog existence or expression well-formedness.
#[instrument(skip(doc))]
pub fn compile(doc: &ExecutableWorkflow) -> Dag {
    let mut nodes = Vec::with_capacity(doc.steps.len() + 1);
    let mut edges = Vec::new();

    let trigger_id = trigger_instance_id(&doc.user_id, &doc.workflow_id, doc.version, &doc.trigger.node_id);
    nodes.push(Node {
        id: trigger_id.clone(),
        kind: NodeKind::Trigger(TriggerData {
            kind: match doc.trigger.kind {
                ExecTriggerKind::EventBased => engine::models::TriggerKind::EventBased,
                ExecTriggerKind::ScheduleBased => engine::models::TriggerKind::ScheduleBased,
            },
            toolkit_slug: doc.trigger.toolkit_slug.clone(),
            composio_trigger_slug: Some(doc.trigger.composio_trigger_slug.clone()),
            connection_id: doc.trigger.connection_id.clone(),
            filter: doc.trigger.filter.clone(),
            cron_expr: doc.trigger.cron_expr.clone(),
            timezone: doc.trigger.timezone.clone(),
        }),
    });
    edges.push(always_edge(&trigger_id, &doc.trigger.next));

    for step in &doc.steps {
        lower_step(step, doc, &mut nodes, &mut edges);
    }

    Dag {
        workflow_id: doc.workflow_id.clone(),
        version: doc.version,
        nodes,
        edges,
        globals: doc.globals.clone(),
    }
}

fn always_edge(source: &str, target: &str) -> Edge {
    Edge {
        id: format!("{source}->{target}"),
        source: source.to_string(),
        target: target.to_string(),
        when: EdgeWhen::Always,
        condition: None,
    }
}

fn lower_step(step: &ExecStep, doc: &ExecutableWorkflow, nodes: &mut Vec<Node>, edges: &mut Vec<Edge>) {
    match step {
        ExecStep::Action { id, tool, action, connection_id, input_template, output_vars, retry, timeout_ms, next } => {
            nodes.push(Node {
                id: id.clone(),
                kind: NodeKind::Action(engine::models::ActionData {
                    tool: tool.clone(),
                    action: action.clone(),
                    connection_id: connection_id.clone(),
                    input_template: input_template.clone(),
                    output_vars: output_vars.clone(),
                    retry: retry.clone().or_else(|| doc.globals.retry.clone()),
                    timeout_ms: timeout_ms.or(doc.globals.timeout_ms),
                }),
            });
            if let Some(next) = next {
                edges.push(always_edge(id, next));
            }
        }
        ExecStep::If { id, branches, else_to } => {
            nodes.push(Node {
                id: id.clone(),
                kind: NodeKind::GatewayIf(GatewayIfData {
                    branches: branches
                        .iter()
                        .map(|(expr, to)| IfBranch { expr: expr.clone(), to: to.clone() })
                        .collect(),
                    else_to: else_to.clone(),
                }),
            });
            for (_, to) in branches {
                edges.push(always_edge(id, to));
            }
            if let Some(to) = else_to {
                edges.push(always_edge(id, to));
            }
        }
        ExecStep::Switch { id, selector, cases, default_to } => {
            nodes.push(Node {
                id: id.clone(),
                kind: NodeKind::GatewaySwitch(GatewaySwitchData {
                    selector: selector.clone(),
                    cases: cases.iter().map(|(value, to)| SwitchCase { value: value.clone(), to: to.clone() }).collect(),
                    default_to: default_to.clone(),
                }),
            });
            for (_, to) in cases {
                edges.push(always_edge(id, to));
            }
            if let Some(to) = default_to {
                edges.push(always_edge(id, to));
            }
        }
        ExecStep::Parallel { id, branches } => {
            nodes.push(Node { id: id.clone(), kind: NodeKind::Parallel });
            for branch in branches {
                edges.push(always_edge(id, branch));
            }
        }
        ExecStep::Join { id, mode, sources, next } => {
            nodes.push(Node { id: id.clone(), kind: NodeKind::Join(JoinData { mode: mode.clone() }) });
            for source in sources {
                edges.push(always_edge(source, id));
            }
            if let Some(next) = next {
                edges.push(always_edge(id, next));
            }
        }
        ExecStep::LoopWhile { id, condition, body_start, max_iterations, next } => {
            nodes.push(Node {
                id: id.clone(),
                kind: NodeKind::LoopWhile(LoopWhileData {
                    condition: condition.clone(),
                    body_start: body_start.clone(),
                    max_iterations: *max_iterations,
                }),
            });
            edges.push(always_edge(id, body_start));
            if let Some(next) = next {
                edges.push(always_edge(id, next));
            }
        }
        ExecStep::LoopForeach { id, source_array_expr, body_start, max_concurrency, next } => {
            nodes.push(Node {
                id: id.clone(),
                kind: NodeKind::LoopForeach(LoopForeachData {
                    source_array_expr: source_array_expr.clone(),
                    body_start: body_start.clone(),
                    max_concurrency: *max_concurrency,
                }),
            });
            edges.push(always_edge(id, body_start));
            if let Some(next) = next {
                edges.push(always_edge(id, next));
            }
        }
    }
}

