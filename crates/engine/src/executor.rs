//! The dispatch loop.
//!
//! Walks a validated [`Dag`] breadth-first from its trigger, executing one
//! node at a time against the closed set of eight node kinds. The loop owns
//! a single [`RunState`] for the whole activation; node kinds never see each
//! other's internals, only the shared [`RunContext`] and a ready queue of
//! node ids still waiting to run.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use nodes::expr::{self, Scope};
use nodes::{InvokeRequest, NodeError, ToolInvoker};

use crate::dag::{validate_graph, DagIndex};
use crate::error::EngineError;
use crate::idempotency::{action_idem_key, IdempotencyCache, DEFAULT_TTL_SECS};
use crate::models::{
    ActionData, BackoffKind, Dag, EdgeWhen, GatewayIfData, GatewaySwitchData, JoinData, JoinMode,
    LoopForeachData, LoopWhileData, NodeKind, NodeStatus, OutputVar, RetryPolicy, RunContext,
    RunSource, RunStatus,
};
use crate::render::render;
use crate::retry::backoff_delay;
use crate::store::{NodeExecutionUpdate, RunRecord, RunStore};

/// Runtime knobs independent of any single workflow.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub idempotency_ttl_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { idempotency_ttl_secs: DEFAULT_TTL_SECS }
    }
}

/// How a run was activated, independent of the DAG's own trigger metadata.
#[derive(Debug, Clone)]
pub struct ActivationMeta {
    pub run_id: String,
    pub user_id: String,
    pub source: RunSource,
}

/// Terminal state of one run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub status: RunStatus,
    pub context: RunContext,
    pub node_statuses: HashMap<String, NodeStatus>,
}

struct ReadyItem {
    node_id: String,
    from: String,
}

struct RunState {
    run_id: String,
    ctx: RunContext,
    ready: VecDeque<ReadyItem>,
    node_status: HashMap<String, NodeStatus>,
    attempts: HashMap<String, u32>,
    loop_counts: HashMap<String, u32>,
    handled_errors: HashSet<String>,
}

/// Executes one activation of a validated [`Dag`] to completion.
///
/// Holds no state between calls — every [`Self::activate`] is a fresh run
/// against whichever `RunStore` / `ToolInvoker` the executor was built with.
pub struct Executor {
    invoker: Arc<dyn ToolInvoker>,
    run_store: Arc<dyn RunStore>,
    idempotency: Arc<dyn IdempotencyCache>,
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(
        invoker: Arc<dyn ToolInvoker>,
        run_store: Arc<dyn RunStore>,
        idempotency: Arc<dyn IdempotencyCache>,
        config: ExecutorConfig,
    ) -> Self {
        Self { invoker, run_store, idempotency, config }
    }

    /// Activate `dag` at `trigger_node_id` and run every dispatchable node to
    /// completion, returning the terminal run state.
    #[instrument(skip(self, dag, payload), fields(run_id = %meta.run_id, workflow_id = %dag.workflow_id))]
    pub async fn activate(
        &self,
        dag: &Dag,
        trigger_node_id: &str,
        payload: Value,
        meta: ActivationMeta,
    ) -> Result<RunOutcome, EngineError> {
        validate_graph(dag)?;
        let index = DagIndex::build(dag)?;
        index
            .node(trigger_node_id)
            .filter(|n| matches!(n.kind, NodeKind::Trigger(_)))
            .ok_or_else(|| EngineError::UnknownNode(trigger_node_id.to_string()))?;

        self.run_store
            .create_run(&RunRecord {
                run_id: meta.run_id.clone(),
                workflow_id: dag.workflow_id.clone(),
                version: dag.version,
                user_id: meta.user_id,
                source: meta.source,
                trigger_digest: trigger_node_id.to_string(),
                started_at: Utc::now(),
            })
            .await?;

        let mut run = RunState {
            run_id: meta.run_id,
            ctx: RunContext::new(payload),
            ready: VecDeque::new(),
            node_status: HashMap::new(),
            attempts: HashMap::new(),
            loop_counts: HashMap::new(),
            handled_errors: HashSet::new(),
        };

        self.finalize_routed(dag, &index, &mut run, trigger_node_id, NodeStatus::Skipped, None, &[])
            .await?;

        while let Some(item) = run.ready.pop_front() {
            if run.node_status.get(item.node_id.as_str()).map(|s| s.is_terminal()).unwrap_or(false) {
                continue;
            }
            self.dispatch(dag, &index, &mut run, &item.node_id, &item.from).await?;
        }

        for node in &dag.nodes {
            run.node_status.entry(node.id.clone()).or_insert(NodeStatus::Skipped);
        }

        let failed = run
            .node_status
            .iter()
            .any(|(id, status)| *status == NodeStatus::Error && !run.handled_errors.contains(id));
        let status = if failed { RunStatus::Failed } else { RunStatus::Success };
        self.run_store.set_run_status(&run.run_id, status).await?;

        info!(?status, "run finished");
        Ok(RunOutcome { run_id: run.run_id, status, context: run.ctx, node_statuses: run.node_status })
    }

    #[instrument(skip(self, dag, index, run), fields(node_id = %node_id))]
    async fn dispatch(
        &self,
        dag: &Dag,
        index: &DagIndex<'_>,
        run: &mut RunState,
        node_id: &str,
        from: &str,
    ) -> Result<(), EngineError> {
        let node = index.node(node_id).ok_or_else(|| EngineError::UnknownNode(node_id.to_string()))?;
        run.node_status.insert(node_id.to_string(), NodeStatus::Running);

        match node.kind.clone() {
            NodeKind::Trigger(_) => {
                // A trigger only ever appears once, at run start; reaching one
                // mid-run would mean the DAG routes back into it, which graph
                // validation already rejects.
                self.finalize_routed(dag, index, run, node_id, NodeStatus::Skipped, None, &[]).await
            }
            NodeKind::Action(data) => self.dispatch_action(dag, index, run, node_id, &data).await,
            NodeKind::GatewayIf(data) => self.dispatch_gateway_if(dag, run, node_id, &data).await,
            NodeKind::GatewaySwitch(data) => {
                self.dispatch_gateway_switch(dag, run, node_id, &data).await
            }
            NodeKind::Parallel => {
                self.finalize_routed(dag, index, run, node_id, NodeStatus::Done, None, &[]).await
            }
            NodeKind::Join(data) => self.dispatch_join(dag, index, run, node_id, from, &data).await,
            NodeKind::LoopWhile(data) => self.dispatch_loop_while(dag, index, run, node_id, &data).await,
            NodeKind::LoopForeach(data) => {
                self.dispatch_loop_foreach(dag, index, run, node_id, &data).await
            }
        }
    }

    async fn record_terminal(
        &self,
        run: &mut RunState,
        node_id: &str,
        status: NodeStatus,
        output: Option<Value>,
    ) -> Result<(), EngineError> {
        run.node_status.insert(node_id.to_string(), status);
        if let Some(ref out) = output {
            run.ctx.artifacts.insert(node_id.to_string(), out.clone());
        }
        let attempt = *run.attempts.get(node_id).unwrap_or(&1);
        self.run_store
            .update_node_execution(NodeExecutionUpdate {
                run_id: run.run_id.clone(),
                node_id: node_id.to_string(),
                attempt,
                status,
                output,
                error: run.ctx.errors.get(node_id).cloned(),
                idem_key: String::new(),
                started_at: Utc::now(),
                finished_at: Some(Utc::now()),
            })
            .await
    }

    fn route_edges(
        &self,
        dag: &Dag,
        index: &DagIndex<'_>,
        run: &mut RunState,
        node_id: &str,
        status: NodeStatus,
        exclude: &[&str],
    ) -> Result<(), EngineError> {
        let globals = globals_json(dag);
        for edge in index.out_edges(node_id) {
            if exclude.contains(&edge.target.as_str()) {
                continue;
            }
            if !edge_matches(edge.when, status) {
                continue;
            }
            let condition_holds = match &edge.condition {
                None => true,
                Some(expr_src) => {
                    let scope = Scope {
                        inputs: &run.ctx.inputs,
                        vars: &run.ctx.vars,
                        globals: &globals,
                        node_outputs: &run.ctx.artifacts,
                    };
                    eval_condition_bool(expr_src, &scope, node_id)?
                }
            };
            if !condition_holds {
                continue;
            }
            run.ready.push_back(ReadyItem { node_id: edge.target.clone(), from: node_id.to_string() });
            if status == NodeStatus::Error && edge.when == EdgeWhen::Error {
                run.handled_errors.insert(node_id.to_string());
            }
        }
        Ok(())
    }

    async fn finalize_routed(
        &self,
        dag: &Dag,
        index: &DagIndex<'_>,
        run: &mut RunState,
        node_id: &str,
        status: NodeStatus,
        output: Option<Value>,
        exclude: &[&str],
    ) -> Result<(), EngineError> {
        self.record_terminal(run, node_id, status, output).await?;
        self.route_edges(dag, index, run, node_id, status, exclude)
    }

    async fn dispatch_action(
        &self,
        dag: &Dag,
        index: &DagIndex<'_>,
        run: &mut RunState,
        node_id: &str,
        data: &ActionData,
    ) -> Result<(), EngineError> {
        let globals = globals_json(dag);
        let rendered = render(&data.input_template, &run.ctx, &globals)?;
        let idem_key = action_idem_key(&run.run_id, node_id, &rendered);

        if let Some(cached) = self.idempotency.get(&idem_key).await {
            debug!(%idem_key, "idempotent replay, invoker not called");
            apply_output_vars(&mut run.ctx, node_id, &cached, &data.output_vars);
            return self.finalize_routed(dag, index, run, node_id, NodeStatus::Done, Some(cached), &[]).await;
        }

        let retry = data.retry.clone().or_else(|| dag.globals.retry.clone()).unwrap_or(RetryPolicy {
            retries: 0,
            backoff: BackoffKind::Linear,
            delay_ms: 0,
        });
        let timeout_ms = data.timeout_ms.or(dag.globals.timeout_ms).unwrap_or(30_000);

        let mut attempt = 1u32;
        loop {
            run.attempts.insert(node_id.to_string(), attempt);
            let request = InvokeRequest {
                tool: data.tool.clone(),
                action: data.action.clone(),
                connection_id: data.connection_id.clone(),
                arguments: rendered.clone(),
                timeout_ms,
                idempotency_key: idem_key.clone(),
            };

            match self.invoker.invoke(request).await {
                Ok(output) => {
                    self.idempotency
                        .put(&idem_key, output.clone(), Duration::from_secs(self.config.idempotency_ttl_secs))
                        .await;
                    apply_output_vars(&mut run.ctx, node_id, &output, &data.output_vars);
                    return self
                        .finalize_routed(dag, index, run, node_id, NodeStatus::Done, Some(output), &[])
                        .await;
                }
                Err(NodeError::Fatal(msg)) => {
                    run.ctx.errors.insert(node_id.to_string(), msg);
                    return self.finalize_routed(dag, index, run, node_id, NodeStatus::Error, None, &[]).await;
                }
                Err(NodeError::Retryable(msg)) => {
                    run.ctx.errors.insert(node_id.to_string(), msg.clone());
                    if attempt > retry.retries {
                        return self.finalize_routed(dag, index, run, node_id, NodeStatus::Error, None, &[]).await;
                    }
                    let delay = backoff_delay(&retry, attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %msg, "action retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn dispatch_gateway_if(
        &self,
        dag: &Dag,
        run: &mut RunState,
        node_id: &str,
        data: &GatewayIfData,
    ) -> Result<(), EngineError> {
        let globals = globals_json(dag);
        let mut chosen = None;
        for branch in &data.branches {
            let scope = Scope {
                inputs: &run.ctx.inputs,
                vars: &run.ctx.vars,
                globals: &globals,
                node_outputs: &run.ctx.artifacts,
            };
            if eval_condition_bool(&branch.expr, &scope, node_id)? {
                chosen = Some(branch.to.clone());
                break;
            }
        }
        let chosen = chosen.or_else(|| data.else_to.clone());

        self.record_terminal(run, node_id, NodeStatus::Done, None).await?;
        if let Some(target) = chosen {
            run.ready.push_back(ReadyItem { node_id: target, from: node_id.to_string() });
        }
        Ok(())
    }

    async fn dispatch_gateway_switch(
        &self,
        dag: &Dag,
        run: &mut RunState,
        node_id: &str,
        data: &GatewaySwitchData,
    ) -> Result<(), EngineError> {
        let globals = globals_json(dag);
        let selector_value = {
            let scope = Scope {
                inputs: &run.ctx.inputs,
                vars: &run.ctx.vars,
                globals: &globals,
                node_outputs: &run.ctx.artifacts,
            };
            expr::eval_str(&data.selector, &scope)
                .map_err(|e| EngineError::ExpressionFailed { node_id: node_id.to_string(), message: e.to_string() })?
        };

        let chosen = data
            .cases
            .iter()
            .find(|case| json_values_equal(&case.value, &selector_value))
            .map(|case| case.to.clone())
            .or_else(|| data.default_to.clone());

        self.record_terminal(run, node_id, NodeStatus::Done, None).await?;
        if let Some(target) = chosen {
            run.ready.push_back(ReadyItem { node_id: target, from: node_id.to_string() });
        }
        Ok(())
    }

    async fn dispatch_join(
        &self,
        dag: &Dag,
        index: &DagIndex<'_>,
        run: &mut RunState,
        node_id: &str,
        from: &str,
        data: &JoinData,
    ) -> Result<(), EngineError> {
        self.run_store.record_join_arrival(&run.run_id, node_id, from).await?;
        let arrived = self.run_store.join_arrivals(&run.run_id, node_id).await?;
        let arrived_set: HashSet<&str> = arrived.iter().map(String::as_str).collect();

        let sources: Vec<&str> = index.in_edges(node_id).iter().map(|e| e.source.as_str()).collect();
        let required = match data.mode {
            JoinMode::All => sources.len(),
            JoinMode::Any => 1,
            JoinMode::Quorum(n) => n as usize,
        };

        if arrived.len() >= required {
            return self.finalize_routed(dag, index, run, node_id, NodeStatus::Done, None, &[]).await;
        }

        let lost = sources
            .iter()
            .filter(|s| !arrived_set.contains(*s))
            .filter(|s| run.node_status.get(**s).map(|st| st.is_terminal()).unwrap_or(false))
            .count();
        let still_possible = sources.len() - lost;
        if still_possible < required {
            warn!(node_id, required, still_possible, "join can never be satisfied");
            run.ctx
                .errors
                .insert(node_id.to_string(), EngineError::JoinDeadlock(node_id.to_string()).to_string());
            // Leave the join un-finalized rather than marking it `Error`:
            // finalizing would route its `when=always` edges (`Always`
            // matches any terminal status, including `Error`), dispatching
            // successors that must never run. The run-finalization pass
            // marks every node without a recorded status `SKIPPED`, so the
            // join and everything downstream of it end up `SKIPPED` and the
            // run still fails because the unreachable branch itself errored.
            return Ok(());
        }

        // Still waiting on more predecessors; leave the node pending.
        Ok(())
    }

    async fn dispatch_loop_while(
        &self,
        dag: &Dag,
        index: &DagIndex<'_>,
        run: &mut RunState,
        node_id: &str,
        data: &LoopWhileData,
    ) -> Result<(), EngineError> {
        let globals = globals_json(dag);
        let current = *run.loop_counts.get(node_id).unwrap_or(&0);
        if current >= data.max_iterations {
            run.ctx
                .errors
                .insert(node_id.to_string(), format!("exceeded max_iterations ({})", data.max_iterations));
            return self
                .finalize_routed(dag, index, run, node_id, NodeStatus::Error, None, &[data.body_start.as_str()])
                .await;
        }

        let should_continue = {
            let scope = Scope {
                inputs: &run.ctx.inputs,
                vars: &run.ctx.vars,
                globals: &globals,
                node_outputs: &run.ctx.artifacts,
            };
            eval_condition_bool(&data.condition, &scope, node_id)?
        };

        if should_continue {
            let next = current + 1;
            run.loop_counts.insert(node_id.to_string(), next);
            self.run_store
                .update_node_execution(NodeExecutionUpdate {
                    run_id: run.run_id.clone(),
                    node_id: node_id.to_string(),
                    attempt: next,
                    status: NodeStatus::Running,
                    output: None,
                    error: None,
                    idem_key: String::new(),
                    started_at: Utc::now(),
                    finished_at: None,
                })
                .await?;
            run.ready.push_back(ReadyItem { node_id: data.body_start.clone(), from: node_id.to_string() });
            Ok(())
        } else {
            self.finalize_routed(dag, index, run, node_id, NodeStatus::Done, None, &[data.body_start.as_str()])
                .await
        }
    }

    /// Fans `data.source_array_expr` out across up to `max_concurrency`
    /// concurrent invocations of the body action, then converges before
    /// routing to the node's own successors.
    ///
    /// The loop body is restricted to a single action node: a `loop_foreach`
    /// body that is itself a multi-node subgraph is not supported.
    async fn dispatch_loop_foreach(
        &self,
        dag: &Dag,
        index: &DagIndex<'_>,
        run: &mut RunState,
        node_id: &str,
        data: &LoopForeachData,
    ) -> Result<(), EngineError> {
        let globals = globals_json(dag);
        let items = {
            let scope = Scope {
                inputs: &run.ctx.inputs,
                vars: &run.ctx.vars,
                globals: &globals,
                node_outputs: &run.ctx.artifacts,
            };
            let value = expr::eval_str(&data.source_array_expr, &scope).map_err(|e| {
                EngineError::ExpressionFailed { node_id: node_id.to_string(), message: e.to_string() }
            })?;
            match value {
                Value::Array(items) => items,
                Value::Null => Vec::new(),
                other => {
                    return Err(EngineError::ExpressionFailed {
                        node_id: node_id.to_string(),
                        message: format!("source_array_expr must yield an array, got {other}"),
                    })
                }
            }
        };

        if items.is_empty() {
            return self
                .finalize_routed(
                    dag,
                    index,
                    run,
                    node_id,
                    NodeStatus::Done,
                    Some(Value::Array(vec![])),
                    &[data.body_start.as_str()],
                )
                .await;
        }

        let body_node = index
            .node(&data.body_start)
            .ok_or_else(|| EngineError::UnknownNode(data.body_start.clone()))?;
        let body_action = match &body_node.kind {
            NodeKind::Action(a) => a.clone(),
            other => {
                return Err(EngineError::NodeFatal {
                    node_id: data.body_start.clone(),
                    message: format!("loop_foreach body must be an action node, found {}", other.label()),
                })
            }
        };

        let concurrency = data.max_concurrency.max(1) as usize;
        let timeout_ms = body_action.timeout_ms.or(dag.globals.timeout_ms).unwrap_or(30_000);
        let total = items.len();
        let mut results: Vec<Option<Value>> = vec![None; total];
        let mut pending = items.into_iter().enumerate();
        let mut in_flight = tokio::task::JoinSet::new();

        loop {
            while in_flight.len() < concurrency {
                let Some((i, item)) = pending.next() else { break };
                let mut shard_ctx = run.ctx.clone();
                shard_ctx.vars.insert("item".into(), item);
                shard_ctx.vars.insert("item_index".into(), serde_json::json!(i as f64));
                let rendered = render(&body_action.input_template, &shard_ctx, &globals)?;
                let idem_key = action_idem_key(&run.run_id, &format!("{node_id}:{i}"), &rendered);
                let invoker = self.invoker.clone();
                let request = InvokeRequest {
                    tool: body_action.tool.clone(),
                    action: body_action.action.clone(),
                    connection_id: body_action.connection_id.clone(),
                    arguments: rendered,
                    timeout_ms,
                    idempotency_key: idem_key,
                };
                in_flight.spawn(async move { (i, invoker.invoke(request).await) });
            }

            let Some(joined) = in_flight.join_next().await else { break };
            let (i, result) = joined.map_err(|e| EngineError::NodeFatal {
                node_id: data.body_start.clone(),
                message: format!("shard task panicked: {e}"),
            })?;

            match result {
                Ok(output) => results[i] = Some(output),
                Err(NodeError::Fatal(msg)) | Err(NodeError::Retryable(msg)) => {
                    run.ctx.errors.insert(node_id.to_string(), format!("item {i} failed: {msg}"));
                    return self
                        .finalize_routed(
                            dag,
                            index,
                            run,
                            node_id,
                            NodeStatus::Error,
                            None,
                            &[data.body_start.as_str()],
                        )
                        .await;
                }
            }
        }

        let output = Value::Array(results.into_iter().map(|v| v.unwrap_or(Value::Null)).collect());
        run.ctx.vars.insert(format!("{node_id}_results"), output.clone());
        self.finalize_routed(dag, index, run, node_id, NodeStatus::Done, Some(output), &[data.body_start.as_str()])
            .await
    }
}

fn edge_matches(when: EdgeWhen, status: NodeStatus) -> bool {
    match when {
        EdgeWhen::Always => status.is_terminal(),
        EdgeWhen::Success => status == NodeStatus::Done,
        EdgeWhen::Error => status == NodeStatus::Error,
    }
}

fn globals_json(dag: &Dag) -> Value {
    serde_json::to_value(&dag.globals).unwrap_or(Value::Null)
}

fn eval_condition_bool(src: &str, scope: &Scope, node_id: &str) -> Result<bool, EngineError> {
    let expr = expr::parse(src)
        .map_err(|e| EngineError::ExpressionFailed { node_id: node_id.to_string(), message: e.to_string() })?;
    expr::eval_bool(&expr, scope)
        .map_err(|e| EngineError::ExpressionFailed { node_id: node_id.to_string(), message: e.to_string() })
}

fn json_values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(_), Value::Number(_)) => a.as_f64() == b.as_f64(),
        _ => a == b,
    }
}

fn apply_output_vars(ctx: &mut RunContext, node_id: &str, output: &Value, output_vars: &[OutputVar]) {
    for ov in output_vars {
        match json_path_get(output, &ov.path) {
            Some(value) => {
                ctx.vars.insert(ov.name.clone(), value);
            }
            None => warn!(node_id, path = %ov.path, "output_vars path not found in action result"),
        }
    }
}

fn json_path_get(value: &Value, path: &str) -> Option<Value> {
    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = current.as_object()?.get(segment)?;
    }
    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idempotency::InMemoryIdempotencyCache;
    use crate::models::{
        ActionData, Dag, Edge, GatewayIfData, Globals, IfBranch, JoinData, JoinMode, Node, NodeKind, TriggerData,
        TriggerKind,
    };
    use crate::store::memory::InMemoryStore;
    use nodes::mock::MockNode;
    use serde_json::json;

    fn trigger(id: &str) -> Node {
        Node {
            id: id.into(),
            kind: NodeKind::Trigger(TriggerData {
                kind: TriggerKind::EventBased,
                toolkit_slug: "github".into(),
                composio_trigger_slug: Some("push".into()),
                connection_id: None,
                filter: None,
                cron_expr: None,
                timezone: None,
            }),
        }
    }

    fn action(id: &str, tool: &str) -> Node {
        Node {
            id: id.into(),
            kind: NodeKind::Action(ActionData {
                tool: tool.into(),
                action: "do_it".into(),
                connection_id: "conn1".into(),
                input_template: json!({}),
                output_vars: vec![],
                retry: None,
                timeout_ms: None,
            }),
        }
    }

    fn edge(id: &str, source: &str, target: &str) -> Edge {
        Edge { id: id.into(), source: source.into(), target: target.into(), when: crate::models::EdgeWhen::Always, condition: None }
    }

    fn executor(invoker: Arc<dyn ToolInvoker>) -> Executor {
        Executor::new(
            invoker,
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryIdempotencyCache::new()),
            ExecutorConfig::default(),
        )
    }

    fn meta(run_id: &str) -> ActivationMeta {
        ActivationMeta { run_id: run_id.into(), user_id: "u1".into(), source: RunSource::Manual }
    }

    #[tokio::test]
    async fn trivial_linear_run_succeeds() {
        let mock = Arc::new(MockNode::returning("a1", json!({"id": "x"})));
        let dag = Dag {
            workflow_id: "wf".into(),
            version: 1,
            nodes: vec![trigger("t"), action("a1", "slack")],
            edges: vec![edge("e1", "t", "a1")],
            globals: Globals::default(),
        };

        let exec = executor(mock.clone());
        let outcome = exec.activate(&dag, "t", json!({}), meta("run1")).await.unwrap();

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.node_statuses["a1"], NodeStatus::Done);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn retryable_failure_recovers_before_exhausting_retries() {
        let mock = Arc::new(MockNode::failing_then_succeeding("a1", 2, json!({"id": "x"})));
        let dag = Dag {
            workflow_id: "wf".into(),
            version: 1,
            nodes: vec![
                trigger("t"),
                Node {
                    id: "a1".into(),
                    kind: NodeKind::Action(ActionData {
                        tool: "slack".into(),
                        action: "send".into(),
                        connection_id: "c1".into(),
                        input_template: json!({}),
                        output_vars: vec![],
                        retry: Some(RetryPolicy { retries: 3, backoff: BackoffKind::Linear, delay_ms: 1 }),
                        timeout_ms: None,
                    }),
                },
            ],
            edges: vec![edge("e1", "t", "a1")],
            globals: Globals::default(),
        };

        let exec = executor(mock.clone());
        let outcome = exec.activate(&dag, "t", json!({}), meta("run1")).await.unwrap();

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_fail_the_node_and_the_run() {
        let mock = Arc::new(MockNode::failing_retryable("a1", "boom"));
        let dag = Dag {
            workflow_id: "wf".into(),
            version: 1,
            nodes: vec![
                trigger("t"),
                Node {
                    id: "a1".into(),
                    kind: NodeKind::Action(ActionData {
                        tool: "slack".into(),
                        action: "send".into(),
                        connection_id: "c1".into(),
                        input_template: json!({}),
                        output_vars: vec![],
                        retry: Some(RetryPolicy { retries: 1, backoff: BackoffKind::Linear, delay_ms: 1 }),
                        timeout_ms: None,
                    }),
                },
            ],
            edges: vec![edge("e1", "t", "a1")],
            globals: Globals::default(),
        };

        let exec = executor(mock.clone());
        let outcome = exec.activate(&dag, "t", json!({}), meta("run1")).await.unwrap();

        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.node_statuses["a1"], NodeStatus::Error);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn identical_replay_is_idempotent_and_skips_the_invoker() {
        let mock = Arc::new(MockNode::returning("a1", json!({"id": "x"})));
        let dag = Dag {
            workflow_id: "wf".into(),
            version: 1,
            nodes: vec![trigger("t"), action("a1", "slack")],
            edges: vec![edge("e1", "t", "a1")],
            globals: Globals::default(),
        };

        let store = Arc::new(InMemoryStore::new());
        let idem = Arc::new(InMemoryIdempotencyCache::new());
        let exec = Executor::new(mock.clone(), store, idem, ExecutorConfig::default());

        exec.activate(&dag, "t", json!({"x": 1}), meta("run1")).await.unwrap();
        exec.activate(&dag, "t", json!({"x": 1}), meta("run1")).await.unwrap();

        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn gateway_if_routes_first_matching_branch() {
        let mock_a = Arc::new(MockNode::returning("a", json!({})));
        let dag = Dag {
            workflow_id: "wf".into(),
            version: 1,
            nodes: vec![
                trigger("t"),
                Node {
                    id: "gw".into(),
                    kind: NodeKind::GatewayIf(GatewayIfData {
                        branches: vec![IfBranch { expr: "inputs.amount > 100".into(), to: "big".into() }],
                        else_to: Some("small".into()),
                    }),
                },
                action("big", "slack"),
                action("small", "slack"),
            ],
            edges: vec![edge("e1", "t", "gw"), edge("e2", "gw", "big"), edge("e3", "gw", "small")],
            globals: Globals::default(),
        };

        let exec = executor(mock_a.clone());
        let outcome = exec.activate(&dag, "t", json!({"amount": 250}), meta("run1")).await.unwrap();

        assert_eq!(outcome.node_statuses["big"], NodeStatus::Done);
        assert_eq!(outcome.node_statuses["small"], NodeStatus::Skipped);
    }

    /// Routes by `tool` name so a single invoker can make one branch succeed
    /// and a sibling branch fail fatally.
    struct RoutingInvoker {
        failing_tool: String,
    }

    #[async_trait::async_trait]
    impl ToolInvoker for RoutingInvoker {
        async fn invoke(&self, request: InvokeRequest) -> Result<Value, NodeError> {
            if request.tool == self.failing_tool {
                Err(NodeError::Fatal("nope".into()))
            } else {
                Ok(json!({ "ok": true }))
            }
        }
    }

    #[tokio::test]
    async fn join_deadlocks_when_a_required_branch_errors_without_a_handler() {
        let invoker: Arc<dyn ToolInvoker> = Arc::new(RoutingInvoker { failing_tool: "toolB".into() });
        let dag = Dag {
            workflow_id: "wf".into(),
            version: 1,
            nodes: vec![
                trigger("t"),
                Node { id: "p".into(), kind: NodeKind::Parallel },
                action("a", "toolA"),
                action("b", "toolB"),
                Node { id: "j".into(), kind: NodeKind::Join(JoinData { mode: JoinMode::All }) },
            ],
            edges: vec![
                edge("e1", "t", "p"),
                edge("e2", "p", "a"),
                edge("e3", "p", "b"),
                edge("e4", "a", "j"),
                edge("e5", "b", "j"),
            ],
            globals: Globals::default(),
        };

        let exec = executor(invoker);
        let outcome = exec.activate(&dag, "t", json!({}), meta("run1")).await.unwrap();

        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.node_statuses["b"], NodeStatus::Error);
        assert_eq!(outcome.node_statuses["a"], NodeStatus::Done);
        assert_eq!(outcome.node_statuses["j"], NodeStatus::Skipped);
    }

    #[tokio::test]
    async fn loop_while_bounded_by_max_iterations_fails_the_node() {
        let mock = Arc::new(MockNode::returning("body", json!({})));
        let dag = Dag {
            workflow_id: "wf".into(),
            version: 1,
            nodes: vec![
                trigger("t"),
                Node {
                    id: "loop".into(),
                    kind: NodeKind::LoopWhile(LoopWhileData {
                        condition: "1 == 1".into(),
                        body_start: "body".into(),
                        max_iterations: 3,
                    }),
                },
                action("body", "slack"),
            ],
            edges: vec![edge("e1", "t", "loop"), edge("e2", "loop", "body"), edge("e3", "body", "loop")],
            globals: Globals::default(),
        };

        let exec = executor(mock.clone());
        let outcome = exec.activate(&dag, "t", json!({}), meta("run1")).await.unwrap();

        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.node_statuses["loop"], NodeStatus::Error);
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn loop_foreach_fans_out_and_collects_results() {
        let mock = Arc::new(MockNode::returning("body", json!({"done": true})));
        let dag = Dag {
            workflow_id: "wf".into(),
            version: 1,
            nodes: vec![
                trigger("t"),
                Node {
                    id: "loop".into(),
                    kind: NodeKind::LoopForeach(LoopForeachData {
                        source_array_expr: "inputs.items".into(),
                        body_start: "body".into(),
                        max_concurrency: 2,
                    }),
                },
                action("body", "slack"),
            ],
            edges: vec![edge("e1", "t", "loop"), edge("e2", "loop", "body")],
            globals: Globals::default(),
        };

        let exec = executor(mock.clone());
        let outcome = exec
            .activate(&dag, "t", json!({"items": [1, 2, 3]}), meta("run1"))
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(mock.call_count(), 3);
        assert_eq!(
            outcome.context.vars.get("loop_results"),
            Some(&json!([{"node": "body", "done": true}, {"node": "body", "done": true}, {"node": "body", "done": true}]))
        );
    }

    #[tokio::test]
    async fn loop_foreach_with_empty_source_skips_the_body() {
        let mock = Arc::new(MockNode::returning("body", json!({})));
        let dag = Dag {
            workflow_id: "wf".into(),
            version: 1,
            nodes: vec![
                trigger("t"),
                Node {
                    id: "loop".into(),
                    kind: NodeKind::LoopForeach(LoopForeachData {
                        source_array_expr: "inputs.items".into(),
                        body_start: "body".into(),
                        max_concurrency: 2,
                    }),
                },
                action("body", "slack"),
            ],
            edges: vec![edge("e1", "t", "loop"), edge("e2", "loop", "body")],
            globals: Globals::default(),
        };

        let exec = executor(mock.clone());
        let outcome = exec.activate(&dag, "t", json!({"items": []}), meta("run1")).await.unwrap();

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(mock.call_count(), 0);
        assert_eq!(outcome.node_statuses["body"], NodeStatus::Skipped);
    }
}
