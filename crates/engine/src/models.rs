//! The DAG wire format: the closed set of node types from the spec, edges,
//! and the workflow-level globals actions inherit from when their own
//! `retry`/`timeout_ms` are absent.
//!
//! Node types form a closed tagged variant (see design notes in the spec):
//! adding a node type is a deliberate, schema-breaking change, not something
//! a plugin can do by registering a new string.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An immutable, versioned workflow DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dag {
    pub workflow_id: String,
    pub version: u32,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub globals: Globals,
}

/// Defaults inherited by action nodes that don't set their own `retry` /
/// `timeout_ms`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Globals {
    pub retry: Option<RetryPolicy>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NodeKind {
    Trigger(TriggerData),
    Action(ActionData),
    GatewayIf(GatewayIfData),
    GatewaySwitch(GatewaySwitchData),
    Parallel,
    Join(JoinData),
    LoopWhile(LoopWhileData),
    LoopForeach(LoopForeachData),
}

impl NodeKind {
    /// Short label used in logs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Trigger(_) => "trigger",
            NodeKind::Action(_) => "action",
            NodeKind::GatewayIf(_) => "gateway_if",
            NodeKind::GatewaySwitch(_) => "gateway_switch",
            NodeKind::Parallel => "parallel",
            NodeKind::Join(_) => "join",
            NodeKind::LoopWhile(_) => "loop_while",
            NodeKind::LoopForeach(_) => "loop_foreach",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    EventBased,
    ScheduleBased,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerData {
    pub kind: TriggerKind,
    pub toolkit_slug: String,
    #[serde(default)]
    pub composio_trigger_slug: Option<String>,
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub filter: Option<Value>,
    #[serde(default)]
    pub cron_expr: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputVar {
    /// Name bound into `context.vars`.
    pub name: String,
    /// JSON path into the action result, e.g. `id` or `data.id`.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionData {
    pub tool: String,
    pub action: String,
    pub connection_id: String,
    #[serde(default)]
    pub input_template: Value,
    #[serde(default)]
    pub output_vars: Vec<OutputVar>,
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: BackoffKind,
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfBranch {
    pub expr: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayIfData {
    pub branches: Vec<IfBranch>,
    #[serde(default)]
    pub else_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    pub value: Value,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySwitchData {
    pub selector: String,
    pub cases: Vec<SwitchCase>,
    #[serde(default)]
    pub default_to: Option<String>,
}

/// Join synchronization policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    All,
    Any,
    Quorum(u32),
}

impl std::fmt::Display for JoinMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinMode::All => write!(f, "all"),
            JoinMode::Any => write!(f, "any"),
            JoinMode::Quorum(n) => write!(f, "quorum:{n}"),
        }
    }
}

impl std::str::FromStr for JoinMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(JoinMode::All),
            "any" => Ok(JoinMode::Any),
            other => other
                .strip_prefix("quorum:")
                .and_then(|n| n.parse::<u32>().ok())
                .map(JoinMode::Quorum)
                .ok_or_else(|| format!("invalid join mode '{other}'")),
        }
    }
}

impl Serialize for JoinMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for JoinMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinData {
    pub mode: JoinMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopWhileData {
    pub condition: String,
    pub body_start: String,
    pub max_iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopForeachData {
    pub source_array_expr: String,
    pub body_start: String,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,
}

fn default_max_concurrency() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeWhen {
    Always,
    Success,
    Error,
}

impl Default for EdgeWhen {
    fn default() -> Self {
        EdgeWhen::Always
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub when: EdgeWhen,
    #[serde(default)]
    pub condition: Option<String>,
}

/// Run-time status of a node execution. Terminal states are `Done`, `Error`,
/// `Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Done,
    Error,
    Skipped,
}

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeStatus::Done | NodeStatus::Error | NodeStatus::Skipped)
    }
}

/// Run-time status of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

/// How a run was activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunSource {
    Event,
    Schedule,
    Manual,
}

/// The in-memory run context: trigger payload, derived scalars, large
/// artifacts kept out-of-band, and per-node error summaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunContext {
    pub inputs: Value,
    pub vars: HashMap<String, Value>,
    pub artifacts: HashMap<String, Value>,
    pub errors: HashMap<String, String>,
}

impl RunContext {
    pub fn new(inputs: Value) -> Self {
        Self { inputs, ..Default::default() }
    }
}
