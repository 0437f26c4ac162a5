//! The pre-lowering document shapes: `Template` (loose, author-facing) and
//! `Executable` (fully resolved, ready to compile into an `engine::Dag`).
//!
//! The `Dag` stage has no separate type here — it's `engine::models::Dag`.

use engine::models::{Globals, JoinMode, OutputVar, RetryPolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author-facing intent, schema-lenient: placeholders like `{{name}}` are
/// allowed anywhere a value would eventually go, and most shape problems
/// are deferred to the `Executable` stage. Kept as a thin wrapper over raw
/// JSON since a template's exact shape varies by authoring tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDoc {
    pub workflow_id: String,
    #[serde(default)]
    pub version: u32,
    pub body: Value,
}

/// A fully resolved workflow: every action names a concrete
/// `(tool, action, connection_id)`, every branch/condition/selector is a
/// parseable expression, and step linkage (`next`) is complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutableWorkflow {
    pub workflow_id: String,
    pub version: u32,
    pub user_id: String,
    pub trigger: ExecTrigger,
    pub steps: Vec<ExecStep>,
    #[serde(default)]
    pub globals: Globals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecTrigger {
    pub node_id: String,
    pub kind: TriggerKind,
    pub toolkit_slug: String,
    pub composio_trigger_slug: String,
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub filter: Option<Value>,
    #[serde(default)]
    pub cron_expr: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    /// The first step this trigger hands off to.
    pub next: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    EventBased,
    ScheduleBased,
}

/// One step of a resolved workflow, prior to lowering into `engine::Node`s
/// and explicit edges. Each step carries its own id so the compiler can
/// address it from branch/case/loop targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ExecStep {
    Action {
        id: String,
        tool: String,
        action: String,
        connection_id: String,
        input_template: Value,
        #[serde(default)]
        output_vars: Vec<OutputVar>,
        #[serde(default)]
        retry: Option<RetryPolicy>,
        #[serde(default)]
        timeout_ms: Option<u64>,
        #[serde(default)]
        next: Option<String>,
    },
    If {
        id: String,
        /// `(condition expression, target step id)`, evaluated in order.
        branches: Vec<(String, String)>,
        #[serde(default)]
        else_to: Option<String>,
    },
    Switch {
        id: String,
        selector: String,
        cases: Vec<(Value, String)>,
        #[serde(default)]
        default_to: Option<String>,
    },
    Parallel {
        id: String,
        /// Branch entry step ids, emitted as successors in this order.
        branches: Vec<String>,
    },
    Join {
        id: String,
        mode: JoinMode,
        /// Step ids whose completion this join waits on.
        sources: Vec<String>,
        #[serde(default)]
        next: Option<String>,
    },
    LoopWhile {
        id: String,
        condition: String,
        body_start: String,
        max_iterations: u32,
        #[serde(default)]
        next: Option<String>,
    },
    LoopForeach {
        id: String,
        source_array_expr: String,
        body_start: String,
        #[serde(default = "default_max_concurrency")]
        max_concurrency: u32,
        #[serde(default)]
        next: Option<String>,
    },
}

fn default_max_concurrency() -> u32 {
    1
}

impl ExecStep {
    pub fn id(&self) -> &str {
        match self {
            ExecStep::Action { id, .. }
            | ExecStep::If { id, .. }
            | ExecStep::Switch { id, .. }
            | ExecStep::Parallel { id, .. }
            | ExecStep::Join { id, .. }
            | ExecStep::LoopWhile { id, .. }
            | ExecStep::LoopForeach { id, .. } => id,
        }
    }
}
