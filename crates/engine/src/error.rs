//! Engine-level error types.

use thiserror::Error;

/// Errors produced by the workflow engine (graph validation + execution).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Graph errors ------
    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node ID that doesn't exist in the workflow.
    #[error("edge references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference { node_id: String, side: &'static str },

    /// The DAG has no trigger node.
    #[error("workflow has no trigger node")]
    NoTrigger,

    /// A non-trigger node is not reachable from any trigger.
    #[error("node '{0}' is not reachable from any trigger")]
    UnreachableNode(String),

    /// Cycle detection found a cycle not explained by a loop node.
    #[error("workflow graph contains a cycle outside of a loop construct")]
    CycleDetected,

    // ------ Execution errors ------
    /// A node failed with a fatal error; the node is marked ERROR without retry.
    #[error("node '{node_id}' failed fatally: {message}")]
    NodeFatal { node_id: String, message: String },

    /// A node's retryable error was exhausted.
    #[error("node '{node_id}' exceeded retry limit: {message}")]
    NodeRetryExhausted { node_id: String, message: String },

    /// An expression failed to parse or evaluate; the enclosing node is
    /// marked ERROR. Never propagates across the run.
    #[error("node '{node_id}' expression error: {message}")]
    ExpressionFailed { node_id: String, message: String },

    /// A `loop_while` exceeded `max_iterations`.
    #[error("node '{node_id}' exceeded max_iterations ({max})")]
    LoopIterationsExceeded { node_id: String, max: u32 },

    /// A join can never be satisfied because a required predecessor
    /// finalized as ERROR and its branch was the only path to the join.
    #[error("join '{0}' deadlocked: no more arrivals are possible")]
    JoinDeadlock(String),

    /// No node implementation is registered for a referenced node id during
    /// dispatch (should not happen for a validated DAG; defensive).
    #[error("node '{0}' referenced by an edge has no dispatch handler")]
    UnknownNode(String),

    /// A run-level deadline elapsed.
    #[error("run '{0}' exceeded its deadline")]
    RunTimedOut(String),

    // ------ Storage / collaborator errors ------
    /// A `WorkflowStore` or `RunStore` call failed. Wraps the storage
    /// backend's error message rather than a concrete type, so the engine
    /// crate has no compile-time dependency on any specific backend.
    #[error("storage error: {0}")]
    Store(String),

    /// The configured `ToolInvoker` rejected the call outright (distinct
    /// from a `NodeError` returned *by* the invoker).
    #[error("invoker error: {0}")]
    Invoker(String),
}
