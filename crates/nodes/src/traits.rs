//! The `ToolInvoker` trait — the external collaborator that executes one
//! action against a third-party service.
//!
//! This is intentionally the *only* side-effecting seam in the workflow
//! control plane: the engine never talks to a provider directly, it always
//! goes through a `ToolInvoker`. Tests and the CLI use [`crate::mock::MockNode`];
//! a real deployment wires this to whatever executes the Composio call.

use async_trait::async_trait;
use serde_json::Value;

use crate::NodeError;

/// One action invocation, fully resolved: concrete tool/action/connection,
/// rendered arguments, a timeout, and a caller-supplied idempotency key the
/// provider is asked to honor when it can.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    pub tool: String,
    pub action: String,
    pub connection_id: String,
    pub arguments: Value,
    pub timeout_ms: u64,
    pub idempotency_key: String,
}

/// The core invocation trait. All built-in and plugin invokers implement
/// this; the engine dispatches every action node through it.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Execute one action and return its JSON result.
    ///
    /// # Errors
    /// Returns [`NodeError::Retryable`] for transient failures (network,
    /// provider 5xx, rate-limit) or [`NodeError::Fatal`] for permanent ones
    /// (provider 4xx other than rate-limit, argument validation).
    async fn invoke(&self, request: InvokeRequest) -> Result<Value, NodeError>;
}
