//! `MockNode` — a test double for `ToolInvoker`.
//!
//! Useful in unit and integration tests where a real invoker is either
//! unavailable or irrelevant.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use crate::traits::InvokeRequest;
use crate::{NodeError, ToolInvoker};

/// Behaviour injected into `MockNode` at construction time.
pub enum MockBehaviour {
    /// Return a specific JSON value.
    ReturnValue(Value),
    /// Fail with a `Retryable` error.
    FailRetryable(String),
    /// Fail with a `Fatal` error.
    FailFatal(String),
    /// Fail `fail_count` times with a `Retryable` error, then succeed with
    /// `then`. Useful for exercising the retry/backoff path.
    FailThenSucceed { fail_count: usize, then: Value },
}

/// A mock invoker that records every request it receives and returns a
/// programmer-specified result.
pub struct MockNode {
    /// Label used in test assertions.
    pub name: String,
    behaviour: Mutex<MockBehaviour>,
    /// All requests seen by this node (in call order).
    pub calls: Arc<Mutex<Vec<InvokeRequest>>>,
}

impl MockNode {
    /// Create a mock that always succeeds with the given value.
    pub fn returning(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            behaviour: Mutex::new(MockBehaviour::ReturnValue(value)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that always fails with a `Fatal` error.
    pub fn failing_fatal(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behaviour: Mutex::new(MockBehaviour::FailFatal(msg.into())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that always fails with a `Retryable` error.
    pub fn failing_retryable(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behaviour: Mutex::new(MockBehaviour::FailRetryable(msg.into())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that fails `fail_count` times then succeeds.
    pub fn failing_then_succeeding(name: impl Into<String>, fail_count: usize, then: Value) -> Self {
        Self {
            name: name.into(),
            behaviour: Mutex::new(MockBehaviour::FailThenSucceed { fail_count, then }),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of times this node has been invoked.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ToolInvoker for MockNode {
    async fn invoke(&self, request: InvokeRequest) -> Result<Value, NodeError> {
        self.calls.lock().unwrap().push(request.clone());

        let mut behaviour = self.behaviour.lock().unwrap();
        match &mut *behaviour {
            MockBehaviour::ReturnValue(v) => {
                let mut out = json!({ "node": self.name });
                if let (Some(out_obj), Some(v_obj)) = (out.as_object_mut(), v.as_object()) {
                    for (k, val) in v_obj {
                        out_obj.insert(k.clone(), val.clone());
                    }
                }
                Ok(out)
            }
            MockBehaviour::FailRetryable(msg) => Err(NodeError::Retryable(msg.clone())),
            MockBehaviour::FailFatal(msg) => Err(NodeError::Fatal(msg.clone())),
            MockBehaviour::FailThenSucceed { fail_count, then } => {
                if *fail_count > 0 {
                    *fail_count -= 1;
                    Err(NodeError::Retryable(format!("{} attempts remaining", *fail_count + 1)))
                } else {
                    Ok(then.clone())
                }
            }
        }
    }
}
