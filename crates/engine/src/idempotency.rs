//! The idempotency cache: at-most-once protection for action invocations.
//!
//! Keyed by `sha256(run_id || ":" || node_id || ":" || digest(rendered_args))`.
//! A hit short-circuits dispatch entirely — the node is marked `DONE` with
//! the cached slim result and the `ToolInvoker` is never called again.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Default TTL for cached results (spec: "TTL >= 24h").
pub const DEFAULT_TTL_SECS: u64 = 24 * 60 * 60;

#[async_trait]
pub trait IdempotencyCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;
    async fn put(&self, key: &str, value: Value, ttl: Duration);
}

/// Compute the node-local idempotency key for an action dispatch.
pub fn action_idem_key(run_id: &str, node_id: &str, rendered_args: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(run_id.as_bytes());
    hasher.update(b":");
    hasher.update(node_id.as_bytes());
    hasher.update(b":");
    hasher.update(rendered_args.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// A process-local, TTL-expiring idempotency cache.
#[derive(Default)]
pub struct InMemoryIdempotencyCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryIdempotencyCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdempotencyCache for InMemoryIdempotencyCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) {
        self.entries.lock().unwrap().insert(
            key.to_string(),
            Entry { value, expires_at: Instant::now() + ttl },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hit_then_expiry() {
        let cache = InMemoryIdempotencyCache::new();
        cache.put("k", serde_json::json!({"id": "x"}), Duration::from_millis(20)).await;
        assert_eq!(cache.get("k").await, Some(serde_json::json!({"id": "x"})));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[test]
    fn same_inputs_produce_same_key() {
        let k1 = action_idem_key("run1", "node1", &serde_json::json!({"a": 1}));
        let k2 = action_idem_key("run1", "node1", &serde_json::json!({"a": 1}));
        let k3 = action_idem_key("run1", "node1", &serde_json::json!({"a": 2}));
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }
}
