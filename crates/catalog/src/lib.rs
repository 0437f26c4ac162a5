//! `catalog` crate — the read-only Tool Catalog the validator and executor
//! consult for provider/action/trigger specs.
//!
//! The real deployment would back this with the integration catalog cache;
//! here we ship the trait plus an in-memory implementation good enough for
//! tests, the CLI, and any embedder that wants to hand-author a catalog.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A toolkit/provider entry, e.g. `slack`, `github`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub slug: String,
    pub name: String,
}

/// The parameter and scope contract for one `(provider, action)` pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionSpec {
    pub required_params: Vec<String>,
    pub optional_params: Vec<String>,
    pub required_scopes: Vec<String>,
    pub deprecated: bool,
}

/// The contract for one `(provider, trigger)` pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub filter_params: Vec<String>,
}

/// Read-only lookup over providers, actions, and triggers.
///
/// Implementations must be side-effect free and safe to call from validator
/// and executor code on the hot path — no network calls here; a real
/// deployment refreshes an in-memory snapshot out of band.
pub trait ToolCatalog: Send + Sync {
    fn get_provider(&self, slug: &str) -> Option<ProviderSpec>;
    fn get_action(&self, provider_slug: &str, action_name: &str) -> Option<ActionSpec>;
    fn get_trigger(&self, provider_slug: &str, trigger_slug: &str) -> Option<TriggerSpec>;
}

/// An in-memory catalog, keyed by `(provider_slug, action_name)` /
/// `(provider_slug, trigger_slug)`.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalog {
    providers: HashMap<String, ProviderSpec>,
    actions: HashMap<(String, String), ActionSpec>,
    triggers: HashMap<(String, String), TriggerSpec>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, slug: impl Into<String>, name: impl Into<String>) -> Self {
        let slug = slug.into();
        self.providers.insert(slug.clone(), ProviderSpec { slug, name: name.into() });
        self
    }

    pub fn with_action(
        mut self,
        provider_slug: impl Into<String>,
        action_name: impl Into<String>,
        spec: ActionSpec,
    ) -> Self {
        self.actions.insert((provider_slug.into(), action_name.into()), spec);
        self
    }

    pub fn with_trigger(
        mut self,
        provider_slug: impl Into<String>,
        trigger_slug: impl Into<String>,
        spec: TriggerSpec,
    ) -> Self {
        self.triggers.insert((provider_slug.into(), trigger_slug.into()), spec);
        self
    }
}

impl ToolCatalog for InMemoryCatalog {
    fn get_provider(&self, slug: &str) -> Option<ProviderSpec> {
        self.providers.get(slug).cloned()
    }

    fn get_action(&self, provider_slug: &str, action_name: &str) -> Option<ActionSpec> {
        self.actions
            .get(&(provider_slug.to_string(), action_name.to_string()))
            .cloned()
    }

    fn get_trigger(&self, provider_slug: &str, trigger_slug: &str) -> Option<TriggerSpec> {
        self.triggers
            .get(&(provider_slug.to_string(), trigger_slug.to_string()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_hits_and_misses() {
        let catalog = InMemoryCatalog::new()
            .with_provider("slack", "Slack")
            .with_action(
                "slack",
                "send_message",
                ActionSpec {
                    required_params: vec!["channel".into(), "text".into()],
                    optional_params: vec![],
                    required_scopes: vec!["chat:write".into()],
                    deprecated: false,
                },
            );

        assert!(catalog.get_provider("slack").is_some());
        assert!(catalog.get_provider("github").is_none());

        let spec = catalog.get_action("slack", "send_message").unwrap();
        assert_eq!(spec.required_params, vec!["channel", "text"]);
        assert!(catalog.get_action("slack", "delete_message").is_none());
    }
}
