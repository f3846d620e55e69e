//! Provider adapter contract and per-backend implementations.

mod adapter;
mod antigravity;
mod catalog;
mod codex;
mod copilot;
mod error;
mod http;
mod sse;
mod types;

pub use adapter::{ProviderAdapter, WireStream};
pub use antigravity::AntigravityAdapter;
pub use catalog::{ModelCatalog, StaticCatalog};
pub use codex::CodexAdapter;
pub use copilot::CopilotAdapter;
pub use error::{ProviderError, ProviderResult};
pub use http::{classify_transport_error, response_to_upstream_error, strict_client, tls_bypass_client};
pub use types::{CompletionRequest, CompletionResult, ContentBlock, ModelInfo, StopReason, Usage, WireFrame};

use std::collections::HashMap;
use std::sync::Arc;

use relaygate_common::ProviderId;

/// The set of live adapters this process dispatches through, keyed by
/// provider identity.
#[derive(Clone)]
pub struct ProviderRegistry {
    adapters: HashMap<ProviderId, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider(), adapter);
    }

    pub fn get(&self, provider: ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider).cloned()
    }

    /// The registry wired with the three built-in backends.
    pub fn with_builtin_adapters() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AntigravityAdapter::new()));
        registry.register(Arc::new(CodexAdapter::new()));
        registry.register(Arc::new(CopilotAdapter::new()));
        registry
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_resolves_every_provider() {
        let registry = ProviderRegistry::with_builtin_adapters();
        for provider in ProviderId::ALL {
            assert!(registry.get(provider).is_some(), "missing adapter for {provider:?}");
        }
    }

    #[test]
    fn empty_registry_resolves_nothing() {
        let registry = ProviderRegistry::new();
        assert!(registry.get(ProviderId::Codex).is_none());
    }
}
