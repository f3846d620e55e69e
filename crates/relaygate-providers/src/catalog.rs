//! The provider model catalog, exposed only through the `ModelCatalog`
//! trait so `relaygate-routing` never needs to know these tables are
//! compiled-in statics.

use relaygate_common::ProviderId;

use crate::types::ModelInfo;

pub trait ModelCatalog: Send + Sync {
    /// Every model this provider knows about, visible and hidden.
    fn models(&self, provider: ProviderId) -> &'static [ModelInfo];

    /// True iff `model` is in the provider's *visible* catalog.
    fn is_visible(&self, provider: ProviderId, model: &str) -> bool {
        self.models(provider)
            .iter()
            .any(|m| m.id == model && !m.hidden)
    }

    /// Every provider whose visible catalog includes `model`.
    fn providers_supporting(&self, model: &str) -> Vec<ProviderId> {
        ProviderId::ALL
            .into_iter()
            .filter(|p| self.is_visible(*p, model))
            .collect()
    }
}

pub(crate) const ANTIGRAVITY_MODELS: &[ModelInfo] = &[
    ModelInfo::visible("gemini-3-pro"),
    ModelInfo::visible("gemini-2.5-pro"),
    ModelInfo::visible("gemini-2.5-flash"),
    ModelInfo::hidden("gemini-2.5-flash-exp"),
];

pub(crate) const CODEX_MODELS: &[ModelInfo] = &[
    ModelInfo::visible("gpt-5"),
    ModelInfo::visible("gpt-5-codex"),
    ModelInfo::visible("o4-mini"),
    ModelInfo::hidden("gpt-5-codex-preview"),
];

pub(crate) const COPILOT_MODELS: &[ModelInfo] = &[
    ModelInfo::visible("claude-sonnet-4.5"),
    ModelInfo::visible("gpt-4.1"),
    ModelInfo::visible("o3-mini"),
    ModelInfo::hidden("claude-opus-4.1-internal"),
];

/// The catalog compiled into this binary. Real deployments could swap this
/// for one fetched from each provider at startup; the resolver only ever
/// depends on the `ModelCatalog` trait, not this struct.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCatalog;

impl ModelCatalog for StaticCatalog {
    fn models(&self, provider: ProviderId) -> &'static [ModelInfo] {
        match provider {
            ProviderId::Antigravity => ANTIGRAVITY_MODELS,
            ProviderId::Codex => CODEX_MODELS,
            ProviderId::Copilot => COPILOT_MODELS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_model_is_not_visible() {
        let catalog = StaticCatalog;
        assert!(!catalog.is_visible(ProviderId::Codex, "gpt-5-codex-preview"));
        assert!(catalog.is_visible(ProviderId::Codex, "gpt-5"));
    }

    #[test]
    fn unknown_provider_model_pair_is_not_visible() {
        let catalog = StaticCatalog;
        assert!(!catalog.is_visible(ProviderId::Copilot, "gemini-3-pro"));
    }

    #[test]
    fn providers_supporting_finds_exactly_one_for_unique_model() {
        let catalog = StaticCatalog;
        assert_eq!(
            catalog.providers_supporting("gpt-5-codex"),
            vec![ProviderId::Codex]
        );
    }

    #[test]
    fn providers_supporting_is_empty_for_unknown_model() {
        let catalog = StaticCatalog;
        assert!(catalog.providers_supporting("does-not-exist").is_empty());
    }
}
