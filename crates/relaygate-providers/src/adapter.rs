//! The provider adapter contract.

use std::pin::Pin;

use async_trait::async_trait;
use relaygate_accounts::Account;
use relaygate_common::ProviderId;
use tokio_stream::Stream;

use crate::error::ProviderResult;
use crate::types::{CompletionRequest, CompletionResult, ModelInfo, WireFrame};

pub type WireStream = Pin<Box<dyn Stream<Item = ProviderResult<WireFrame>> + Send>>;

/// Uniform call surface every provider backend implements.
///
/// `complete`/`stream` are the dispatch-time entry points; `supported_models`
/// backs the routing loader's visibility filter; `refresh` is the narrow
/// stand-in for a full OAuth refresh flow, used by the dispatch engine's
/// bounded 401/403 retry.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> ProviderId;

    fn supported_models(&self) -> &'static [ModelInfo];

    async fn complete(
        &self,
        account: &Account,
        model: &str,
        request: &CompletionRequest,
    ) -> ProviderResult<CompletionResult>;

    async fn stream(
        &self,
        account: &Account,
        model: &str,
        request: &CompletionRequest,
    ) -> ProviderResult<WireStream>;

    /// Attempts to exchange a stale access token for a fresh one. Adapters
    /// without a modeled refresh flow return `Unsupported`; the dispatch
    /// engine treats that the same as a failed refresh.
    async fn refresh(&self, _account: &Account) -> ProviderResult<Account> {
        Err(crate::error::ProviderError::Unsupported("refresh"))
    }
}
