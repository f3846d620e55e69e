//! The dispatch engine: executes a resolved entry list with
//! sticky-head memory, per-account in-flight tracking, and failover.

use std::collections::HashSet;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream;
use relaygate_accounts::{Account, AccountManager, AccountManagers};
use relaygate_common::{
    DispatchError, HttpError, RoutingError, TransportError, TransportErrorKind, UpstreamError,
};
use relaygate_providers::{
    CompletionRequest, CompletionResult, ProviderAdapter, ProviderError, ProviderRegistry, ProviderResult,
    WireFrame, WireStream,
};
use relaygate_retry::{RetryStrategy, evaluate};
use relaygate_routing::{ResolvedEntry, ResolvedRoute};
use tracing::{debug, warn};

use crate::cursor::StickyCursors;
use crate::in_flight::{InFlightGuard, in_flight_cap};

/// Default per-entry adapter-call timeout; overridden via
/// `RELAYGATE_REQUEST_TIMEOUT_MS` at the application layer.
pub const DEFAULT_ENTRY_TIMEOUT: Duration = Duration::from_secs(60);

pub struct DispatchEngine {
    registry: ProviderRegistry,
    accounts: AccountManagers,
    cursors: StickyCursors,
    entry_timeout: Duration,
}

/// What one attempt against a single entry resolved to, once any bounded
/// 401/403 refresh-and-retry has already played out.
enum StepOutcome {
    Success(CompletionResult),
    /// The attempt failed in a way that permits trying the next entry; the
    /// recorded strategy (when present) feeds the bounded-wait retry pass.
    Retryable {
        error: DispatchError,
        strategy: Option<RetryStrategy>,
    },
    /// The attempt failed in a way that must be surfaced to the caller right
    /// now — trying another entry would not help.
    Terminal(DispatchError),
}

enum StreamStepOutcome {
    Committed(WireStream),
    Retryable {
        error: DispatchError,
        strategy: Option<RetryStrategy>,
    },
    Terminal(DispatchError),
}

fn as_stream_outcome(outcome: StepOutcome) -> StreamStepOutcome {
    match outcome {
        StepOutcome::Retryable { error, strategy } => StreamStepOutcome::Retryable { error, strategy },
        StepOutcome::Terminal(error) => StreamStepOutcome::Terminal(error),
        StepOutcome::Success(_) => unreachable!("classify_* helpers never produce Success"),
    }
}

impl DispatchEngine {
    pub fn new(registry: ProviderRegistry, accounts: AccountManagers, entry_timeout: Duration) -> Self {
        Self {
            registry,
            accounts,
            cursors: StickyCursors::new(),
            entry_timeout,
        }
    }

    pub fn with_default_timeout(registry: ProviderRegistry, accounts: AccountManagers) -> Self {
        Self::new(registry, accounts, DEFAULT_ENTRY_TIMEOUT)
    }

    async fn account_for(&self, entry: &ResolvedEntry) -> Option<Account> {
        self.accounts.get(entry.provider).get(&entry.account_id).await
    }

    async fn is_rate_limited(&self, entry: &ResolvedEntry) -> bool {
        self.accounts.get(entry.provider).is_rate_limited(&entry.account_id).await
    }

    /// Orders entries for one dispatch attempt: sticky entry first; if it is
    /// presently rate-limited, probe the declared head (position 0) next;
    /// then the rest in configured order.
    async fn build_order(&self, entries: &[ResolvedEntry], sticky: Option<usize>) -> Vec<usize> {
        let len = entries.len();
        let start = sticky.filter(|&i| i < len).unwrap_or(0);
        let mut order = vec![start];

        if start != 0 && self.is_rate_limited(&entries[start]).await {
            order.push(0);
        }

        for i in 0..len {
            if !order.contains(&i) {
                order.push(i);
            }
        }
        order
    }

    async fn all_rate_limited(&self, entries: &[ResolvedEntry]) -> bool {
        for entry in entries {
            if !self.is_rate_limited(entry).await {
                return false;
            }
        }
        true
    }

    /// Skips an entry that is rate-limited only when some other entry in the
    /// list is not — an all-rate-limited list is handled separately, never
    /// here.
    async fn should_skip(&self, entry: &ResolvedEntry, entries: &[ResolvedEntry]) -> bool {
        if !self.is_rate_limited(entry).await {
            return false;
        }
        for other in entries {
            if other.id != entry.id && !self.is_rate_limited(other).await {
                return true;
            }
        }
        false
    }

    /// Bounded to at most one attempt per entry per request. `refreshed` is shared across both dispatch passes so a
    /// second bounded-wait pass never re-attempts a refresh already spent.
    async fn refresh_once(
        &self,
        entry: &ResolvedEntry,
        account: &Account,
        refreshed: &mut HashSet<String>,
    ) -> Option<Account> {
        if !refreshed.insert(entry.id.clone()) {
            return None;
        }
        let adapter = self.registry.get(entry.provider)?;
        let new_account = adapter.refresh(account).await.ok()?;
        let manager = self.accounts.get(entry.provider);
        if let Err(err) = manager.save(new_account.clone()).await {
            warn!(
                provider = %entry.provider,
                account_id = %entry.account_id,
                error = %err,
                "failed to persist refreshed account"
            );
        }
        Some(new_account)
    }

    fn classify_transport(&self, entry: &ResolvedEntry, err: TransportError) -> StepOutcome {
        warn!(
            provider = %entry.provider,
            account_id = %entry.account_id,
            kind = ?err.kind,
            "transport error, advancing to next entry"
        );
        StepOutcome::Retryable {
            error: DispatchError::Transport(err),
            strategy: None,
        }
    }

    /// Status-based classification only — any 401/403 refresh-and-retry has
    /// already been attempted by the caller before this runs.
    async fn classify_upstream(&self, manager: &AccountManager, entry: &ResolvedEntry, err: UpstreamError) -> StepOutcome {
        let status = err.status;
        let body = err.body_text().into_owned();

        if matches!(status, 401 | 403 | 429 | 500 | 503 | 529) {
            let strategy = evaluate(status, &body, err.retry_after_header.as_deref());
            let cooldown = manager
                .mark_rate_limited(&entry.account_id, status, &body, err.retry_after_header.as_deref())
                .await;
            debug!(
                provider = %entry.provider,
                account_id = %entry.account_id,
                status,
                cooldown_ms = cooldown.as_millis() as u64,
                "entry rate-limited, advancing"
            );
            return StepOutcome::Retryable {
                error: DispatchError::Upstream(err),
                strategy: Some(strategy),
            };
        }

        if status == 408 {
            return StepOutcome::Retryable {
                error: DispatchError::Upstream(err),
                strategy: None,
            };
        }

        manager.mark_success_from_error(&entry.account_id).await;
        StepOutcome::Terminal(DispatchError::Upstream(err))
    }

    async fn classify_provider_error(
        &self,
        manager: &AccountManager,
        entry: &ResolvedEntry,
        provider_error: ProviderError,
    ) -> StepOutcome {
        match provider_error {
            ProviderError::Upstream(err) => self.classify_upstream(manager, entry, err).await,
            ProviderError::Transport(err) => self.classify_transport(entry, err),
            ProviderError::Unsupported(op) => StepOutcome::Terminal(DispatchError::Http(HttpError {
                status: 501,
                body: Bytes::from(format!("operation not supported by this provider: {op}")),
            })),
        }
    }

    async fn attempt_complete(
        &self,
        entry: &ResolvedEntry,
        request: &CompletionRequest,
        refreshed: &mut HashSet<String>,
    ) -> StepOutcome {
        let Some(mut account) = self.account_for(entry).await else {
            return StepOutcome::Retryable {
                error: DispatchError::Routing(RoutingError {
                    model: request.model.clone(),
                    message: format!("account '{}' no longer exists", entry.account_id),
                }),
                strategy: None,
            };
        };
        let Some(adapter) = self.registry.get(entry.provider) else {
            return StepOutcome::Terminal(DispatchError::Routing(RoutingError {
                model: request.model.clone(),
                message: format!("no adapter registered for provider {}", entry.provider),
            }));
        };
        let manager = self.accounts.get(entry.provider).clone();

        loop {
            let guard = InFlightGuard::acquire(manager.clone(), entry.account_id.clone()).await;
            let result = tokio::time::timeout(
                self.entry_timeout,
                adapter.complete(&account, &entry.model_id, request),
            )
            .await;
            guard.release().await;

            match result {
                Ok(Ok(completion)) => {
                    manager.mark_success(&entry.account_id).await;
                    return StepOutcome::Success(completion);
                }
                Ok(Err(ProviderError::Upstream(err))) if matches!(err.status, 401 | 403) => {
                    if let Some(new_account) = self.refresh_once(entry, &account, refreshed).await {
                        account = new_account;
                        continue;
                    }
                    return self.classify_upstream(&manager, entry, err).await;
                }
                Ok(Err(provider_error)) => return self.classify_provider_error(&manager, entry, provider_error).await,
                Err(_) => {
                    return self.classify_transport(
                        entry,
                        TransportError {
                            kind: TransportErrorKind::Timeout,
                            message: format!("entry timed out after {:?}", self.entry_timeout),
                        },
                    );
                }
            }
        }
    }

    /// Runs one non-streaming completion through the resolved route.
    pub async fn dispatch_complete(
        &self,
        route: ResolvedRoute,
        request: &CompletionRequest,
    ) -> Result<CompletionResult, DispatchError> {
        let ResolvedRoute { flow_key, entries } = route;
        debug_assert!(!entries.is_empty(), "resolver must not return an empty route");

        let sticky = self.cursors.get(&flow_key).await;
        let order = self.build_order(&entries, sticky).await;

        if self.all_rate_limited(&entries).await {
            let idx = order[0];
            let mut refreshed = HashSet::new();
            return match self.attempt_complete(&entries[idx], request, &mut refreshed).await {
                StepOutcome::Success(result) => {
                    self.cursors.set(&flow_key, idx).await;
                    Ok(result)
                }
                StepOutcome::Retryable { error, .. } | StepOutcome::Terminal(error) => Err(error),
            };
        }

        let mut refreshed = HashSet::new();
        let mut last_error: Option<DispatchError> = None;
        let mut strategies: Vec<RetryStrategy> = Vec::new();

        for pass in 0..2u8 {
            if pass == 1 {
                let Some(wait) = strategies.iter().filter_map(|s| s.delay(0)).min() else {
                    break;
                };
                strategies.clear();
                tokio::time::sleep(wait).await;
            }

            for &idx in &order {
                let entry = &entries[idx];
                if self.should_skip(entry, &entries).await {
                    continue;
                }
                if let Some(cap) = in_flight_cap(entry.provider) {
                    if self.accounts.get(entry.provider).in_flight(&entry.account_id).await >= cap {
                        continue;
                    }
                }

                match self.attempt_complete(entry, request, &mut refreshed).await {
                    StepOutcome::Success(result) => {
                        self.cursors.set(&flow_key, idx).await;
                        return Ok(result);
                    }
                    StepOutcome::Terminal(error) => return Err(error),
                    StepOutcome::Retryable { error, strategy } => {
                        if let Some(strategy) = strategy {
                            strategies.push(strategy);
                        }
                        last_error = Some(error);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DispatchError::Routing(RoutingError {
                model: flow_key.clone(),
                message: "no entry could be attempted".into(),
            })
        }))
    }

    async fn attempt_stream(
        &self,
        entry: &ResolvedEntry,
        request: &CompletionRequest,
        refreshed: &mut HashSet<String>,
    ) -> StreamStepOutcome {
        let Some(mut account) = self.account_for(entry).await else {
            return StreamStepOutcome::Retryable {
                error: DispatchError::Routing(RoutingError {
                    model: request.model.clone(),
                    message: format!("account '{}' no longer exists", entry.account_id),
                }),
                strategy: None,
            };
        };
        let Some(adapter) = self.registry.get(entry.provider) else {
            return StreamStepOutcome::Terminal(DispatchError::Routing(RoutingError {
                model: request.model.clone(),
                message: format!("no adapter registered for provider {}", entry.provider),
            }));
        };
        let manager = self.accounts.get(entry.provider).clone();

        let mut stream = loop {
            let guard = InFlightGuard::acquire(manager.clone(), entry.account_id.clone()).await;
            let opened = tokio::time::timeout(
                self.entry_timeout,
                adapter.stream(&account, &entry.model_id, request),
            )
            .await;

            match opened {
                Ok(Ok(stream)) => {
                    guard.release().await;
                    break stream;
                }
                Ok(Err(ProviderError::Upstream(err))) if matches!(err.status, 401 | 403) => {
                    guard.release().await;
                    if let Some(new_account) = self.refresh_once(entry, &account, refreshed).await {
                        account = new_account;
                        continue;
                    }
                    return as_stream_outcome(self.classify_upstream(&manager, entry, err).await);
                }
                Ok(Err(provider_error)) => {
                    guard.release().await;
                    return as_stream_outcome(self.classify_provider_error(&manager, entry, provider_error).await);
                }
                Err(_) => {
                    guard.release().await;
                    return as_stream_outcome(self.classify_transport(
                        entry,
                        TransportError {
                            kind: TransportErrorKind::Timeout,
                            message: format!("entry timed out opening stream after {:?}", self.entry_timeout),
                        },
                    ));
                }
            }
        };

        // Commit on the first frame: an error before the first frame is
        // still eligible for failover, one after is not.
        match stream.next().await {
            None => {
                manager.mark_success(&entry.account_id).await;
                StreamStepOutcome::Committed(Box::pin(stream::empty::<ProviderResult<WireFrame>>()))
            }
            Some(Ok(frame)) => {
                manager.mark_success(&entry.account_id).await;
                let first = stream::once(async move { Ok(frame) });
                let rest: WireStream = stream;
                StreamStepOutcome::Committed(Box::pin(first.chain(rest)))
            }
            Some(Err(provider_error)) => {
                as_stream_outcome(self.classify_provider_error(&manager, entry, provider_error).await)
            }
        }
    }

    /// Runs one streaming completion through the resolved route. Failover is only possible before the first frame.
    pub async fn dispatch_stream(
        &self,
        route: ResolvedRoute,
        request: &CompletionRequest,
    ) -> Result<WireStream, DispatchError> {
        let ResolvedRoute { flow_key, entries } = route;
        debug_assert!(!entries.is_empty(), "resolver must not return an empty route");

        let sticky = self.cursors.get(&flow_key).await;
        let order = self.build_order(&entries, sticky).await;

        if self.all_rate_limited(&entries).await {
            let idx = order[0];
            let mut refreshed = HashSet::new();
            return match self.attempt_stream(&entries[idx], request, &mut refreshed).await {
                StreamStepOutcome::Committed(stream) => {
                    self.cursors.set(&flow_key, idx).await;
                    Ok(stream)
                }
                StreamStepOutcome::Retryable { error, .. } | StreamStepOutcome::Terminal(error) => Err(error),
            };
        }

        let mut refreshed = HashSet::new();
        let mut last_error: Option<DispatchError> = None;
        let mut strategies: Vec<RetryStrategy> = Vec::new();

        for pass in 0..2u8 {
            if pass == 1 {
                let Some(wait) = strategies.iter().filter_map(|s| s.delay(0)).min() else {
                    break;
                };
                strategies.clear();
                tokio::time::sleep(wait).await;
            }

            for &idx in &order {
                let entry = &entries[idx];
                if self.should_skip(entry, &entries).await {
                    continue;
                }
                if let Some(cap) = in_flight_cap(entry.provider) {
                    if self.accounts.get(entry.provider).in_flight(&entry.account_id).await >= cap {
                        continue;
                    }
                }

                match self.attempt_stream(entry, request, &mut refreshed).await {
                    StreamStepOutcome::Committed(stream) => {
                        self.cursors.set(&flow_key, idx).await;
                        return Ok(stream);
                    }
                    StreamStepOutcome::Terminal(error) => return Err(error),
                    StreamStepOutcome::Retryable { error, strategy } => {
                        if let Some(strategy) = strategy {
                            strategies.push(strategy);
                        }
                        last_error = Some(error);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DispatchError::Routing(RoutingError {
                model: flow_key.clone(),
                message: "no entry could be attempted".into(),
            })
        }))
    }
}
