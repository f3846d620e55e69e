//! End-to-end dispatch scenarios from spec.md §8: sticky skip, head
//! re-probe, and the all-rate-limited fallback. Each test drives a real
//! `DispatchEngine` over a scripted adapter and an on-disk account store
//! seeded in a tempdir.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use relaygate_accounts::{Account, AccountManagers, AccountStore};
use relaygate_common::{ProviderId, TransportError, TransportErrorKind, UpstreamError};
use relaygate_dispatch::DispatchEngine;
use relaygate_providers::{
    CompletionRequest, CompletionResult, ContentBlock, ProviderAdapter, ProviderError, ProviderRegistry,
    ProviderResult, StopReason, Usage, WireStream,
};
use relaygate_routing::{ResolvedEntry, ResolvedRoute};

/// An adapter whose `complete` responses are scripted per account id: each
/// call pops the next entry off that account's queue.
struct ScriptedAdapter {
    provider: ProviderId,
    scripts: Mutex<HashMap<String, Vec<ScriptedResult>>>,
    calls: Mutex<Vec<String>>,
}

enum ScriptedResult {
    Ok,
    Upstream(u16, &'static str),
    Transport,
}

impl ScriptedAdapter {
    fn new(provider: ProviderId, scripts: Vec<(&str, Vec<ScriptedResult>)>) -> Self {
        let scripts = scripts
            .into_iter()
            .map(|(id, steps)| (id.to_string(), steps))
            .collect();
        Self {
            provider,
            scripts: Mutex::new(scripts),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn ok_result() -> CompletionResult {
    CompletionResult {
        content_blocks: vec![ContentBlock::Text { text: "ok".into() }],
        stop_reason: StopReason::EndTurn,
        usage: Usage::default(),
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn provider(&self) -> ProviderId {
        self.provider
    }

    fn supported_models(&self) -> &'static [relaygate_providers::ModelInfo] {
        &[]
    }

    async fn complete(
        &self,
        account: &Account,
        _model: &str,
        _request: &CompletionRequest,
    ) -> ProviderResult<CompletionResult> {
        self.calls.lock().unwrap().push(account.id.clone());
        let mut scripts = self.scripts.lock().unwrap();
        let steps = scripts.get_mut(&account.id).expect("unscripted account called");
        assert!(!steps.is_empty(), "account {} called more times than scripted", account.id);
        match steps.remove(0) {
            ScriptedResult::Ok => Ok(ok_result()),
            ScriptedResult::Upstream(status, body) => {
                Err(ProviderError::Upstream(UpstreamError::new(self.provider, status, body)))
            }
            ScriptedResult::Transport => Err(ProviderError::Transport(TransportError {
                kind: TransportErrorKind::Timeout,
                message: "simulated transport failure".into(),
            })),
        }
    }

    async fn stream(
        &self,
        _account: &Account,
        _model: &str,
        _request: &CompletionRequest,
    ) -> ProviderResult<WireStream> {
        Err(ProviderError::Unsupported("stream (not exercised by these tests)"))
    }
}

async fn seed_accounts(store: &AccountStore, provider: ProviderId, ids: &[&str]) {
    for id in ids {
        store
            .save_account(provider, Account::new(*id, format!("token-{id}")))
            .await
            .unwrap();
    }
}

fn entry(id: &str, provider: ProviderId, account_id: &str) -> ResolvedEntry {
    ResolvedEntry {
        id: id.to_string(),
        provider,
        account_id: account_id.to_string(),
        model_id: "gpt-5".to_string(),
    }
}

fn request() -> CompletionRequest {
    CompletionRequest {
        model: "gpt-5".to_string(),
        messages: vec![],
        tools: None,
        max_tokens: None,
    }
}

/// Scenario 1 (spec.md §8) — sticky skip: acc1 429s (quota), acc2
/// succeeds. Call order is [acc1, acc2]; the next request for the same
/// flow only calls acc2, since acc1 is still cooling down.
#[tokio::test]
async fn sticky_skip_reorders_around_cooldown() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(AccountStore::load(dir.path()).await.unwrap());
    seed_accounts(&store, ProviderId::Codex, &["acc1", "acc2", "acc3"]).await;
    let accounts = AccountManagers::new(store);

    let adapter = Arc::new(ScriptedAdapter::new(
        ProviderId::Codex,
        vec![
            ("acc1", vec![ScriptedResult::Upstream(429, "resource_exhausted quota")]),
            ("acc2", vec![ScriptedResult::Ok, ScriptedResult::Ok]),
        ],
    ));
    let mut registry = ProviderRegistry::new();
    registry.register(adapter.clone());

    let engine = DispatchEngine::with_default_timeout(registry, accounts);
    let entries = vec![
        entry("e1", ProviderId::Codex, "acc1"),
        entry("e2", ProviderId::Codex, "acc2"),
        entry("e3", ProviderId::Codex, "acc3"),
    ];

    let route = ResolvedRoute {
        flow_key: "flow-head".into(),
        entries: entries.clone(),
    };
    let result = engine.dispatch_complete(route, &request()).await;
    assert!(result.is_ok(), "request 1 should succeed via acc2");
    assert_eq!(adapter.calls(), vec!["acc1", "acc2"]);

    let route2 = ResolvedRoute {
        flow_key: "flow-head".into(),
        entries,
    };
    let result2 = engine.dispatch_complete(route2, &request()).await;
    assert!(result2.is_ok(), "request 2 should succeed via acc2 without re-probing acc1");
    assert_eq!(adapter.calls(), vec!["acc1", "acc2", "acc2"]);
}

/// Scenario 2 (spec.md §8) — head re-probe: the cursor sits on b2 after an
/// earlier success. b2 429s again, so the engine re-probes the declared
/// head b1 (also 429), then advances to b3 which succeeds. Call order is
/// `[b2, b1, b3]`.
#[tokio::test]
async fn head_is_reprobed_when_sticky_entry_cools_down() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(AccountStore::load(dir.path()).await.unwrap());
    seed_accounts(&store, ProviderId::Codex, &["b1", "b2", "b3"]).await;
    let accounts = AccountManagers::new(store);

    let adapter = Arc::new(ScriptedAdapter::new(
        ProviderId::Codex,
        vec![
            // Seed request: b1 transport-fails (no rate-limit state change),
            // b2 succeeds, parking the cursor at index 1. Main request: b2
            // 429s, the re-probed head b1 429s, b3 succeeds.
            ("b1", vec![ScriptedResult::Transport, ScriptedResult::Upstream(429, "rate limit")]),
            ("b2", vec![ScriptedResult::Ok, ScriptedResult::Upstream(429, "rate limit")]),
            ("b3", vec![ScriptedResult::Ok]),
        ],
    ));
    let mut registry = ProviderRegistry::new();
    registry.register(adapter.clone());

    let engine = DispatchEngine::with_default_timeout(registry, accounts);
    let entries = vec![
        entry("e1", ProviderId::Codex, "b1"),
        entry("e2", ProviderId::Codex, "b2"),
        entry("e3", ProviderId::Codex, "b3"),
    ];

    let seed_route = ResolvedRoute {
        flow_key: "flow-probe".into(),
        entries: entries.clone(),
    };
    let seeded = engine.dispatch_complete(seed_route, &request()).await;
    assert!(seeded.is_ok(), "seed request should succeed via b2");
    assert_eq!(adapter.calls(), vec!["b1", "b2"]);

    let route = ResolvedRoute {
        flow_key: "flow-probe".into(),
        entries,
    };
    let result = engine.dispatch_complete(route, &request()).await;
    assert!(result.is_ok(), "request should succeed via b3 after re-probing b1");
    assert_eq!(adapter.calls(), vec!["b1", "b2", "b2", "b1", "b3"]);
}

/// Scenario 3 (spec.md §8) — all rate-limited: both entries are cooling
/// down already; the engine still calls the cursor's entry once and
/// returns its upstream error rather than failing synthetically.
#[tokio::test]
async fn all_rate_limited_still_probes_cursor_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(AccountStore::load(dir.path()).await.unwrap());
    seed_accounts(&store, ProviderId::Codex, &["r1", "r2"]).await;
    let accounts = AccountManagers::new(store);

    // Mark both accounts rate-limited externally before dispatch.
    let manager = accounts.get(ProviderId::Codex);
    manager.mark_rate_limited("r1", 429, "resource_exhausted quota", None).await;
    manager.mark_rate_limited("r2", 429, "resource_exhausted quota", None).await;

    let adapter = Arc::new(ScriptedAdapter::new(
        ProviderId::Codex,
        vec![("r1", vec![ScriptedResult::Upstream(429, "resource_exhausted quota")])],
    ));
    let mut registry = ProviderRegistry::new();
    registry.register(adapter.clone());

    let engine = DispatchEngine::with_default_timeout(registry, accounts);
    let route = ResolvedRoute {
        flow_key: "flow-rate-limit".into(),
        entries: vec![entry("e1", ProviderId::Codex, "r1"), entry("e2", ProviderId::Codex, "r2")],
    };

    let result = engine.dispatch_complete(route, &request()).await;
    assert!(result.is_err(), "all entries rate-limited should surface the cursor's upstream error");
    assert_eq!(adapter.calls(), vec!["r1"]);
}
