//! The routing resolver: turns a logical `model` string into an
//! ordered list of runnable entries, or a `RoutingError`.
//!
//! The resolver never calls upstream and never mutates anything; it is a
//! pure function of `(config, accounts, catalog, model)` modulo the account
//! store's own async reads.

use relaygate_accounts::AccountManagers;
use relaygate_common::{ProviderId, RoutingError};
use relaygate_providers::ModelCatalog;

use crate::model::{AccountRoute, RoutingDocument, RoutingEntry};

/// One runnable `(provider, accountId, modelId)` tuple, after `auto`
/// expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub id: String,
    pub provider: ProviderId,
    pub account_id: String,
    pub model_id: String,
}

/// The resolver's output: an ordered entry list plus the key the dispatch
/// engine's sticky-head cursor is tracked under. For a named-flow match this is the
/// flow's name; for an official-model match it is the model id itself, so
/// account-routing dispatches still get a stable per-model sticky cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub flow_key: String,
    pub entries: Vec<ResolvedEntry>,
}

const FLOW_PREFIX: &str = "route:";

fn strip_flow_prefix(model: &str) -> &str {
    let trimmed = model.trim();
    match trimmed.get(..FLOW_PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(FLOW_PREFIX) => trimmed[FLOW_PREFIX.len()..].trim(),
        _ => trimmed,
    }
}

/// Expands a single routing entry into zero or more resolved entries:
/// `auto` becomes one entry per account of `entry.provider`, in creation
/// order; anything else passes through as one entry (account existence is
/// not re-checked here — flow entries are already filtered to `is_usable`
/// by the loader's sanitizer).
async fn expand_flow_entry(entry: &RoutingEntry, accounts: &AccountManagers) -> Vec<ResolvedEntry> {
    if entry.is_auto() {
        let manager = accounts.get(entry.provider);
        manager
            .list()
            .await
            .into_iter()
            .map(|account| ResolvedEntry {
                id: format!("auto-{}-{}", entry.provider, account.id),
                provider: entry.provider,
                account_id: account.id,
                model_id: entry.model_id.clone(),
            })
            .collect()
    } else {
        vec![ResolvedEntry {
            id: entry.id.clone(),
            provider: entry.provider,
            account_id: entry.account_id.clone(),
            model_id: entry.model_id.clone(),
        }]
    }
}

/// Expands an account-routing entry, checking the referenced account
/// actually exists.
async fn expand_account_routing_entry(
    entry: &crate::model::AccountRoutingEntry,
    model: &str,
    accounts: &AccountManagers,
) -> Vec<ResolvedEntry> {
    let manager = accounts.get(entry.provider);
    if entry.is_auto() {
        manager
            .list()
            .await
            .into_iter()
            .map(|account| ResolvedEntry {
                id: format!("auto-{}-{}", entry.provider, account.id),
                provider: entry.provider,
                account_id: account.id,
                model_id: model.to_string(),
            })
            .collect()
    } else if manager.get(&entry.account_id).await.is_some() {
        vec![ResolvedEntry {
            id: entry.id.clone(),
            provider: entry.provider,
            account_id: entry.account_id.clone(),
            model_id: model.to_string(),
        }]
    } else {
        Vec::new()
    }
}

/// All accounts across `model`'s supporting providers, in catalog-provider
/// order then account-creation order — the "auto list" fallback used when
/// `smartSwitch` permits it.
async fn auto_list(
    model: &str,
    catalog: &dyn ModelCatalog,
    accounts: &AccountManagers,
) -> Vec<ResolvedEntry> {
    let mut out = Vec::new();
    for provider in catalog.providers_supporting(model) {
        let manager = accounts.get(provider);
        for account in manager.list().await {
            out.push(ResolvedEntry {
                id: format!("auto-{provider}-{}", account.id),
                provider,
                account_id: account.id,
                model_id: model.to_string(),
            });
        }
    }
    out
}

fn routing_error(model: &str, message: impl Into<String>) -> RoutingError {
    RoutingError {
        model: model.to_string(),
        message: message.into(),
    }
}

/// Resolves `model` into an ordered list of runnable entries.
pub async fn resolve(
    document: &RoutingDocument,
    catalog: &dyn ModelCatalog,
    accounts: &AccountManagers,
    model: &str,
) -> Result<ResolvedRoute, RoutingError> {
    // Step 1: named-flow match.
    let flow_key = strip_flow_prefix(model);
    if let Some(flow) = document.flows.iter().find(|f| f.name == flow_key) {
        let mut entries = Vec::new();
        for entry in &flow.entries {
            if entry.is_usable(catalog) {
                entries.extend(expand_flow_entry(entry, accounts).await);
            }
        }
        if !entries.is_empty() {
            return Ok(ResolvedRoute {
                flow_key: flow.name.clone(),
                entries,
            });
        }
    }

    // Step 2: official-model match via the account-routing table.
    if catalog.providers_supporting(model).is_empty() {
        return Err(routing_error(model, "model is not a named flow and not in any provider's visible catalog"));
    }

    let route: Option<&AccountRoute> = document
        .account_routing
        .routes
        .iter()
        .find(|r| r.model_id == model);

    let mut entries = Vec::new();
    if let Some(route) = route {
        for entry in &route.entries {
            entries.extend(expand_account_routing_entry(entry, model, accounts).await);
        }
    }

    if entries.is_empty() && document.account_routing.smart_switch {
        entries = auto_list(model, catalog, accounts).await;
    }

    if entries.is_empty() {
        return Err(routing_error(model, "no usable routing entries and smart switch did not yield an auto list"));
    }

    Ok(ResolvedRoute {
        flow_key: model.to_string(),
        entries,
    })
}
