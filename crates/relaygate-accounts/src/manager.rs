//! Thin per-provider facade over `AccountStore`.
//!
//! `relaygate-routing` and `relaygate-dispatch` only need a narrow, provider
//! scoped view; `AccountManager` is that view, so neither crate depends on
//! the full store API (persistence, summaries) directly.

use std::collections::HashMap;
use std::sync::Arc;

use relaygate_common::ProviderId;

use crate::account::Account;
use crate::store::AccountStore;

#[derive(Clone)]
pub struct AccountManager {
    provider: ProviderId,
    store: Arc<AccountStore>,
}

impl AccountManager {
    pub fn new(provider: ProviderId, store: Arc<AccountStore>) -> Self {
        Self { provider, store }
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub async fn get(&self, id: &str) -> Option<Account> {
        self.store.get_account(self.provider, id).await
    }

    /// All accounts of this provider, in creation order — the order the
    /// `auto` sentinel expands into.
    pub async fn list(&self) -> Vec<Account> {
        self.store.list_accounts(self.provider).await
    }

    pub async fn is_rate_limited(&self, id: &str) -> bool {
        self.store.is_rate_limited(self.provider, id).await
    }

    pub async fn in_flight(&self, id: &str) -> u32 {
        self.store.in_flight(self.provider, id).await
    }

    pub async fn mark_in_flight(&self, id: &str) {
        self.store.mark_in_flight(self.provider, id).await
    }

    pub async fn release_in_flight(&self, id: &str) {
        self.store.release_in_flight(self.provider, id).await
    }

    pub async fn mark_success(&self, id: &str) {
        self.store.mark_success(self.provider, id).await
    }

    pub async fn mark_success_from_error(&self, id: &str) {
        self.store.mark_success_from_error(self.provider, id).await
    }

    /// Persists a mutated account, e.g. after a token refresh.
    pub async fn save(&self, account: Account) -> crate::error::Result<()> {
        self.store.save_account(self.provider, account).await
    }

    pub async fn mark_rate_limited(
        &self,
        id: &str,
        status: u16,
        body: &str,
        retry_after_header: Option<&str>,
    ) -> std::time::Duration {
        self.store
            .mark_rate_limited(self.provider, id, status, body, retry_after_header)
            .await
    }
}

/// One manager per provider, all backed by the same store. The routing
/// resolver and dispatch engine address accounts across all three providers
/// (a flow's entries are not restricted to a single provider), so they hold
/// this rather than a single `AccountManager`.
#[derive(Clone)]
pub struct AccountManagers {
    by_provider: HashMap<ProviderId, AccountManager>,
}

impl AccountManagers {
    pub fn new(store: Arc<AccountStore>) -> Self {
        let by_provider = ProviderId::ALL
            .into_iter()
            .map(|provider| (provider, AccountManager::new(provider, store.clone())))
            .collect();
        Self { by_provider }
    }

    pub fn get(&self, provider: ProviderId) -> &AccountManager {
        self.by_provider
            .get(&provider)
            .expect("AccountManagers is seeded with every ProviderId::ALL entry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AccountStore;

    #[tokio::test]
    async fn covers_every_provider() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(AccountStore::load(dir.path()).await.unwrap());
        let managers = AccountManagers::new(store);
        for provider in ProviderId::ALL {
            assert_eq!(managers.get(provider).provider(), provider);
        }
    }
}
